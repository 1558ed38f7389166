/*!
# Ground-Cost Matrices

Pairwise ground distances between two finite point sets, the common input to
both transport solvers. Point sets follow the dimension × count convention:
an `Array2<f64>` with `D` rows and one column per point.

# Examples

```rust
use ndarray::arr2;
use wsmc::cost::cost_matrix;

// Two 2-dimensional point sets with 2 and 3 points.
let a = arr2(&[[0.0, 1.0], [0.0, 0.0]]);
let b = arr2(&[[0.0, 1.0, 2.0], [0.0, 0.0, 0.0]]);
let cost = cost_matrix(a.view(), b.view()).unwrap();
assert_eq!(cost.shape(), &[2, 3]);
assert_eq!(cost[[0, 0]], 0.0);
assert_eq!(cost[[0, 2]], 2.0);
```
*/

use ndarray::{Array2, ArrayView2};

use crate::error::{Error, Result};

/// Checks that two point sets are comparable: same dimensionality, both
/// non-empty.
pub(crate) fn check_point_sets(a: &ArrayView2<f64>, b: &ArrayView2<f64>) -> Result<()> {
    if a.nrows() != b.nrows() {
        return Err(Error::DimensionMismatch {
            left: a.nrows(),
            right: b.nrows(),
        });
    }
    if a.ncols() == 0 || b.ncols() == 0 {
        return Err(Error::EmptyPointSet);
    }
    Ok(())
}

/// Computes the N×M matrix of Euclidean distances between the columns of `a`
/// (D×N) and the columns of `b` (D×M).
///
/// Pure function; fails with [`Error::DimensionMismatch`] if the two sets do
/// not share the same number of rows.
pub fn cost_matrix(a: ArrayView2<f64>, b: ArrayView2<f64>) -> Result<Array2<f64>> {
    cost_matrix_p(a, b, 2.0)
}

/// Computes the N×M matrix of Minkowski ground distances
/// `(sum_k |a_ki - b_kj|^ground_p)^(1/ground_p)`.
///
/// `ground_p = 2` recovers [`cost_matrix`]; `ground_p = 1` gives Manhattan
/// ground costs.
pub fn cost_matrix_p(
    a: ArrayView2<f64>,
    b: ArrayView2<f64>,
    ground_p: f64,
) -> Result<Array2<f64>> {
    check_point_sets(&a, &b)?;
    if ground_p < 1.0 {
        return Err(Error::InvalidParameter {
            name: "ground_p",
            reason: format!("must be >= 1, got {ground_p}"),
        });
    }

    let (n, m) = (a.ncols(), b.ncols());
    let mut cost = Array2::<f64>::zeros((n, m));
    for i in 0..n {
        let x = a.column(i);
        for j in 0..m {
            let y = b.column(j);
            let acc: f64 = x
                .iter()
                .zip(y.iter())
                .map(|(&xi, &yi)| (xi - yi).abs().powf(ground_p))
                .sum();
            cost[[i, j]] = acc.powf(1.0 / ground_p);
        }
    }
    Ok(cost)
}
