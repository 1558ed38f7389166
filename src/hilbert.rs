/*!
# Hilbert-Curve Transport Distance

A fast approximate transport distance: project every point of both sets
through a common fixed Hilbert space-filling curve, sort each set by the
resulting scalar index, pair points by rank order, and average the pointwise
ground distances raised to `p` before taking the `1/p` root.

Sorting dominates, so the whole computation is O(N log N) versus the LP's
superlinear cost. In one dimension the rank pairing is the optimal matching,
so the value upper-bounds (and for equal cardinalities equals) the true
transport distance; in higher dimensions it is a heuristic approximation
that benefits from the curve's locality.

The curve orientation and scale are fixed by the joint bounding box of the
two sets, so the value is deterministic. Callers wanting variance reduction
over curve rotations must average over rotated inputs themselves.

# Examples

```rust
use ndarray::arr2;
use wsmc::hilbert::hilbert_distance;

let a = arr2(&[[0.0, 1.0, 2.0], [0.0, 0.0, 0.0]]);
let b = arr2(&[[0.5, 1.5, 2.5], [0.0, 0.0, 0.0]]);
let d = hilbert_distance(a.view(), b.view(), 1.0, 2.0).unwrap();
assert!((d - 0.5).abs() < 1e-12);
```
*/

use ndarray::ArrayView2;

use crate::cost::check_point_sets;
use crate::error::{Error, Result};

/// Computes the Hilbert index of a point on the D-dimensional curve of the
/// given `order` (bits per coordinate). Every coordinate must be below
/// `2^order`, and `D * order` must fit in 128 bits.
///
/// Uses Skilling's transpose algorithm: undo the excess rotations from the
/// most significant bit down, Gray-encode, then interleave the transposed
/// bits most-significant-first with dimension 0 contributing the top bit.
pub fn hilbert_index(coords: &[u32], order: u32) -> u128 {
    let n = coords.len();
    debug_assert!(n as u32 * order <= 128);
    if n == 1 {
        return coords[0] as u128;
    }

    let mut x = coords.to_vec();
    let m = 1u32 << (order - 1);

    // Inverse undo excess work.
    let mut q = m;
    while q > 1 {
        let p = q - 1;
        for i in 0..n {
            if x[i] & q != 0 {
                x[0] ^= p;
            } else {
                let t = (x[0] ^ x[i]) & p;
                x[0] ^= t;
                x[i] ^= t;
            }
        }
        q >>= 1;
    }

    // Gray encode.
    for i in 1..n {
        x[i] ^= x[i - 1];
    }
    let mut t = 0u32;
    q = m;
    while q > 1 {
        if x[n - 1] & q != 0 {
            t ^= q - 1;
        }
        q >>= 1;
    }
    for xi in x.iter_mut() {
        *xi ^= t;
    }

    // Interleave the transpose into a single scalar rank.
    let mut index = 0u128;
    for bit in (0..order).rev() {
        for xi in &x {
            index = (index << 1) | ((xi >> bit) & 1) as u128;
        }
    }
    index
}

/// Computes the approximate p-Wasserstein distance between two point sets
/// (D×N and D×M, cardinalities need not match) by Hilbert rank pairing.
///
/// `p` is the averaging exponent; `ground_p` the exponent of the pointwise
/// Minkowski ground distance (2 for Euclidean). The point dimension is
/// capped at 128 so the curve index fits in a `u128`.
pub fn hilbert_distance(
    a: ArrayView2<f64>,
    b: ArrayView2<f64>,
    p: f64,
    ground_p: f64,
) -> Result<f64> {
    check_point_sets(&a, &b)?;
    if p < 1.0 || ground_p < 1.0 {
        return Err(Error::InvalidParameter {
            name: "p/ground_p",
            reason: format!("exponents must be >= 1, got p={p}, ground_p={ground_p}"),
        });
    }

    let dim = a.nrows();
    if dim > 128 {
        return Err(Error::InvalidParameter {
            name: "dim",
            reason: format!("curve index supports at most 128 dimensions, got {dim}"),
        });
    }
    let order = curve_order(dim);
    let (mins, spans) = joint_bounds(&a.view(), &b.view());

    let ranks_a = rank_order(&a, &mins, &spans, order);
    let ranks_b = rank_order(&b, &mins, &spans, order);

    let (n, m) = (a.ncols(), b.ncols());
    let n_pairs = n.max(m);
    let mut acc = 0.0;
    for k in 0..n_pairs {
        // Stretch the shorter set's ranks over the longer one.
        let i = ranks_a[k * n / n_pairs];
        let j = ranks_b[k * m / n_pairs];
        let ground: f64 = a
            .column(i)
            .iter()
            .zip(b.column(j).iter())
            .map(|(&x, &y)| (x - y).abs().powf(ground_p))
            .sum::<f64>()
            .powf(1.0 / ground_p);
        acc += ground.powf(p);
    }
    Ok((acc / n_pairs as f64).powf(1.0 / p))
}

/// Bits per coordinate: 16 where it fits, fewer for high dimensions so the
/// full index stays within 128 bits.
fn curve_order(dim: usize) -> u32 {
    ((128 / dim.max(1)) as u32).min(16).max(1)
}

/// Per-dimension minima and spans of the union of both sets; a fixed common
/// frame for the curve.
fn joint_bounds<'a>(a: &ArrayView2<'a, f64>, b: &ArrayView2<'a, f64>) -> (Vec<f64>, Vec<f64>) {
    let dim = a.nrows();
    let mut mins = vec![f64::INFINITY; dim];
    let mut maxs = vec![f64::NEG_INFINITY; dim];
    for set in [a, b] {
        for col in set.columns() {
            for (d, &v) in col.iter().enumerate() {
                mins[d] = mins[d].min(v);
                maxs[d] = maxs[d].max(v);
            }
        }
    }
    let spans = mins
        .iter()
        .zip(maxs.iter())
        .map(|(&lo, &hi)| (hi - lo).max(0.0))
        .collect();
    (mins, spans)
}

/// Column indices of `points` sorted by Hilbert index (ties broken by column
/// index for determinism).
fn rank_order(points: &ArrayView2<f64>, mins: &[f64], spans: &[f64], order: u32) -> Vec<usize> {
    let cells = ((1u64 << order) - 1) as f64;
    let mut keyed: Vec<(u128, usize)> = points
        .columns()
        .into_iter()
        .enumerate()
        .map(|(idx, col)| {
            let coords: Vec<u32> = col
                .iter()
                .enumerate()
                .map(|(d, &v)| {
                    if spans[d] > 0.0 {
                        (((v - mins[d]) / spans[d]) * cells).round() as u32
                    } else {
                        0
                    }
                })
                .collect();
            (hilbert_index(&coords, order), idx)
        })
        .collect();
    keyed.sort_unstable();
    keyed.into_iter().map(|(_, idx)| idx).collect()
}
