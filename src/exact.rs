/*!
# Exact Discrete Optimal Transport

Solves the transportation linear program

```text
minimize    sum_ij plan[i,j] * cost[i,j]^p
subject to  sum_j plan[i,j] = w1[i],  sum_i plan[i,j] = w2[j],  plan >= 0
```

with the transportation simplex (north-west-corner start, MODI potentials,
Bland's entering and leaving rules) and reports the p-Wasserstein distance
`objective^(1/p)`. Bland's rule makes the pivot sequence, and therefore the
returned value, fully deterministic for identical inputs; it also rules out
cycling on degenerate bases.

This is the correctness baseline the Sinkhorn and Hilbert approximations are
validated against. Cost grows superlinearly in N·M, so prefer the
approximations for large point sets.

# Examples

```rust
use ndarray::{arr1, arr2};
use wsmc::exact::exact_transport;

let w1 = arr1(&[0.5, 0.5]);
let w2 = arr1(&[0.5, 0.5]);
let cost = arr2(&[[0.0, 1.0], [1.0, 0.0]]);
let d = exact_transport(w1.view(), w2.view(), cost.view(), 1.0).unwrap();
assert_eq!(d, 0.0);
```
*/

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

use crate::cost::cost_matrix;
use crate::error::{Error, Result};

/// Tolerance below which a flow or reduced cost is treated as zero.
const FLOW_EPS: f64 = 1e-12;
/// Tolerance for the balance check on the two marginals.
const MARGINAL_TOL: f64 = 1e-8;

/// Computes the exact p-Wasserstein distance between two weighted point sets
/// given a precomputed ground-cost matrix.
///
/// # Arguments
///
/// * `w1` - Probability masses over the first set (length N, sums to 1).
/// * `w2` - Probability masses over the second set (length M, sums to 1).
/// * `cost` - N×M matrix of non-negative ground distances.
/// * `p` - Wasserstein exponent, `p >= 1`.
///
/// Fails with [`Error::InfeasibleMarginals`] when a weight vector has the
/// wrong length, contains negative mass, or the two totals differ beyond a
/// small numerical tolerance.
pub fn exact_transport(
    w1: ArrayView1<f64>,
    w2: ArrayView1<f64>,
    cost: ArrayView2<f64>,
    p: f64,
) -> Result<f64> {
    validate_marginals(&w1, &w2, &cost)?;
    if p < 1.0 {
        return Err(Error::InvalidParameter {
            name: "p",
            reason: format!("must be >= 1, got {p}"),
        });
    }

    let powered = cost.mapv(|c| c.powf(p));
    let objective = solve_transportation(&w1, &w2, &powered)?;
    Ok(objective.max(0.0).powf(1.0 / p))
}

/// Convenience wrapper: exact p-Wasserstein distance between two point sets
/// (D×N and D×M) with uniform weights and Euclidean ground costs.
pub fn wasserstein(a: ArrayView2<f64>, b: ArrayView2<f64>, p: f64) -> Result<f64> {
    let cost = cost_matrix(a, b)?;
    let w1 = Array1::from_elem(a.ncols(), 1.0 / a.ncols() as f64);
    let w2 = Array1::from_elem(b.ncols(), 1.0 / b.ncols() as f64);
    exact_transport(w1.view(), w2.view(), cost.view(), p)
}

pub(crate) fn validate_marginals(
    w1: &ArrayView1<f64>,
    w2: &ArrayView1<f64>,
    cost: &ArrayView2<f64>,
) -> Result<()> {
    if w1.len() != cost.nrows() || w2.len() != cost.ncols() {
        return Err(Error::marginals(format!(
            "weight lengths ({}, {}) do not match cost shape {:?}",
            w1.len(),
            w2.len(),
            cost.shape()
        )));
    }
    if w1.is_empty() || w2.is_empty() {
        return Err(Error::EmptyPointSet);
    }
    if w1.iter().chain(w2.iter()).any(|&w| w < -FLOW_EPS) {
        return Err(Error::marginals("negative mass in weight vector"));
    }
    let (s1, s2): (f64, f64) = (w1.sum(), w2.sum());
    if (s1 - s2).abs() > MARGINAL_TOL {
        return Err(Error::marginals(format!(
            "total masses differ: {s1} vs {s2}"
        )));
    }
    Ok(())
}

/// One basic cell of the transportation tableau.
#[derive(Clone, Copy, Debug)]
struct BasicCell {
    row: usize,
    col: usize,
    flow: f64,
}

/// Solves the balanced transportation problem, returning the optimal
/// objective value. Inputs are assumed validated.
///
/// Bland's rule guarantees termination, but a generous pivot budget guards
/// against pathological floating-point cost matrices; exhausting it is
/// reported as [`Error::SimplexStalled`] rather than returning a suboptimal
/// objective.
fn solve_transportation(
    w1: &ArrayView1<f64>,
    w2: &ArrayView1<f64>,
    cost: &Array2<f64>,
) -> Result<f64> {
    let (n, m) = (w1.len(), w2.len());

    // Renormalize the second marginal so the tableau is exactly balanced;
    // validation already bounded the discrepancy.
    let total1: f64 = w1.sum();
    let scale = if w2.sum() > 0.0 { total1 / w2.sum() } else { 1.0 };

    let mut basis = northwest_corner(w1, w2, scale);

    let max_pivots = 2_000 + 200 * (n + m) * n.max(m);
    let mut pivots = 0usize;
    loop {
        let (u, v) = potentials(&basis, cost, n, m);
        let Some(entering) = entering_cell(&basis, cost, &u, &v, n, m) else {
            break;
        };
        if pivots >= max_pivots {
            return Err(Error::SimplexStalled { pivots });
        }
        pivot(&mut basis, entering, n, m);
        pivots += 1;
    }

    Ok(basis
        .iter()
        .map(|cell| cell.flow * cost[[cell.row, cell.col]])
        .sum())
}

/// North-west-corner initial basic feasible solution with exactly
/// `n + m - 1` cells (degenerate zero-flow cells included).
fn northwest_corner(w1: &ArrayView1<f64>, w2: &ArrayView1<f64>, scale: f64) -> Vec<BasicCell> {
    let (n, m) = (w1.len(), w2.len());
    let mut supply: Vec<f64> = w1.iter().copied().collect();
    let mut demand: Vec<f64> = w2.iter().map(|&w| w * scale).collect();

    let mut basis = Vec::with_capacity(n + m - 1);
    let (mut i, mut j) = (0usize, 0usize);
    loop {
        let flow = supply[i].min(demand[j]).max(0.0);
        basis.push(BasicCell { row: i, col: j, flow });
        supply[i] -= flow;
        demand[j] -= flow;
        if i == n - 1 && j == m - 1 {
            break;
        }
        if j == m - 1 {
            i += 1;
        } else if i == n - 1 {
            j += 1;
        } else if supply[i] <= demand[j] {
            i += 1;
        } else {
            j += 1;
        }
    }
    basis
}

/// Dual potentials (u, v) from the basis spanning tree, rooted at row 0 with
/// `u[0] = 0`. Row nodes are `0..n`, column nodes `n..n+m`.
fn potentials(basis: &[BasicCell], cost: &Array2<f64>, n: usize, m: usize) -> (Vec<f64>, Vec<f64>) {
    let mut u = vec![f64::NAN; n];
    let mut v = vec![f64::NAN; m];
    u[0] = 0.0;

    let adjacency = adjacency_lists(basis, n, m);
    let mut stack = vec![0usize];
    while let Some(node) = stack.pop() {
        for &cell_idx in &adjacency[node] {
            let cell = basis[cell_idx];
            let (row_node, col_node) = (cell.row, n + cell.col);
            if node == row_node && v[cell.col].is_nan() {
                v[cell.col] = cost[[cell.row, cell.col]] - u[cell.row];
                stack.push(col_node);
            } else if node == col_node && u[cell.row].is_nan() {
                u[cell.row] = cost[[cell.row, cell.col]] - v[cell.col];
                stack.push(row_node);
            }
        }
    }
    (u, v)
}

fn adjacency_lists(basis: &[BasicCell], n: usize, m: usize) -> Vec<Vec<usize>> {
    let mut adjacency = vec![Vec::new(); n + m];
    for (idx, cell) in basis.iter().enumerate() {
        adjacency[cell.row].push(idx);
        adjacency[n + cell.col].push(idx);
    }
    adjacency
}

/// Bland's rule: the first non-basic cell in row-major order with a strictly
/// negative reduced cost. Returns `None` at optimality.
fn entering_cell(
    basis: &[BasicCell],
    cost: &Array2<f64>,
    u: &[f64],
    v: &[f64],
    n: usize,
    m: usize,
) -> Option<(usize, usize)> {
    let mut basic = vec![false; n * m];
    for cell in basis {
        basic[cell.row * m + cell.col] = true;
    }
    for i in 0..n {
        for j in 0..m {
            if basic[i * m + j] {
                continue;
            }
            let reduced = cost[[i, j]] - u[i] - v[j];
            if reduced < -FLOW_EPS.max(1e-10) {
                return Some((i, j));
            }
        }
    }
    None
}

/// Performs one simplex pivot: finds the unique cycle the entering cell
/// closes in the basis tree, shifts flow around it, and swaps the leaving
/// cell for the entering one.
fn pivot(basis: &mut Vec<BasicCell>, entering: (usize, usize), n: usize, m: usize) {
    let (row0, col0) = entering;
    let path = tree_path(basis, row0, n + col0, n, m);

    // Cycle signs alternate starting with '+' on the entering cell, so the
    // path edges alternate '-', '+', '-', ... in traversal order.
    let theta = path
        .iter()
        .enumerate()
        .filter(|(k, _)| k % 2 == 0)
        .map(|(_, &cell_idx)| basis[cell_idx].flow)
        .fold(f64::INFINITY, f64::min);

    // Bland-compliant leaving choice: among donor cells tied at the minimum
    // flow, take the one with the lexicographically smallest (row, col). This
    // keeps the pivot sequence anti-cycling on degenerate bases.
    let leaving = path
        .iter()
        .enumerate()
        .filter(|&(k, &cell_idx)| k % 2 == 0 && basis[cell_idx].flow <= theta + FLOW_EPS)
        .map(|(_, &cell_idx)| cell_idx)
        .min_by_key(|&cell_idx| (basis[cell_idx].row, basis[cell_idx].col))
        .expect("cycle always contains a donor cell");

    for (k, &cell_idx) in path.iter().enumerate() {
        if k % 2 == 0 {
            basis[cell_idx].flow = (basis[cell_idx].flow - theta).max(0.0);
        } else {
            basis[cell_idx].flow += theta;
        }
    }
    basis[leaving] = BasicCell {
        row: row0,
        col: col0,
        flow: theta,
    };
}

/// Edge sequence of the unique tree path from `start` (a row node) to
/// `target` (a column node), as indices into `basis`.
fn tree_path(basis: &[BasicCell], start: usize, target: usize, n: usize, m: usize) -> Vec<usize> {
    let adjacency = adjacency_lists(basis, n, m);
    let mut parent_edge = vec![usize::MAX; n + m];
    let mut parent_node = vec![usize::MAX; n + m];
    let mut visited = vec![false; n + m];
    visited[start] = true;

    let mut queue = std::collections::VecDeque::from([start]);
    while let Some(node) = queue.pop_front() {
        if node == target {
            break;
        }
        for &cell_idx in &adjacency[node] {
            let cell = basis[cell_idx];
            let next = if node == cell.row { n + cell.col } else { cell.row };
            if !visited[next] {
                visited[next] = true;
                parent_edge[next] = cell_idx;
                parent_node[next] = node;
                queue.push_back(next);
            }
        }
    }

    let mut path = Vec::new();
    let mut node = target;
    while node != start {
        path.push(parent_edge[node]);
        node = parent_node[node];
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{arr1, arr2};

    #[test]
    fn identical_sets_have_zero_distance() {
        let w = arr1(&[0.25, 0.25, 0.5]);
        let cost = arr2(&[
            [0.0, 1.0, 2.0],
            [1.0, 0.0, 1.0],
            [2.0, 1.0, 0.0],
        ]);
        let d = exact_transport(w.view(), w.view(), cost.view(), 1.0).unwrap();
        assert_abs_diff_eq!(d, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn shifted_point_mass() {
        // All mass moves across unit distance: W1 = 1.
        let w1 = arr1(&[1.0]);
        let w2 = arr1(&[1.0]);
        let cost = arr2(&[[1.0]]);
        let d = exact_transport(w1.view(), w2.view(), cost.view(), 1.0).unwrap();
        assert_abs_diff_eq!(d, 1.0);
    }

    #[test]
    fn nonuniform_weights_hand_solved_instance() {
        // Optimal plan: x00 = 0.4, x01 = 0.3, x11 = 0.3 => objective 0.3.
        let w1 = arr1(&[0.7, 0.3]);
        let w2 = arr1(&[0.4, 0.6]);
        let cost = arr2(&[[0.0, 1.0], [1.0, 0.0]]);
        let d = exact_transport(w1.view(), w2.view(), cost.view(), 1.0).unwrap();
        assert_abs_diff_eq!(d, 0.3, epsilon = 1e-10);
    }

    #[test]
    fn one_dimensional_sets_match_sorted_pairing() {
        // In 1D with uniform weights, W1 is the mean absolute difference of
        // the sorted samples.
        let a = arr2(&[[3.0, 1.0, 2.0, 0.0]]);
        let b = arr2(&[[0.5, 3.5, 1.5, 2.5]]);
        let d = wasserstein(a.view(), b.view(), 1.0).unwrap();
        assert_abs_diff_eq!(d, 0.5, epsilon = 1e-10);
    }

    #[test]
    fn p_two_on_translated_grid() {
        // Translating every point by (1, 0) costs exactly 1 under W2.
        let a = arr2(&[[0.0, 1.0, 2.0], [0.0, 1.0, 0.0]]);
        let mut b = a.clone();
        b.row_mut(0).iter_mut().for_each(|x| *x += 1.0);
        let d = wasserstein(a.view(), b.view(), 2.0).unwrap();
        assert_abs_diff_eq!(d, 1.0, epsilon = 1e-10);
    }

    #[test]
    fn repeated_calls_are_deterministic() {
        let a = arr2(&[
            [0.3, -1.2, 2.4, 0.9, -0.5],
            [1.1, 0.4, -0.7, 2.2, 0.0],
        ]);
        let b = arr2(&[
            [1.3, 0.2, -0.4, 1.9, 0.5],
            [-0.1, 1.4, 0.7, -2.2, 1.0],
        ]);
        let d1 = wasserstein(a.view(), b.view(), 2.0).unwrap();
        let d2 = wasserstein(a.view(), b.view(), 2.0).unwrap();
        assert_eq!(d1, d2);
    }

    #[test]
    fn unbalanced_marginals_are_rejected() {
        let w1 = arr1(&[0.6, 0.6]);
        let w2 = arr1(&[0.5, 0.5]);
        let cost = arr2(&[[0.0, 1.0], [1.0, 0.0]]);
        assert!(matches!(
            exact_transport(w1.view(), w2.view(), cost.view(), 1.0),
            Err(crate::Error::InfeasibleMarginals { .. })
        ));
    }

    #[test]
    fn negative_mass_is_rejected() {
        let w1 = arr1(&[1.2, -0.2]);
        let w2 = arr1(&[0.5, 0.5]);
        let cost = arr2(&[[0.0, 1.0], [1.0, 0.0]]);
        assert!(matches!(
            exact_transport(w1.view(), w2.view(), cost.view(), 1.0),
            Err(crate::Error::InfeasibleMarginals { .. })
        ));
    }

    #[test]
    fn zero_weight_columns_are_tolerated() {
        let w1 = arr1(&[0.5, 0.5, 0.0]);
        let w2 = arr1(&[1.0, 0.0]);
        let cost = arr2(&[[0.0, 2.0], [1.0, 2.0], [5.0, 5.0]]);
        let d = exact_transport(w1.view(), w2.view(), cost.view(), 1.0).unwrap();
        assert_abs_diff_eq!(d, 0.5, epsilon = 1e-10);
    }

    #[test]
    fn degenerate_ties_reach_the_optimum() {
        // Uniform weights with a zero diagonal force degenerate pivots: every
        // off-diagonal column ties at theta = 0. The anti-cycling leaving rule
        // must still drive the objective to exactly zero.
        let n = 6;
        let w = Array1::from_elem(n, 1.0 / n as f64);
        let cost = Array2::from_shape_fn((n, n), |(i, j)| if i == j { 0.0 } else { 1.0 });
        let d = exact_transport(w.view(), w.view(), cost.view(), 1.0).unwrap();
        assert_abs_diff_eq!(d, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn distance_is_nonnegative_on_random_instances() {
        use rand::rngs::SmallRng;
        use rand::{Rng, SeedableRng};

        let mut rng = SmallRng::seed_from_u64(7);
        for trial in 0..20 {
            let n = 2 + trial % 5;
            let m = 2 + (trial / 2) % 6;
            let a = ndarray::Array2::from_shape_fn((3, n), |_| rng.gen_range(-2.0..2.0));
            let b = ndarray::Array2::from_shape_fn((3, m), |_| rng.gen_range(-2.0..2.0));
            let d = wasserstein(a.view(), b.view(), 1.0).unwrap();
            assert!(d >= 0.0 && d.is_finite());
        }
    }
}
