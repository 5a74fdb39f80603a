//! Square-padded minimum-cost assignment (component C4).
//!
//! Grounded on `AssignmentMatcher`: pads a rectangular cost matrix to a
//! square with a large dummy cost, runs a Hungarian/Jonker-Volgenant
//! minimum-weight perfect matching, then drops pairs that landed on a
//! padding row/column or whose real cost exceeds the caller's threshold.
//! [`pathfinding::kuhn_munkres`] only accepts `Ord` weights, so costs are
//! scaled to fixed-point integers before matching and the *original*
//! floating-point cost is reported back for threshold checks.

use crate::error::{Error, Result};
use pathfinding::kuhn_munkres::kuhn_munkres_min;
use pathfinding::matrix::Matrix;

/// Padding cost for non-existent rows/columns, matching `AssignmentMatcher.PAD_COST`.
pub const PAD_COST: f64 = 1e6;

/// Fixed-point scale applied before handing costs to the integer matcher.
const FIXED_POINT_SCALE: f64 = 1e6;

/// One accepted assignment: `row` indexes the first input set, `col` the
/// second, `cost` is the original (unpadded, unscaled) matrix entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Assignment {
    pub row: usize,
    pub col: usize,
    pub cost: f64,
}

/// Runs minimum-weight assignment over `cost_matrix` (row-major, `n_rows` x
/// `n_cols`, `n_rows` rows each of length `n_cols`), padding to a square
/// with [`PAD_COST`] and returning only pairs inside the unpadded region
/// whose cost is `<= threshold` (when given).
pub fn assign(cost_matrix: &[Vec<f64>], threshold: Option<f64>) -> Result<Vec<Assignment>> {
    let n_rows = cost_matrix.len();
    let n_cols = cost_matrix.first().map_or(0, Vec::len);
    if n_rows == 0 || n_cols == 0 {
        return Err(Error::DegenerateCostMatrix);
    }
    let size = n_rows.max(n_cols);

    let mut padded = Matrix::new(size, size, (PAD_COST * FIXED_POINT_SCALE) as i64);
    for (r, row) in cost_matrix.iter().enumerate() {
        for (c, &cost) in row.iter().enumerate() {
            if !cost.is_finite() {
                return Err(Error::NonFiniteCost { row: r, col: c });
            }
            *padded.get_mut((r, c)).expect("within padded bounds") =
                (cost * FIXED_POINT_SCALE).round() as i64;
        }
    }

    let (_, row_to_col) = kuhn_munkres_min(&padded);

    let mut out = Vec::new();
    for (row, &col) in row_to_col.iter().enumerate() {
        if row >= n_rows || col >= n_cols {
            continue; // matched to a dummy padding row/column
        }
        let cost = cost_matrix[row][col];
        if let Some(t) = threshold {
            if cost > t {
                continue;
            }
        }
        out.push(Assignment { row, col, cost });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_matrix_picks_minimum_weight_matching() {
        let cost = vec![vec![4.0, 1.0], vec![2.0, 0.0]];
        let mut matches = assign(&cost, None).unwrap();
        matches.sort_by_key(|m| m.row);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0], Assignment { row: 0, col: 1, cost: 1.0 });
        assert_eq!(matches[1], Assignment { row: 1, col: 0, cost: 2.0 });
    }

    #[test]
    fn rectangular_matrix_is_padded_and_extra_columns_never_match() {
        // 1 row, 3 columns: only one real assignment possible.
        let cost = vec![vec![5.0, 0.5, 9.0]];
        let matches = assign(&cost, None).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].col, 1);
    }

    #[test]
    fn threshold_drops_expensive_matches() {
        let cost = vec![vec![100.0]];
        let matches = assign(&cost, Some(10.0)).unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn non_finite_cost_is_rejected() {
        let cost = vec![vec![f64::NAN]];
        assert!(matches!(assign(&cost, None), Err(Error::NonFiniteCost { .. })));
    }

    #[test]
    fn empty_matrix_is_degenerate() {
        let cost: Vec<Vec<f64>> = vec![];
        assert!(matches!(assign(&cost, None), Err(Error::DegenerateCostMatrix)));
    }
}
