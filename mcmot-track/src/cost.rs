//! Cost matrix construction for cross-camera association (component C5).
//!
//! Grounded on `CostMatrix`/`LossFunctions`/`TrajectoryMatcher` in the
//! original system: for every (local, global) pair, interpolate both
//! trajectories onto the same lattice (§4.5.1, [`crate::interpolate_trajectory`]),
//! score the trajectory difference (DTW or Euclidean over the timestamps
//! the two lattices share), optionally add a feature cosine distance, and
//! combine them into a single normalized cost.

use crate::error::{Error, Result};
use crate::interpolate::interpolate_trajectory;
use chrono::{DateTime, Utc};
use mcmot_types::TrajectoryPoint;

/// Trajectory-distance scoring method selected by `tracking.traj_method`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrajMethod {
    Dtw,
    Euclidean,
}

impl Default for TrajMethod {
    fn default() -> Self {
        TrajMethod::Dtw
    }
}

/// Parameters threaded through from `tracking.*` config into every cost
/// matrix build.
#[derive(Debug, Clone, Copy)]
pub struct CostParams {
    pub backtrack_seconds: f64,
    pub time_step: f64,
    pub traj_method: TrajMethod,
    pub alpha: f64,
    pub max_traj_loss: f64,
}

impl Default for CostParams {
    fn default() -> Self {
        Self {
            backtrack_seconds: 5.0,
            time_step: 1.0,
            traj_method: TrajMethod::Dtw,
            alpha: 0.5,
            max_traj_loss: 1000.0,
        }
    }
}

/// Coordinates shared between two interpolated lattices at the timestamps
/// they both cover, the Rust counterpart of the original's
/// `common_timestamps` intersection.
fn common_coords(
    a: &[TrajectoryPoint],
    b: &[TrajectoryPoint],
) -> (Vec<(f64, f64)>, Vec<(f64, f64)>) {
    let mut out_a = Vec::new();
    let mut out_b = Vec::new();
    for pa in a {
        if let Some(pb) = b.iter().find(|pb| pb.timestamp == pa.timestamp) {
            out_a.push((pa.x, pa.y));
            out_b.push((pb.x, pb.y));
        }
    }
    (out_a, out_b)
}

fn euclidean(a: (f64, f64), b: (f64, f64)) -> f64 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

/// Sum of squared per-point distances, matching
/// `LossFunctions.compute_trajectory_difference(method="euclidean")`.
fn euclidean_loss(a: &[(f64, f64)], b: &[(f64, f64)]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(&pa, &pb)| (pa.0 - pb.0).powi(2) + (pa.1 - pb.1).powi(2))
        .sum()
}

/// Exact dynamic-time-warping distance between two coordinate sequences.
fn dtw_loss(a: &[(f64, f64)], b: &[(f64, f64)]) -> f64 {
    let (n, m) = (a.len(), b.len());
    let mut dp = vec![vec![f64::INFINITY; m + 1]; n + 1];
    dp[0][0] = 0.0;
    for i in 1..=n {
        for j in 1..=m {
            let cost = euclidean(a[i - 1], b[j - 1]);
            dp[i][j] = cost + dp[i - 1][j].min(dp[i][j - 1]).min(dp[i - 1][j - 1]);
        }
    }
    dp[n][m]
}

/// Trajectory loss between two already-interpolated lattices, over the
/// timestamps they share. `f64::INFINITY` when they share none.
pub fn trajectory_difference(
    a: &[TrajectoryPoint],
    b: &[TrajectoryPoint],
    method: TrajMethod,
) -> f64 {
    let (coords_a, coords_b) = common_coords(a, b);
    if coords_a.is_empty() {
        return f64::INFINITY;
    }
    match method {
        TrajMethod::Euclidean => euclidean_loss(&coords_a, &coords_b),
        TrajMethod::Dtw => dtw_loss(&coords_a, &coords_b),
    }
}

/// `1 - cosine_similarity(a, b)`, matching `LossFunctions.compute_feature_difference`.
pub fn feature_difference(a: &[f32], b: &[f32]) -> Result<f64> {
    if a.len() != b.len() {
        return Err(Error::FeatureDimensionMismatch { a: a.len(), b: b.len() });
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(1.0);
    }
    let cosine = (dot / (norm_a * norm_b)) as f64;
    Ok(1.0 - cosine)
}

/// One trajectory + optional feature, the minimal shape [`build_cost_matrix`]
/// needs from either side of the match.
pub struct MatchInput<'a> {
    pub trajectory: &'a [TrajectoryPoint],
    pub feature: Option<&'a [f32]>,
}

/// Builds the `locals.len() x globals.len()` cost matrix for one class
/// group at `current_timestamp`, combining normalized trajectory loss with
/// `alpha` times feature cosine distance (§4.5).
pub fn build_cost_matrix(
    locals: &[MatchInput],
    globals: &[MatchInput],
    current_timestamp: DateTime<Utc>,
    params: &CostParams,
) -> Result<Vec<Vec<f64>>> {
    let mut matrix = Vec::with_capacity(locals.len());
    for local in locals {
        let local_lattice = interpolate_trajectory(
            local.trajectory,
            current_timestamp,
            params.backtrack_seconds,
            params.time_step,
        );
        let mut row = Vec::with_capacity(globals.len());
        for global in globals {
            let global_lattice = interpolate_trajectory(
                global.trajectory,
                current_timestamp,
                params.backtrack_seconds,
                params.time_step,
            );
            let traj_loss =
                trajectory_difference(&local_lattice, &global_lattice, params.traj_method);
            let feature_loss = match (local.feature, global.feature) {
                (Some(f1), Some(f2)) => feature_difference(f1, f2).unwrap_or_else(|err| {
                    tracing::warn!(%err, "feature dimension mismatch; treating pairing as zero-contribution");
                    0.0
                }),
                _ => 0.0,
            };
            let normalized = (traj_loss / params.max_traj_loss).clamp(0.0, 1.0);
            row.push(normalized + params.alpha * feature_loss);
        }
        matrix.push(row);
    }
    if tracing::enabled!(tracing::Level::TRACE) {
        trace_cost_matrix(&matrix);
    }
    Ok(matrix)
}

/// Pretty-prints a cost matrix's rows, gated behind `TRACE` so it never runs
/// on the hot path; diagnostic aid for matcher behavior.
fn trace_cost_matrix(matrix: &[Vec<f64>]) {
    for (row_idx, row) in matrix.iter().enumerate() {
        let formatted: Vec<String> = row.iter().map(|v| format!("{v:.3}")).collect();
        tracing::trace!(row = row_idx, values = %formatted.join(", "), "cost matrix row");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn t(secs: i64) -> DateTime<Utc> {
        DateTime::UNIX_EPOCH + Duration::seconds(secs)
    }

    #[test]
    fn identical_trajectories_cost_zero() {
        let traj = vec![
            TrajectoryPoint::new(t(0), 0.0, 0.0),
            TrajectoryPoint::new(t(1), 1.0, 1.0),
        ];
        let loss_dtw = trajectory_difference(&traj, &traj, TrajMethod::Dtw);
        let loss_euclid = trajectory_difference(&traj, &traj, TrajMethod::Euclidean);
        assert_eq!(loss_dtw, 0.0);
        assert_eq!(loss_euclid, 0.0);
    }

    #[test]
    fn disjoint_timestamps_are_infinite() {
        let a = vec![TrajectoryPoint::new(t(0), 0.0, 0.0)];
        let b = vec![TrajectoryPoint::new(t(5), 0.0, 0.0)];
        assert_eq!(trajectory_difference(&a, &b, TrajMethod::Dtw), f64::INFINITY);
    }

    #[test]
    fn feature_difference_identical_vectors_is_zero() {
        let v = vec![1.0f32, 2.0, 3.0];
        assert!(feature_difference(&v, &v).unwrap().abs() < 1e-6);
    }

    #[test]
    fn feature_difference_orthogonal_vectors_is_one() {
        let a = vec![1.0f32, 0.0];
        let b = vec![0.0f32, 1.0];
        assert!((feature_difference(&a, &b).unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn feature_difference_rejects_dimension_mismatch() {
        let a = vec![1.0f32];
        let b = vec![1.0f32, 2.0];
        assert!(feature_difference(&a, &b).is_err());
    }

    #[test]
    fn cost_matrix_has_expected_shape() {
        let traj = vec![TrajectoryPoint::new(t(0), 0.0, 0.0), TrajectoryPoint::new(t(1), 1.0, 1.0)];
        let locals = vec![MatchInput { trajectory: &traj, feature: None }];
        let globals = vec![
            MatchInput { trajectory: &traj, feature: None },
            MatchInput { trajectory: &traj, feature: None },
        ];
        let m = build_cost_matrix(&locals, &globals, t(1), &CostParams::default()).unwrap();
        assert_eq!(m.len(), 1);
        assert_eq!(m[0].len(), 2);
    }
}
