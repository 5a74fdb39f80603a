//! Trajectory interpolation onto a common time lattice (§4.5.1).
//!
//! Grounded on `TrajectoryUtils` in the original system: the observed
//! middle segment is linearly interpolated, while the prefix (before the
//! first observation) and suffix (after the last) are extrapolated with a
//! constant-velocity model propagated purely through its transition matrix
//! -- the original never applies a measurement update in this path, so the
//! "Kalman filter" here reduces to repeated prediction. We still express it
//! with `adskalman`'s `TransitionModelLinearNoControl` so the model (and its
//! process noise) matches the spec's description, and a second model holds
//! the analytically inverted transition matrix for backward propagation
//! rather than inverting at runtime.

use adskalman::{StateAndCovariance, TransitionModelLinearNoControl};
use chrono::{DateTime, Duration, Utc};
use mcmot_types::TrajectoryPoint;
use nalgebra::{Const, Matrix4, OMatrix, OVector};

type State = OVector<f64, Const<4>>;
type Cov = OMatrix<f64, Const<4>, Const<4>>;

/// Constant-velocity transition model over state `(x, vx, y, vy)`, matching
/// `initialize_kalman_filter`'s process noise `Q = I * 0.01`.
struct ConstantVelocityModel {
    f: Matrix4<f64>,
    ft: Matrix4<f64>,
    q: Matrix4<f64>,
}

impl ConstantVelocityModel {
    fn forward(dt: f64) -> Self {
        #[rustfmt::skip]
        let f = Matrix4::new(
            1.0, dt,  0.0, 0.0,
            0.0, 1.0, 0.0, 0.0,
            0.0, 0.0, 1.0, dt,
            0.0, 0.0, 0.0, 1.0,
        );
        Self {
            f,
            ft: f.transpose(),
            q: Matrix4::identity() * 0.01,
        }
    }

    /// The analytic inverse of `forward(dt)`'s transition matrix: negate the
    /// two `dt` off-diagonal entries rather than inverting at runtime.
    fn backward(dt: f64) -> Self {
        #[rustfmt::skip]
        let f = Matrix4::new(
            1.0, -dt,  0.0, 0.0,
            0.0, 1.0,  0.0, 0.0,
            0.0, 0.0,  1.0, -dt,
            0.0, 0.0,  0.0, 1.0,
        );
        Self {
            f,
            ft: f.transpose(),
            q: Matrix4::identity() * 0.01,
        }
    }
}

impl TransitionModelLinearNoControl<f64, Const<4>> for ConstantVelocityModel {
    fn F(&self) -> &Matrix4<f64> {
        &self.f
    }

    fn FT(&self) -> &Matrix4<f64> {
        &self.ft
    }

    fn Q(&self) -> &Matrix4<f64> {
        &self.q
    }
}

/// Matches `initialize_kalman_filter`'s `initial_state_covariance = I * 1000`.
/// The propagated state mean never depends on this value; it is carried
/// only because `StateAndCovariance` requires one.
fn nominal_covariance() -> Cov {
    Matrix4::identity() * 1000.0
}

fn seconds_between(a: DateTime<Utc>, b: DateTime<Utc>) -> f64 {
    (b - a).num_milliseconds() as f64 / 1000.0
}

fn add_seconds(t: DateTime<Utc>, secs: f64) -> DateTime<Utc> {
    t + Duration::milliseconds((secs * 1000.0).round() as i64)
}

/// Linear interpolation over the observed span `[start_time, end_time]` at
/// `time_step` intervals, the Rust counterpart of
/// `interpolate_second_segment_linear`.
fn interpolate_middle_segment(
    traj_sorted: &[TrajectoryPoint],
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    time_step: f64,
) -> Vec<TrajectoryPoint> {
    let span = seconds_between(start_time, end_time);
    let n_slots = (span / time_step).floor() as i64;

    let mut out = Vec::new();
    for i in 0..=n_slots {
        let t = add_seconds(start_time, i as f64 * time_step);
        let prev = traj_sorted.iter().filter(|p| p.timestamp <= t).last();
        let next = traj_sorted.iter().find(|p| p.timestamp > t);
        match (prev, next) {
            (Some(prev), Some(next)) => {
                if prev.timestamp == t {
                    out.push(TrajectoryPoint::new(t, prev.x, prev.y));
                } else {
                    let time_diff = seconds_between(prev.timestamp, next.timestamp);
                    let slot_diff = seconds_between(prev.timestamp, t);
                    let weight = if time_diff > 0.0 {
                        slot_diff / time_diff
                    } else {
                        0.0
                    };
                    out.push(TrajectoryPoint::new(
                        t,
                        prev.x + (next.x - prev.x) * weight,
                        prev.y + (next.y - prev.y) * weight,
                    ));
                }
            }
            (Some(prev), None) => out.push(TrajectoryPoint::new(t, prev.x, prev.y)),
            _ => {}
        }
    }

    if out.len() == 1 {
        let only = out[0];
        out.push(TrajectoryPoint::new(
            add_seconds(only.timestamp, time_step),
            only.x,
            only.y,
        ));
    }
    out
}

fn initial_state_forward(middle: &[TrajectoryPoint]) -> State {
    if middle.len() >= 2 {
        let (a, b) = (middle[middle.len() - 2], middle[middle.len() - 1]);
        let dt = seconds_between(a.timestamp, b.timestamp);
        let (vx, vy) = if dt > 0.0 {
            ((b.x - a.x) / dt, (b.y - a.y) / dt)
        } else {
            (0.0, 0.0)
        };
        State::new(b.x, vx, b.y, vy)
    } else {
        State::new(middle[0].x, 0.0, middle[0].y, 0.0)
    }
}

fn initial_state_backward(middle: &[TrajectoryPoint]) -> State {
    if middle.len() >= 2 {
        let (a, b) = (middle[0], middle[1]);
        let dt = seconds_between(a.timestamp, b.timestamp);
        let (vx, vy) = if dt > 0.0 {
            ((b.x - a.x) / dt, (b.y - a.y) / dt)
        } else {
            (0.0, 0.0)
        };
        State::new(a.x, vx, a.y, vy)
    } else {
        State::new(middle[0].x, 0.0, middle[0].y, 0.0)
    }
}

/// Backward propagation before the first observation, the counterpart of
/// `interpolate_first_segment`.
fn interpolate_prefix(
    start_time: DateTime<Utc>,
    first_obs_time: DateTime<Utc>,
    middle: &[TrajectoryPoint],
    time_step: f64,
) -> Vec<TrajectoryPoint> {
    let n_slots = (seconds_between(start_time, first_obs_time) / time_step).floor() as i64;
    let slots: Vec<DateTime<Utc>> = (0..n_slots)
        .map(|i| add_seconds(start_time, i as f64 * time_step))
        .collect();

    if middle.is_empty() {
        return slots
            .into_iter()
            .map(|t| TrajectoryPoint::new(t, 0.0, 0.0))
            .collect();
    }

    let model = ConstantVelocityModel::backward(time_step);
    let mut estimate = StateAndCovariance::new(initial_state_backward(middle), nominal_covariance());
    let mut out: Vec<TrajectoryPoint> = Vec::with_capacity(slots.len());
    for &t in slots.iter().rev() {
        estimate = model.predict(&estimate);
        out.push(TrajectoryPoint::new(t, estimate.state()[0], estimate.state()[2]));
    }
    out.reverse();
    out
}

/// Forward propagation after the last observation, the counterpart of
/// `interpolate_third_segment`.
fn interpolate_suffix(
    last_obs_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    middle: &[TrajectoryPoint],
    time_step: f64,
) -> Vec<TrajectoryPoint> {
    let n_slots = (seconds_between(last_obs_time, end_time) / time_step).floor() as i64;
    let slots: Vec<DateTime<Utc>> = (0..n_slots)
        .map(|i| add_seconds(last_obs_time, (i + 1) as f64 * time_step))
        .collect();

    if middle.is_empty() {
        return slots
            .into_iter()
            .map(|t| TrajectoryPoint::new(t, 0.0, 0.0))
            .collect();
    }

    let model = ConstantVelocityModel::forward(time_step);
    let mut estimate = StateAndCovariance::new(initial_state_forward(middle), nominal_covariance());
    let mut out = Vec::with_capacity(slots.len());
    for &t in &slots {
        estimate = model.predict(&estimate);
        out.push(TrajectoryPoint::new(t, estimate.state()[0], estimate.state()[2]));
    }
    out
}

/// Reduces a (possibly overlapping, unsorted) point set to exactly one point
/// per half-open `[slot_start, slot_end)` slot, keeping the earliest. Slots
/// span `[current_time - backtrack_seconds, current_time]`.
fn filter_by_slot(
    current_time: DateTime<Utc>,
    backtrack_seconds: f64,
    time_step: f64,
    traj: &[TrajectoryPoint],
) -> Vec<TrajectoryPoint> {
    let start_time = add_seconds(current_time, -backtrack_seconds);
    let num_slots = (seconds_between(start_time, current_time) / time_step).floor() as i64;

    let mut out = Vec::with_capacity(num_slots as usize);
    for i in 0..num_slots {
        let slot_start = add_seconds(start_time, i as f64 * time_step);
        let slot_end = add_seconds(start_time, (i + 1) as f64 * time_step);
        if let Some(earliest) = traj
            .iter()
            .filter(|p| p.timestamp >= slot_start && p.timestamp < slot_end)
            .min_by_key(|p| p.timestamp)
        {
            out.push(TrajectoryPoint::new(
                slot_start.with_nanosecond(0).unwrap_or(slot_start),
                earliest.x,
                earliest.y,
            ));
        }
    }
    out
}

use chrono::Timelike;

/// Produces one point per slot over `[current_time - backtrack_seconds,
/// current_time]` at `time_step` intervals, filling in the observed middle
/// segment linearly and extrapolating the prefix/suffix with a
/// constant-velocity model. The counterpart of `interpolate_trajectory`.
pub fn interpolate_trajectory(
    traj: &[TrajectoryPoint],
    current_time: DateTime<Utc>,
    backtrack_seconds: f64,
    time_step: f64,
) -> Vec<TrajectoryPoint> {
    if traj.is_empty() {
        return Vec::new();
    }
    let mut traj_sorted = traj.to_vec();
    traj_sorted.sort_by_key(|p| p.timestamp);

    let first_obs_time = traj_sorted[0].timestamp;
    let last_obs_time = traj_sorted[traj_sorted.len() - 1].timestamp;
    let start_time = add_seconds(current_time, -backtrack_seconds);
    let end_time = current_time;

    let middle = interpolate_middle_segment(&traj_sorted, first_obs_time, last_obs_time, time_step);
    let prefix = interpolate_prefix(start_time, first_obs_time, &middle, time_step);
    let suffix = interpolate_suffix(last_obs_time, end_time, &middle, time_step);

    let mut all = prefix;
    all.extend(middle);
    all.extend(suffix);

    filter_by_slot(current_time, backtrack_seconds, time_step, &all)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(secs: i64) -> DateTime<Utc> {
        DateTime::UNIX_EPOCH + Duration::seconds(secs)
    }

    fn pt(secs: i64, x: f64, y: f64) -> TrajectoryPoint {
        TrajectoryPoint::new(t(secs), x, y)
    }

    #[test]
    fn middle_segment_interpolates_linearly_between_samples() {
        let traj = vec![pt(0, 0.0, 0.0), pt(4, 8.0, 4.0)];
        let mid = interpolate_middle_segment(&traj, t(0), t(4), 1.0);
        assert_eq!(mid.len(), 5);
        assert!((mid[2].x - 4.0).abs() < 1e-9);
        assert!((mid[2].y - 2.0).abs() < 1e-9);
    }

    #[test]
    fn full_lattice_covers_backtrack_window() {
        let traj = vec![pt(20, 0.0, 0.0), pt(21, 1.0, 1.0), pt(22, 2.0, 2.0)];
        let result = interpolate_trajectory(&traj, t(25), 10.0, 1.0);
        // [current_time - 10, current_time) at 1s steps -> 10 slots.
        assert_eq!(result.len(), 10);
        // Slots must be strictly increasing and half-open.
        for w in result.windows(2) {
            assert!(w[0].timestamp < w[1].timestamp);
        }
    }

    #[test]
    fn suffix_extrapolates_at_constant_velocity() {
        let traj = vec![pt(0, 0.0, 0.0), pt(1, 1.0, 2.0)];
        let result = interpolate_trajectory(&traj, t(3), 3.0, 1.0);
        // last observed slot should be near (1,2); the extrapolated one
        // after it should continue roughly at the same velocity.
        let last = result.last().unwrap();
        assert!(last.x > 1.0);
        assert!(last.y > 2.0);
    }

    #[test]
    fn prefix_extrapolates_backwards_before_first_observation() {
        let traj = vec![pt(8, 10.0, 10.0), pt(9, 11.0, 12.0)];
        let result = interpolate_trajectory(&traj, t(9), 9.0, 1.0);
        assert!(result.len() >= 2);
        assert!(result[0].x < 10.0);
    }

    #[test]
    fn single_observation_is_padded_before_velocity_estimate() {
        let traj = vec![pt(5, 3.0, 4.0)];
        let result = interpolate_trajectory(&traj, t(6), 6.0, 1.0);
        assert!(!result.is_empty());
    }
}
