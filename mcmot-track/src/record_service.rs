//! Per-camera, per-local-track trajectory history (component C3).
//!
//! Grounded on the original system's `RecordService`/`ExpiringDict` pair:
//! a nested expiring map (camera -> local_id -> bounded deque of recent
//! points) where each track's point is the detection's bbox bottom-center,
//! and stale tracks are dropped lazily whenever the service is touched
//! rather than on a background timer.

use chrono::{DateTime, Duration, Utc};
use mcmot_types::{Detection, TrajectoryPoint};
use std::collections::HashMap;
use std::collections::VecDeque;

/// Most recent points kept per track.
const MAX_TRAJECTORY_LEN: usize = 30;

/// Default per-entry time-to-live before lazy eviction.
const DEFAULT_TTL_SECONDS: i64 = 60;

struct TrackEntry {
    points: VecDeque<TrajectoryPoint>,
    last_seen: DateTime<Utc>,
}

/// Bounded, time-expiring per-track trajectory store keyed by
/// `(camera_id, local_id)`.
pub struct RecordService {
    ttl: Duration,
    cameras: HashMap<String, HashMap<i64, TrackEntry>>,
}

impl Default for RecordService {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordService {
    pub fn new() -> Self {
        Self::with_ttl(Duration::seconds(DEFAULT_TTL_SECONDS))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            cameras: HashMap::new(),
        }
    }

    /// Drops every track entry across every camera whose `last_seen` is
    /// older than the configured TTL relative to `now`. Called lazily at
    /// the top of [`RecordService::record_objects`]; exposed separately so
    /// callers with no fresh detections can still trim the store.
    pub fn cleanup(&mut self, now: DateTime<Utc>) {
        self.cameras.retain(|_, tracks| {
            tracks.retain(|_, entry| now - entry.last_seen <= self.ttl);
            !tracks.is_empty()
        });
    }

    /// Appends one trajectory point (the bbox bottom-center) per detection
    /// that carries a `local_id`, and writes the resulting bounded history
    /// back onto each detection as `local_trajectory`.
    ///
    /// Returns the detections paired with their up-to-date local trajectory,
    /// in the same order they were given.
    pub fn record_objects(
        &mut self,
        camera_id: &str,
        detections: &[Detection],
        timestamp: DateTime<Utc>,
    ) -> Vec<(Detection, Vec<TrajectoryPoint>)> {
        self.cleanup(timestamp);

        let tracks = self.cameras.entry(camera_id.to_string()).or_default();
        let mut out = Vec::with_capacity(detections.len());
        for detection in detections {
            let point = {
                let (x, y) = detection.bbox.bottom_center();
                TrajectoryPoint::new(timestamp, x, y)
            };
            let entry = tracks.entry(detection.local_id).or_insert_with(|| TrackEntry {
                points: VecDeque::with_capacity(MAX_TRAJECTORY_LEN),
                last_seen: timestamp,
            });
            if entry.points.len() == MAX_TRAJECTORY_LEN {
                entry.points.pop_front();
            }
            entry.points.push_back(point);
            entry.last_seen = timestamp;
            out.push((detection.clone(), entry.points.iter().copied().collect()));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcmot_types::BBox;

    fn detection(local_id: i64, x1: f64, y: f64) -> Detection {
        Detection {
            class_name: "person".to_string(),
            local_id,
            bbox: BBox::new(x1, y - 10.0, x1 + 10.0, y).unwrap(),
            score: 0.9,
            feature: None,
        }
    }

    fn t(secs: i64) -> DateTime<Utc> {
        DateTime::UNIX_EPOCH + Duration::seconds(secs)
    }

    #[test]
    fn appends_bottom_center_points() {
        let mut svc = RecordService::new();
        let dets = vec![detection(1, 0.0, 100.0)];
        let result = svc.record_objects("cam_a", &dets, t(0));
        assert_eq!(result.len(), 1);
        let (_, traj) = &result[0];
        assert_eq!(traj.len(), 1);
        assert_eq!(traj[0].x, 5.0);
        assert_eq!(traj[0].y, 100.0);
    }

    #[test]
    fn caps_trajectory_length() {
        let mut svc = RecordService::new();
        for i in 0..40 {
            let dets = vec![detection(1, i as f64, 100.0)];
            svc.record_objects("cam_a", &dets, t(i));
        }
        let dets = vec![detection(1, 40.0, 100.0)];
        let result = svc.record_objects("cam_a", &dets, t(40));
        assert_eq!(result[0].1.len(), MAX_TRAJECTORY_LEN);
    }

    #[test]
    fn separate_cameras_and_local_ids_are_independent() {
        let mut svc = RecordService::new();
        svc.record_objects("cam_a", &[detection(1, 0.0, 10.0)], t(0));
        svc.record_objects("cam_b", &[detection(1, 0.0, 20.0)], t(0));
        let a = svc.record_objects("cam_a", &[detection(1, 1.0, 10.0)], t(1));
        let b = svc.record_objects("cam_b", &[detection(1, 1.0, 20.0)], t(1));
        assert_eq!(a[0].1.len(), 2);
        assert_eq!(b[0].1.len(), 2);
        assert_eq!(a[0].1[0].y, 10.0);
        assert_eq!(b[0].1[0].y, 20.0);
    }

    #[test]
    fn stale_tracks_expire_lazily() {
        let mut svc = RecordService::with_ttl(Duration::seconds(60));
        svc.record_objects("cam_a", &[detection(1, 0.0, 10.0)], t(0));
        // 61 seconds later the old track should have been dropped, so a
        // fresh sighting starts a new one-point history.
        let result = svc.record_objects("cam_a", &[detection(1, 0.0, 10.0)], t(61));
        assert_eq!(result[0].1.len(), 1);
    }

    #[test]
    fn detections_without_local_id_are_not_supported_as_untracked() {
        // local_id is mandatory on Detection; every detection passed in is
        // tracked. This test documents that assumption rather than testing
        // an optional-id branch that does not exist.
        let mut svc = RecordService::new();
        let result = svc.record_objects("cam_a", &[detection(1, 0.0, 10.0)], t(0));
        assert_eq!(result.len(), 1);
    }
}
