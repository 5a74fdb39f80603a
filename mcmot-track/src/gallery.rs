//! Global object gallery (component C6): candidate promotion, per-class
//! cross-camera matching, trajectory fusion, and staleness eviction.
//!
//! Grounded on `Gallery` in the original system. The gallery exclusively
//! owns the global object set; the coordinator (C7) hands it one camera's
//! filtered, coordinate-transformed local objects per cycle and reads back
//! `local_global_mapping` to annotate its output.

use crate::cost::{self, CostParams, MatchInput};
use crate::matcher;
use chrono::{DateTime, Duration, Utc};
use mcmot_types::{GlobalId, ObjectRecord, TrajectoryPoint};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// `clear_stale_objects`'s default: globals idle longer than this are evicted.
const DEFAULT_CLEAR_THRESHOLD_SECONDS: i64 = 60;
/// `clear_stale_candidates`'s default.
const DEFAULT_CANDIDATE_THRESHOLD_SECONDS: i64 = 10;
/// `Gallery.confirmation_frames`'s default.
const DEFAULT_CONFIRMATION_FRAMES: u32 = 5;

/// Shared floor-plan scale used by the distance guard (§4.6.2).
#[derive(Debug, Clone, Copy)]
pub struct MapScale {
    pub meters_per_pixel_x: f64,
    pub meters_per_pixel_y: f64,
}

/// Tunables threaded in from `tracking.*` config, mirroring `Gallery.__init__`.
#[derive(Debug, Clone)]
pub struct GalleryConfig {
    pub cost_params: CostParams,
    pub match_threshold: Option<f64>,
    pub confirmation_frames: u32,
    pub clear_threshold: Duration,
    pub candidate_threshold: Duration,
    pub map_scale: Option<MapScale>,
    pub distance_threshold_m: Option<f64>,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            cost_params: CostParams::default(),
            match_threshold: None,
            confirmation_frames: DEFAULT_CONFIRMATION_FRAMES,
            clear_threshold: Duration::seconds(DEFAULT_CLEAR_THRESHOLD_SECONDS),
            candidate_threshold: Duration::seconds(DEFAULT_CANDIDATE_THRESHOLD_SECONDS),
            map_scale: None,
            distance_threshold_m: None,
        }
    }
}

struct CandidateEntry {
    hits: u32,
    data: ObjectRecord,
    last_seen: DateTime<Utc>,
}

struct PendingUpdate {
    trajectories: Vec<Vec<TrajectoryPoint>>,
    features: Vec<Vec<f32>>,
}

pub struct Gallery {
    config: GalleryConfig,
    global_objects: HashMap<u64, ObjectRecord>,
    candidates: HashMap<String, HashMap<i64, CandidateEntry>>,
    local_global_mapping: HashMap<String, HashMap<i64, GlobalId>>,
    pending_updates: HashMap<u64, PendingUpdate>,
    next_global_id: u64,
    distance_warning_logged: bool,
}

impl Gallery {
    pub fn new(config: GalleryConfig) -> Self {
        if config.distance_threshold_m.is_some() && config.map_scale.is_none() {
            warn!("distance threshold configured but map scale is unavailable; distance guard will be skipped");
        }
        Self {
            config,
            global_objects: HashMap::new(),
            candidates: HashMap::new(),
            local_global_mapping: HashMap::new(),
            pending_updates: HashMap::new(),
            next_global_id: 0,
            distance_warning_logged: false,
        }
    }

    pub fn local_global_mapping(&self, camera_id: &str) -> Option<&HashMap<i64, GlobalId>> {
        self.local_global_mapping.get(camera_id)
    }

    pub fn global_objects(&self) -> impl Iterator<Item = &ObjectRecord> {
        self.global_objects.values()
    }

    /// §4.6: evict stale state, group by class, match or route to
    /// candidates, and refresh `local_global_mapping[camera_id]`.
    pub fn batch_update_or_register(
        &mut self,
        camera_id: &str,
        mut local_objects: Vec<ObjectRecord>,
        current_timestamp: DateTime<Utc>,
    ) -> Vec<ObjectRecord> {
        self.clear_stale_objects(current_timestamp);
        if local_objects.is_empty() {
            return local_objects;
        }

        let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, obj) in local_objects.iter().enumerate() {
            groups.entry(obj.class_name.clone()).or_default().push(idx);
        }

        for (class_name, indices) in groups {
            self.process_class_group(camera_id, &class_name, &indices, &mut local_objects, current_timestamp);
        }

        let mapping = local_objects
            .iter()
            .filter_map(|obj| obj.local_id.map(|lid| (lid, obj.global_id.clone().expect("global_id assigned"))))
            .collect();
        self.local_global_mapping.insert(camera_id.to_string(), mapping);

        local_objects
    }

    fn process_class_group(
        &mut self,
        camera_id: &str,
        class_name: &str,
        indices: &[usize],
        local_objects: &mut [ObjectRecord],
        current_timestamp: DateTime<Utc>,
    ) {
        let global_ids_same_class: Vec<u64> = self
            .global_objects
            .iter()
            .filter(|(_, obj)| obj.class_name == class_name)
            .map(|(&gid, _)| gid)
            .collect();

        if global_ids_same_class.is_empty() {
            for &idx in indices {
                self.handle_candidate(camera_id, &mut local_objects[idx], current_timestamp);
            }
            return;
        }

        let locals: Vec<MatchInput> = indices
            .iter()
            .map(|&idx| MatchInput {
                trajectory: &local_objects[idx].trajectory,
                feature: local_objects[idx].feature.as_deref(),
            })
            .collect();
        let globals: Vec<MatchInput> = global_ids_same_class
            .iter()
            .map(|gid| {
                let obj = &self.global_objects[gid];
                MatchInput { trajectory: &obj.trajectory, feature: obj.feature.as_deref() }
            })
            .collect();

        let cost_matrix = match cost::build_cost_matrix(
            &locals,
            &globals,
            current_timestamp,
            &self.config.cost_params,
        ) {
            Ok(m) => m,
            Err(err) => {
                warn!(%class_name, %err, "cost matrix build failed; routing class group to candidates");
                for &idx in indices {
                    self.handle_candidate(camera_id, &mut local_objects[idx], current_timestamp);
                }
                return;
            }
        };

        let assignments = match matcher::assign(&cost_matrix, self.config.match_threshold) {
            Ok(a) => a,
            Err(err) => {
                warn!(%class_name, %err, "assignment failed; routing class group to candidates");
                for &idx in indices {
                    self.handle_candidate(camera_id, &mut local_objects[idx], current_timestamp);
                }
                return;
            }
        };

        let mut matched_rows = vec![false; indices.len()];
        for m in &assignments {
            matched_rows[m.row] = true;
            let local_idx = indices[m.row];
            let global_id = global_ids_same_class[m.col];

            if self.should_reject_by_distance(&local_objects[local_idx], global_id) {
                self.handle_candidate(camera_id, &mut local_objects[local_idx], current_timestamp);
                continue;
            }

            let local_obj = &mut local_objects[local_idx];
            let entry = self
                .pending_updates
                .entry(global_id)
                .or_insert_with(|| PendingUpdate { trajectories: Vec::new(), features: Vec::new() });
            entry.trajectories.push(local_obj.trajectory.clone());
            if let Some(f) = &local_obj.feature {
                entry.features.push(f.clone());
            }
            local_obj.global_id = Some(GlobalId::Promoted(global_id));
            if let Some(local_id) = local_obj.local_id {
                self.candidates.get_mut(camera_id).map(|c| c.remove(&local_id));
            }
            info!(
                camera_id,
                class_name,
                local_id = local_obj.local_id,
                global_id,
                cost = m.cost,
                "matched local to global"
            );
        }

        for (row, &idx) in indices.iter().enumerate() {
            if !matched_rows[row] {
                self.handle_candidate(camera_id, &mut local_objects[idx], current_timestamp);
            }
        }
    }

    /// §4.6.1: promote a local track once it accrues `confirmation_frames`
    /// sightings, otherwise issue/refresh its `candidate_<camera>_<local>` id.
    fn handle_candidate(&mut self, camera_id: &str, local_obj: &mut ObjectRecord, now: DateTime<Utc>) {
        let local_id = match local_obj.local_id {
            Some(id) => id,
            None => return,
        };
        let camera_candidates = self.candidates.entry(camera_id.to_string()).or_default();

        if let Some(entry) = camera_candidates.get_mut(&local_id) {
            entry.hits += 1;
            entry.data = local_obj.clone();
            entry.last_seen = now;
            let hits = entry.hits;

            if hits >= self.config.confirmation_frames {
                let global_id = self.register_new_object(local_obj.clone(), now);
                self.candidates.get_mut(camera_id).map(|c| c.remove(&local_id));
                local_obj.global_id = Some(GlobalId::Promoted(global_id));
                info!(camera_id, local_id, global_id, hits, "candidate promoted to global");
            } else {
                local_obj.global_id = Some(GlobalId::Candidate { camera_id: camera_id.to_string(), local_id });
                debug!(camera_id, local_id, hits, confirmation_frames = self.config.confirmation_frames, "candidate updated");
            }
        } else {
            camera_candidates.insert(
                local_id,
                CandidateEntry { hits: 1, data: local_obj.clone(), last_seen: now },
            );
            local_obj.global_id = Some(GlobalId::Candidate { camera_id: camera_id.to_string(), local_id });
            debug!(camera_id, local_id, "new candidate");
        }
    }

    /// Allocates the next strictly-increasing global id (P4) and inserts a
    /// fresh global `ObjectRecord` copying the local track's state.
    fn register_new_object(&mut self, local_obj: ObjectRecord, timestamp: DateTime<Utc>) -> u64 {
        let global_id = self.next_global_id;
        self.next_global_id += 1;
        let global_record = ObjectRecord {
            camera_id: local_obj.camera_id.clone(),
            class_name: local_obj.class_name.clone(),
            local_id: None,
            global_id: Some(GlobalId::Promoted(global_id)),
            trajectory: local_obj.trajectory.clone(),
            local_trajectory: Vec::new(),
            feature: local_obj.feature.clone(),
            update_time: timestamp,
        };
        self.global_objects.insert(global_id, global_record);
        global_id
    }

    /// §4.6.3: fuses every trajectory stashed in `pending_updates` for each
    /// global since its last update, averages features, and advances
    /// `update_time`. Called once at cycle end.
    pub fn apply_pending_updates(&mut self, current_timestamp: DateTime<Utc>) {
        for (global_id, update) in self.pending_updates.drain() {
            let Some(global_obj) = self.global_objects.get_mut(&global_id) else {
                warn!(global_id, "pending update for missing global object; skipping");
                continue;
            };

            global_obj.trajectory = fuse_trajectories(&global_obj.trajectory, &update.trajectories);

            if !update.features.is_empty() {
                let dim = update.features[0].len();
                let mut avg = vec![0.0f32; dim];
                for f in &update.features {
                    for (a, &b) in avg.iter_mut().zip(f) {
                        *a += b;
                    }
                }
                let n = update.features.len() as f32;
                for a in &mut avg {
                    *a /= n;
                }
                global_obj.feature = Some(avg);
            }
            global_obj.update_time = current_timestamp;
        }
    }

    /// §4.6 step 1 / P6: evict globals idle more than `clear_threshold`.
    pub fn clear_stale_objects(&mut self, current_timestamp: DateTime<Utc>) {
        self.global_objects
            .retain(|_, obj| current_timestamp - obj.update_time <= self.config.clear_threshold);
        self.clear_stale_candidates(current_timestamp);
    }

    fn clear_stale_candidates(&mut self, current_timestamp: DateTime<Utc>) {
        self.candidates.retain(|_, tracks| {
            tracks.retain(|_, entry| current_timestamp - entry.last_seen <= self.config.candidate_threshold);
            !tracks.is_empty()
        });
    }

    /// §4.6.2: rejects a proposed match when the most-recent trajectory
    /// points of the local and global candidate are farther apart (in
    /// meters) than `distance_threshold_m`. Silently skipped (once logged)
    /// when no map scale is configured.
    fn should_reject_by_distance(&mut self, local_obj: &ObjectRecord, global_id: u64) -> bool {
        let Some(threshold) = self.config.distance_threshold_m else {
            return false;
        };
        let Some(scale) = self.config.map_scale else {
            if !self.distance_warning_logged {
                warn!("distance threshold set but map scale unavailable; skipping distance guard");
                self.distance_warning_logged = true;
            }
            return false;
        };
        let Some(local_xy) = local_obj.trajectory.last() else {
            return false;
        };
        let Some(global_xy) = self.global_objects.get(&global_id).and_then(|o| o.trajectory.last()) else {
            return false;
        };
        let dx = (local_xy.x - global_xy.x) * scale.meters_per_pixel_x;
        let dy = (local_xy.y - global_xy.y) * scale.meters_per_pixel_y;
        let distance = dx.hypot(dy);
        distance > threshold
    }
}

/// Weighted time-aligned merge of locals contributing since the global's
/// last update (§4.6.3). Points at or before the global's current latest
/// timestamp are never touched (P7); points after it are averaged (equal
/// weight by default) across every camera that reported at that exact
/// timestamp and appended in time order.
fn fuse_trajectories(global: &[TrajectoryPoint], locals: &[Vec<TrajectoryPoint>]) -> Vec<TrajectoryPoint> {
    let t_star = global.iter().map(|p| p.timestamp).max();

    let mut by_time: HashMap<DateTime<Utc>, Vec<(f64, f64)>> = HashMap::new();
    for traj in locals {
        for p in traj {
            if t_star.map_or(true, |t_star| p.timestamp > t_star) {
                by_time.entry(p.timestamp).or_default().push((p.x, p.y));
            }
        }
    }

    let mut fused: Vec<TrajectoryPoint> = global.to_vec();
    let mut new_points: Vec<TrajectoryPoint> = by_time
        .into_iter()
        .map(|(timestamp, points)| {
            let n = points.len() as f64;
            let x = points.iter().map(|p| p.0).sum::<f64>() / n;
            let y = points.iter().map(|p| p.1).sum::<f64>() / n;
            TrajectoryPoint::new(timestamp, x, y)
        })
        .collect();
    new_points.sort_by_key(|p| p.timestamp);
    fused.extend(new_points);
    fused
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcmot_types::BBox;

    fn t(secs: i64) -> DateTime<Utc> {
        DateTime::UNIX_EPOCH + Duration::seconds(secs)
    }

    fn local(local_id: i64, class: &str, x: f64, y: f64, ts: DateTime<Utc>) -> ObjectRecord {
        ObjectRecord {
            camera_id: "cam_a".into(),
            class_name: class.into(),
            local_id: Some(local_id),
            global_id: None,
            trajectory: vec![TrajectoryPoint::new(ts, x, y)],
            local_trajectory: Vec::new(),
            feature: None,
            update_time: ts,
        }
    }

    #[test]
    fn promotes_after_confirmation_frames_hits() {
        let mut gallery = Gallery::new(GalleryConfig { confirmation_frames: 3, ..Default::default() });
        for i in 0..3 {
            let obj = local(1, "person", i as f64, 0.0, t(i));
            let out = gallery.batch_update_or_register("cam_a", vec![obj], t(i));
            if i < 2 {
                assert!(matches!(out[0].global_id, Some(GlobalId::Candidate { .. })));
            } else {
                assert!(matches!(out[0].global_id, Some(GlobalId::Promoted(0))));
            }
        }
        assert_eq!(gallery.global_objects().count(), 1);
    }

    #[test]
    fn global_ids_are_monotone_starting_at_zero() {
        // confirmation_frames=1 still needs a second sighting to promote:
        // the first sighting always creates the candidate entry (hits=1)
        // without checking the threshold, matching the original state machine.
        let mut gallery = Gallery::new(GalleryConfig {
            confirmation_frames: 1,
            match_threshold: Some(0.5),
            ..Default::default()
        });
        // local 2 stays far from local 1 in trajectory space so it cannot
        // accidentally match local 1's freshly promoted global.
        gallery.batch_update_or_register("cam_a", vec![local(1, "person", 0.0, 0.0, t(0))], t(0));
        gallery.batch_update_or_register("cam_a", vec![local(2, "person", 500.0, 500.0, t(0))], t(0));
        let out1 = gallery.batch_update_or_register("cam_a", vec![local(1, "person", 1.0, 0.0, t(1))], t(1));
        let out2 = gallery.batch_update_or_register("cam_a", vec![local(2, "person", 501.0, 500.0, t(1))], t(1));
        assert!(matches!(out1[0].global_id, Some(GlobalId::Promoted(0))));
        assert!(matches!(out2[0].global_id, Some(GlobalId::Promoted(1))));
    }

    #[test]
    fn class_isolation_prevents_cross_class_matches() {
        let mut gallery = Gallery::new(GalleryConfig { confirmation_frames: 1, ..Default::default() });
        gallery.batch_update_or_register("cam_a", vec![local(1, "person", 0.0, 0.0, t(0))], t(0));
        gallery.batch_update_or_register("cam_a", vec![local(1, "person", 1.0, 0.0, t(1))], t(1));
        gallery.batch_update_or_register("cam_a", vec![local(2, "car", 0.0, 0.0, t(2))], t(2));
        let out = gallery.batch_update_or_register("cam_a", vec![local(2, "car", 1.0, 0.0, t(3))], t(3));
        // A new global for "car" must be registered; it cannot match the "person" global.
        assert!(matches!(out[0].global_id, Some(GlobalId::Promoted(1))));
    }

    #[test]
    fn stale_globals_are_evicted_after_clear_threshold() {
        let mut gallery = Gallery::new(GalleryConfig {
            confirmation_frames: 1,
            clear_threshold: Duration::seconds(60),
            ..Default::default()
        });
        gallery.batch_update_or_register("cam_a", vec![local(1, "person", 0.0, 0.0, t(0))], t(0));
        gallery.batch_update_or_register("cam_a", vec![local(1, "person", 1.0, 0.0, t(1))], t(1));
        assert_eq!(gallery.global_objects().count(), 1);
        gallery.clear_stale_objects(t(62));
        assert_eq!(gallery.global_objects().count(), 0);
    }

    #[test]
    fn stale_candidates_are_evicted_after_candidate_threshold() {
        let mut gallery = Gallery::new(GalleryConfig {
            confirmation_frames: 5,
            candidate_threshold: Duration::seconds(10),
            ..Default::default()
        });
        gallery.batch_update_or_register("cam_a", vec![local(1, "person", 0.0, 0.0, t(0))], t(0));
        gallery.clear_stale_objects(t(11));
        let out = gallery.batch_update_or_register("cam_a", vec![local(1, "person", 0.0, 0.0, t(11))], t(11));
        // The earlier candidate's hit count must have been reset (evicted), so this is hit=1 again.
        assert!(matches!(out[0].global_id, Some(GlobalId::Candidate { .. })));
    }

    #[test]
    fn fusion_leaves_points_at_or_before_t_star_untouched() {
        let global = vec![TrajectoryPoint::new(t(0), 1.0, 1.0), TrajectoryPoint::new(t(1), 2.0, 2.0)];
        let locals = vec![vec![TrajectoryPoint::new(t(1), 99.0, 99.0), TrajectoryPoint::new(t(2), 3.0, 3.0)]];
        let fused = fuse_trajectories(&global, &locals);
        assert_eq!(fused[0], global[0]);
        assert_eq!(fused[1], global[1]);
        assert_eq!(fused[2], TrajectoryPoint::new(t(2), 3.0, 3.0));
    }

    #[test]
    fn fusion_averages_same_timestamp_contributions_from_multiple_cameras() {
        let global = vec![TrajectoryPoint::new(t(0), 0.0, 0.0)];
        let locals = vec![
            vec![TrajectoryPoint::new(t(1), 0.0, 0.0)],
            vec![TrajectoryPoint::new(t(1), 10.0, 10.0)],
        ];
        let fused = fuse_trajectories(&global, &locals);
        assert_eq!(fused[1].x, 5.0);
        assert_eq!(fused[1].y, 5.0);
    }

    #[test]
    fn promoted_local_bbox_is_unused_after_registration() {
        // Sanity: BBox::new still enforced upstream; gallery only sees trajectories.
        assert!(BBox::new(0.0, 0.0, 1.0, 1.0).is_ok());
    }
}
