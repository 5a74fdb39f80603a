//! MCMOT coordinator (component C7): per-event orchestration tying the
//! record service, coordinate mappers, ignore masks, and the gallery
//! together behind a single `process_detected_objects` entry point.
//!
//! Grounded on `MCMOTCoordinator`/`ObjectProcessor` in the original system.
//! Camera configuration (mapper, trackable classes, ignore polygon) is
//! resolved once at startup and held read-only for the coordinator's
//! lifetime (§5's "write-once; then read-only" discipline).

use crate::gallery::Gallery;
use crate::record_service::RecordService;
use chrono::{DateTime, Utc};
use mcmot_geom::CoordinateMapper;
use mcmot_types::{Detection, GlobalId, ObjectRecord};
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// Resolved, read-only per-camera state the coordinator consults every cycle.
pub struct CameraEntry {
    pub camera_id: String,
    pub enabled: bool,
    pub mapper: Option<Box<dyn CoordinateMapper>>,
    pub ignore_polygon: Option<Vec<(f64, f64)>>,
}

/// Ray-casting point-in-polygon test (even-odd rule) used by the ignore
/// mask filter (§4.7 step 5).
fn point_in_polygon(point: (f64, f64), polygon: &[(f64, f64)]) -> bool {
    let (x, y) = point;
    let mut inside = false;
    let n = polygon.len();
    if n < 3 {
        return false;
    }
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = polygon[i];
        let (xj, yj) = polygon[j];
        if ((yi > y) != (yj > y)) && (x < (xj - xi) * (y - yi) / (yj - yi) + xi) {
            inside = !inside;
        }
        j = i;
    }
    inside
}

pub struct Coordinator {
    cameras: HashMap<String, CameraEntry>,
    edge_alias: HashMap<String, String>,
    trackable_classes: HashSet<String>,
    record_service: RecordService,
    gallery: Gallery,
}

impl Coordinator {
    pub fn new(
        cameras: Vec<(String, CameraEntry, Option<String>)>,
        trackable_classes: HashSet<String>,
        record_service: RecordService,
        gallery: Gallery,
    ) -> Self {
        let mut camera_map = HashMap::new();
        let mut edge_alias = HashMap::new();
        for (camera_id, entry, edge_id) in cameras {
            if let Some(edge_id) = edge_id {
                edge_alias.insert(edge_id, camera_id.clone());
            }
            camera_map.insert(camera_id, entry);
        }
        Self { cameras: camera_map, edge_alias, trackable_classes, record_service, gallery }
    }

    fn resolve_camera_id(&self, camera_id: &str) -> String {
        self.edge_alias.get(camera_id).cloned().unwrap_or_else(|| camera_id.to_string())
    }

    /// §4.7: filter → record → transform → ignore-mask → gallery update.
    /// Returns an empty result for an unknown or disabled camera.
    pub fn process_detected_objects(
        &mut self,
        detections: Vec<Detection>,
        camera_id: &str,
        timestamp: DateTime<Utc>,
    ) -> Vec<ObjectRecord> {
        let resolved_id = self.resolve_camera_id(camera_id);
        let Some(camera) = self.cameras.get(&resolved_id) else {
            warn!(camera_id, "event from unknown camera; ignored");
            return Vec::new();
        };
        if !camera.enabled {
            warn!(camera_id = %resolved_id, "event from disabled camera; ignored");
            return Vec::new();
        }

        let trackable: Vec<Detection> = detections
            .into_iter()
            .filter(|d| self.trackable_classes.contains(&d.class_name))
            .collect();
        if trackable.is_empty() {
            return Vec::new();
        }

        let recorded = self.record_service.record_objects(&resolved_id, &trackable, timestamp);

        let camera = &self.cameras[&resolved_id];
        let mut objects = Vec::with_capacity(recorded.len());
        for (detection, local_trajectory) in recorded {
            let global_trajectory = match &camera.mapper {
                Some(mapper) => {
                    let points: Vec<(f64, f64)> = local_trajectory.iter().map(|p| (p.x, p.y)).collect();
                    match mapper.transform_points(&points, false) {
                        Ok(transformed) => transformed
                            .into_iter()
                            .zip(local_trajectory.iter())
                            .map(|((x, y), p)| mcmot_types::TrajectoryPoint::new(p.timestamp, x, y))
                            .collect(),
                        Err(err) => {
                            warn!(camera_id = %resolved_id, %err, "coordinate transform failed; dropping object's world trajectory");
                            continue;
                        }
                    }
                }
                None => {
                    warn!(camera_id = %resolved_id, "no coordinate mapper loaded; objects pass through without global_trajectory");
                    Vec::new()
                }
            };

            if let Some(polygon) = &camera.ignore_polygon {
                let bottom_center = detection.bbox.bottom_center();
                if point_in_polygon(bottom_center, polygon) {
                    continue;
                }
            }

            objects.push(ObjectRecord {
                camera_id: resolved_id.clone(),
                class_name: detection.class_name,
                local_id: Some(detection.local_id),
                global_id: None,
                trajectory: global_trajectory,
                local_trajectory,
                feature: detection.feature,
                update_time: timestamp,
            });
        }

        if objects.is_empty() {
            return Vec::new();
        }

        let mut processed = self.gallery.batch_update_or_register(&resolved_id, objects, timestamp);

        let mapping = self.gallery.local_global_mapping(&resolved_id).cloned().unwrap_or_default();
        for obj in &mut processed {
            if let Some(local_id) = obj.local_id {
                obj.global_id = mapping.get(&local_id).cloned();
            }
        }
        processed
    }

    pub fn finalize_global_updates(&mut self, timestamp: DateTime<Utc>) {
        self.gallery.apply_pending_updates(timestamp);
    }

    pub fn get_all_global_objects(&self) -> Vec<ObjectRecord> {
        self.gallery.global_objects().cloned().collect()
    }

    pub fn local_global_mapping(&self, camera_id: &str) -> Option<HashMap<i64, GlobalId>> {
        self.gallery.local_global_mapping(camera_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gallery::GalleryConfig;
    use mcmot_geom::ProjectiveMapper;
    use mcmot_types::BBox;
    use nalgebra::Matrix3;

    fn identity_mapper() -> Box<dyn CoordinateMapper> {
        Box::new(ProjectiveMapper::from_matrix(Matrix3::identity()).unwrap())
    }

    fn detection(local_id: i64, class: &str, x1: f64, y: f64) -> Detection {
        Detection {
            class_name: class.into(),
            local_id,
            bbox: BBox::new(x1, y - 10.0, x1 + 10.0, y).unwrap(),
            score: 0.9,
            feature: None,
        }
    }

    fn coordinator_with_camera(cam_id: &str, ignore: Option<Vec<(f64, f64)>>) -> Coordinator {
        let mut classes = HashSet::new();
        classes.insert("person".to_string());
        Coordinator::new(
            vec![(
                cam_id.to_string(),
                CameraEntry {
                    camera_id: cam_id.to_string(),
                    enabled: true,
                    mapper: Some(identity_mapper()),
                    ignore_polygon: ignore,
                },
                None,
            )],
            classes,
            RecordService::new(),
            Gallery::new(GalleryConfig { confirmation_frames: 5, ..Default::default() }),
        )
    }

    #[test]
    fn unknown_camera_yields_empty_result() {
        let mut coord = coordinator_with_camera("cam_a", None);
        let out = coord.process_detected_objects(vec![detection(1, "person", 0.0, 0.0)], "cam_z", Utc::now());
        assert!(out.is_empty());
    }

    #[test]
    fn untrackable_class_is_filtered_before_recording() {
        let mut coord = coordinator_with_camera("cam_a", None);
        let out = coord.process_detected_objects(vec![detection(1, "car", 0.0, 0.0)], "cam_a", Utc::now());
        assert!(out.is_empty());
    }

    #[test]
    fn ignore_polygon_drops_only_objects_inside_it() {
        let polygon = vec![(-5.0, -5.0), (5.0, -5.0), (5.0, 5.0), (-5.0, 5.0)];
        let mut coord = coordinator_with_camera("cam_a", Some(polygon));
        let now = Utc::now();
        // local_id 1's bottom-center (5,10) sits outside the ignore box; local_id 2's (0,0.5ish)... use explicit points.
        let inside = Detection {
            class_name: "person".into(),
            local_id: 1,
            bbox: BBox::new(-1.0, -1.0, 1.0, 1.0).unwrap(), // bottom-center (0, 1) is inside
            score: 0.9,
            feature: None,
        };
        let outside = Detection {
            class_name: "person".into(),
            local_id: 2,
            bbox: BBox::new(99.0, 99.0, 101.0, 101.0).unwrap(), // bottom-center (100, 101)
            score: 0.9,
            feature: None,
        };
        let out = coord.process_detected_objects(vec![inside, outside], "cam_a", now);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].local_id, Some(2));
    }

    #[test]
    fn missing_mapper_passes_objects_through_with_empty_global_trajectory() {
        let mut classes = HashSet::new();
        classes.insert("person".to_string());
        let mut coord = Coordinator::new(
            vec![(
                "cam_a".to_string(),
                CameraEntry { camera_id: "cam_a".to_string(), enabled: true, mapper: None, ignore_polygon: None },
                None,
            )],
            classes,
            RecordService::new(),
            Gallery::new(GalleryConfig { confirmation_frames: 5, ..Default::default() }),
        );
        let out = coord.process_detected_objects(vec![detection(1, "person", 0.0, 0.0)], "cam_a", Utc::now());
        assert_eq!(out.len(), 1);
        assert!(out[0].trajectory.is_empty());
    }

    #[test]
    fn promotion_flow_assigns_global_id_after_confirmation_frames() {
        let mut coord = coordinator_with_camera("cam_a", None);
        let mut last = Vec::new();
        for i in 0..5 {
            let now = Utc::now() + chrono::Duration::seconds(i);
            last = coord.process_detected_objects(vec![detection(1, "person", i as f64, 0.0)], "cam_a", now);
        }
        assert_eq!(last.len(), 1);
        assert!(matches!(last[0].global_id, Some(GlobalId::Promoted(0))));
        assert_eq!(coord.get_all_global_objects().len(), 1);
    }
}
