//! Shared domain types for the mcmot tracking daemon.
//!
//! These mirror the DATA MODEL section of the tracking specification:
//! events arriving from edge cameras, the trajectory points and object
//! records that the tracking core operates on, and the small configuration
//! value types (`CameraConfig`, `MapConfig`) that are threaded through by
//! reference from startup.

mod error;

pub use error::{Error, Result};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Axis-aligned detection box in pixel coordinates, `x2 > x1`, `y2 > y1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Result<Self> {
        if x2 <= x1 || y2 <= y1 {
            return Err(Error::InvalidBBox { x1, y1, x2, y2 });
        }
        Ok(Self { x1, y1, x2, y2 })
    }

    /// Bottom-center point of the box: `((x1+x2)/2, y2)`. This is the single
    /// point the record service tracks for each detection.
    pub fn bottom_center(&self) -> (f64, f64) {
        ((self.x1 + self.x2) / 2.0, self.y2)
    }
}

/// One detected object within an [`Event`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub class_name: String,
    pub local_id: i64,
    pub bbox: BBox,
    pub score: f64,
    #[serde(default)]
    pub feature: Option<Vec<f32>>,
}

/// A detection report for one camera at one instant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub camera_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub detections: Vec<Detection>,
    #[serde(default)]
    pub models: Option<serde_json::Value>,
}

/// `(timestamp, x, y)`, ordered by time within a trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    pub timestamp: DateTime<Utc>,
    pub x: f64,
    pub y: f64,
}

impl TrajectoryPoint {
    pub fn new(timestamp: DateTime<Utc>, x: f64, y: f64) -> Self {
        Self { timestamp, x, y }
    }
}

/// The identity attached to an [`ObjectRecord`]: either a numeric global id
/// assigned by the gallery, or a temporary candidate id encoding the
/// originating `(camera, local_id)` pair while the record awaits promotion.
///
/// Wire representation matches the original system's string ids: a promoted
/// record serializes as its decimal number (`"0"`, `"1"`, ...), a candidate
/// as `candidate_<camera>_<local>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GlobalId {
    Promoted(u64),
    Candidate { camera_id: String, local_id: i64 },
}

impl std::fmt::Display for GlobalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GlobalId::Promoted(id) => write!(f, "{id}"),
            GlobalId::Candidate {
                camera_id,
                local_id,
            } => write!(f, "candidate_{camera_id}_{local_id}"),
        }
    }
}

impl std::str::FromStr for GlobalId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if let Some(rest) = s.strip_prefix("candidate_") {
            let (camera_id, local_id) = rest.rsplit_once('_').ok_or_else(|| Error::MalformedGlobalId {
                raw: s.to_string(),
            })?;
            let local_id = local_id
                .parse::<i64>()
                .map_err(|_| Error::MalformedGlobalId { raw: s.to_string() })?;
            return Ok(GlobalId::Candidate {
                camera_id: camera_id.to_string(),
                local_id,
            });
        }
        s.parse::<u64>()
            .map(GlobalId::Promoted)
            .map_err(|_| Error::MalformedGlobalId { raw: s.to_string() })
    }
}

impl Serialize for GlobalId {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for GlobalId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// The unified tracking unit threaded through the record service, the
/// coordinate mappers, and the gallery.
///
/// A local record has `local_id = Some(_)` and either a candidate or
/// (once matched) a promoted `global_id`. A pure global record (as stored in
/// the gallery's `global_objects` map) has `local_id = None` and a promoted
/// `global_id`.
///
/// `trajectory` is always in the coordinate space the gallery matches on
/// (world/map meters once the coordinate transform has run). `local_trajectory`
/// is the raw per-camera pixel-space history the record service maintains;
/// it is retained alongside `trajectory` for diagnostics and is never used
/// for matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub camera_id: String,
    pub class_name: String,
    pub local_id: Option<i64>,
    pub global_id: Option<GlobalId>,
    pub trajectory: Vec<TrajectoryPoint>,
    #[serde(default)]
    pub local_trajectory: Vec<TrajectoryPoint>,
    #[serde(default)]
    pub feature: Option<Vec<f32>>,
    pub update_time: DateTime<Utc>,
}

impl ObjectRecord {
    pub fn latest_point(&self) -> Option<&TrajectoryPoint> {
        self.trajectory.last()
    }
}

/// Per-camera configuration known to the daemon: identity, transform file,
/// and optional ignore region. The enabled camera set must be non-empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    pub camera_id: String,
    #[serde(default)]
    pub edge_id: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub coordinate_matrix_ckpt: PathBuf,
    #[serde(default)]
    pub ignore_polygon: Option<Vec<(f64, f64)>>,
    #[serde(default)]
    pub color_hex: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Shared floor-plan dimensions: pixel extent and physical extent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MapConfig {
    pub pixel_width: u32,
    pub pixel_height: u32,
    pub width_meters: f64,
    pub height_meters: f64,
}

impl MapConfig {
    pub fn meters_per_pixel_x(&self) -> f64 {
        self.width_meters / self.pixel_width as f64
    }

    pub fn meters_per_pixel_y(&self) -> f64 {
        self.height_meters / self.pixel_height as f64
    }
}

/// A local track awaiting promotion to a global identity.
#[derive(Debug, Clone)]
pub struct CandidateRecord {
    pub hits: u32,
    pub data: ObjectRecord,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// The control plane's current symbolic operating mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    pub name: String,
    pub is_working_hours: bool,
}

impl Phase {
    pub fn new(name: impl Into<String>, is_working_hours: bool) -> Self {
        Self {
            name: name.into(),
            is_working_hours,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bbox_rejects_degenerate() {
        assert!(BBox::new(10.0, 10.0, 10.0, 20.0).is_err());
        assert!(BBox::new(10.0, 20.0, 15.0, 10.0).is_err());
        assert!(BBox::new(10.0, 10.0, 15.0, 20.0).is_ok());
    }

    #[test]
    fn bbox_bottom_center() {
        let b = BBox::new(10.0, 10.0, 20.0, 30.0).unwrap();
        assert_eq!(b.bottom_center(), (15.0, 30.0));
    }

    #[test]
    fn global_id_round_trips_through_display_and_parse() {
        let promoted = GlobalId::Promoted(42);
        assert_eq!(promoted.to_string(), "42");
        assert_eq!("42".parse::<GlobalId>().unwrap(), promoted);

        let candidate = GlobalId::Candidate {
            camera_id: "cam_a".to_string(),
            local_id: 7,
        };
        assert_eq!(candidate.to_string(), "candidate_cam_a_7");
        assert_eq!("candidate_cam_a_7".parse::<GlobalId>().unwrap(), candidate);
    }

    #[test]
    fn global_id_rejects_garbage() {
        assert!("not_a_number".parse::<GlobalId>().is_err());
    }

    #[test]
    fn map_config_scale() {
        let m = MapConfig {
            pixel_width: 1000,
            pixel_height: 500,
            width_meters: 50.0,
            height_meters: 25.0,
        };
        assert!((m.meters_per_pixel_x() - 0.05).abs() < 1e-9);
        assert!((m.meters_per_pixel_y() - 0.05).abs() < 1e-9);
    }
}
