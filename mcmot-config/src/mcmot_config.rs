//! On-disk MCMOT configuration (§6 "MCMOT config (YAML)").
//!
//! Grounded on `braid-config-data`'s versioned-struct pattern: a plain
//! `serde`-derived struct with `deny_unknown_fields`, free-function field
//! defaults, and a `fixup_relative_paths` pass run once after load that
//! resolves every path field relative to the config file's own directory.

use mcmot_geom::TransformMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

fn default_confirmation_frames() -> u32 {
    5
}

fn default_match_threshold() -> f64 {
    1.0
}

fn default_max_traj_loss() -> f64 {
    1000.0
}

fn default_alpha() -> f64 {
    0.5
}

fn default_backtrack_seconds() -> f64 {
    5.0
}

fn default_time_step() -> f64 {
    1.0
}

fn default_clear_threshold_seconds() -> i64 {
    60
}

fn default_candidate_threshold_seconds() -> i64 {
    10
}

fn default_traj_method() -> String {
    "dtw".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SystemSection {
    pub coordinate_transform_mode: TransformMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrackingSection {
    pub trackable_classes: Vec<String>,
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f64,
    #[serde(default = "default_max_traj_loss")]
    pub max_traj_loss: f64,
    #[serde(default)]
    pub distance_threshold_m: Option<f64>,
    #[serde(default = "default_confirmation_frames")]
    pub confirmation_frames: u32,
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    #[serde(default = "default_traj_method")]
    pub traj_method: String,
    #[serde(default = "default_backtrack_seconds")]
    pub backtrack_seconds: f64,
    #[serde(default = "default_time_step")]
    pub time_step: f64,
    #[serde(default = "default_clear_threshold_seconds")]
    pub clear_threshold_seconds: i64,
    #[serde(default = "default_candidate_threshold_seconds")]
    pub candidate_threshold_seconds: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MapSection {
    #[serde(default)]
    pub image_path: Option<PathBuf>,
    pub pixel_width: u32,
    pub pixel_height: u32,
    pub width_meters: f64,
    pub height_meters: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CameraEntryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub edge_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    pub coordinate_matrix_ckpt: PathBuf,
    #[serde(default)]
    pub ignore_polygons: Option<Vec<(f64, f64)>>,
    #[serde(default)]
    pub color_hex: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct McmotConfig {
    pub system: SystemSection,
    pub tracking: TrackingSection,
    pub map: MapSection,
    pub cameras: std::collections::BTreeMap<String, CameraEntryConfig>,
}

/// Split `path` (which must be a file) into directory and filename component.
fn split_path(path: &Path) -> PathBuf {
    let mut components = path.components();
    components.next_back();
    components.as_path().into()
}

/// If `path` is relative, make it relative to `dirname`, expanding shell
/// variables and a leading tilde first.
fn fixup_relative_path(path: &mut PathBuf, dirname: &Path) -> Result<()> {
    let pathstr = path.to_string_lossy();
    let expanded = shellexpand::full(&pathstr)?;
    *path = PathBuf::from(expanded.to_string());
    if path.is_relative() {
        *path = dirname.join(&path);
    }
    Ok(())
}

impl McmotConfig {
    /// Loads and parses the YAML config at `path`, then resolves every
    /// relative path field (camera transform files, map image) against the
    /// config file's own directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let mut config: McmotConfig = serde_yaml::from_str(&contents)?;
        config.fixup_relative_paths(path)?;
        Ok(config)
    }

    fn fixup_relative_paths(&mut self, orig_path: &Path) -> Result<()> {
        let dirname = split_path(orig_path);
        if let Some(image_path) = self.map.image_path.as_mut() {
            fixup_relative_path(image_path, &dirname)?;
        }
        for camera in self.cameras.values_mut() {
            fixup_relative_path(&mut camera.coordinate_matrix_ckpt, &dirname)?;
        }
        Ok(())
    }

    /// Converts the YAML camera map into the daemon-facing
    /// `mcmot_types::CameraConfig` list, keyed by the map's own id.
    pub fn camera_configs(&self) -> Vec<mcmot_types::CameraConfig> {
        self.cameras
            .iter()
            .map(|(camera_id, entry)| mcmot_types::CameraConfig {
                camera_id: camera_id.clone(),
                edge_id: entry.edge_id.clone(),
                enabled: entry.enabled,
                coordinate_matrix_ckpt: entry.coordinate_matrix_ckpt.clone(),
                ignore_polygon: entry.ignore_polygons.clone(),
                color_hex: entry.color_hex.clone(),
            })
            .collect()
    }

    /// Invariant from §3 DATA MODEL: the enabled camera set must be non-empty.
    pub fn validate(&self) -> Result<()> {
        if !self.cameras.values().any(|c| c.enabled) {
            return Err(Error::InvalidEnvValue {
                name: "cameras",
                raw: "<config>".to_string(),
                reason: "no enabled cameras configured".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_yaml() -> String {
        r#"
system:
  coordinate_transform_mode: projective
tracking:
  trackable_classes: [person]
map:
  pixel_width: 1000
  pixel_height: 500
  width_meters: 50.0
  height_meters: 25.0
cameras:
  cam_a:
    coordinate_matrix_ckpt: cam_a.json
"#
        .to_string()
    }

    #[test]
    fn parses_minimal_config_with_defaults() {
        let cfg: McmotConfig = serde_yaml::from_str(&sample_yaml()).unwrap();
        assert_eq!(cfg.tracking.match_threshold, default_match_threshold());
        assert_eq!(cfg.tracking.confirmation_frames, default_confirmation_frames());
        assert!(cfg.cameras["cam_a"].enabled);
    }

    #[test]
    fn unknown_field_is_rejected() {
        let bad = sample_yaml().replace("system:", "bogus_field: 1\nsystem:");
        assert!(serde_yaml::from_str::<McmotConfig>(&bad).is_err());
    }

    #[test]
    fn relative_paths_resolve_against_config_directory() {
        let dir = std::env::temp_dir().join(format!("mcmot-config-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let config_path = dir.join("mcmot.yaml");
        std::fs::write(&config_path, sample_yaml()).unwrap();
        let cfg = McmotConfig::load(&config_path).unwrap();
        assert!(cfg.cameras["cam_a"].coordinate_matrix_ckpt.is_absolute());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn validate_rejects_empty_enabled_set() {
        let mut cfg: McmotConfig = serde_yaml::from_str(&sample_yaml()).unwrap();
        cfg.cameras.get_mut("cam_a").unwrap().enabled = false;
        assert!(cfg.validate().is_err());
    }
}
