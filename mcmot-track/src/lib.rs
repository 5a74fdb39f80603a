//! Multi-camera multi-object tracking core: trajectory recording, Kalman
//! interpolation, cost-based assignment and the global-identity gallery
//! (components C3 through C7).

mod coordinator;
mod cost;
mod error;
mod gallery;
mod interpolate;
mod matcher;
mod record_service;

pub use coordinator::{CameraEntry, Coordinator};
pub use cost::{build_cost_matrix, feature_difference, trajectory_difference, CostParams, MatchInput, TrajMethod};
pub use error::{Error, Result};
pub use gallery::{Gallery, GalleryConfig, MapScale};
pub use interpolate::interpolate_trajectory;
pub use matcher::{assign, Assignment, PAD_COST};
pub use record_service::RecordService;
