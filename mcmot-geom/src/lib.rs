//! Per-camera pixel<->world coordinate mappers (component C2).
//!
//! Two interchangeable variants are provided, selected per deployment via
//! `coordinate_transform_mode`:
//!
//! - [`ProjectiveMapper`] — a 3x3 homography, invertible both ways.
//! - [`DenseMapper`] — a precomputed per-pixel lookup table (thin-plate
//!   spline output), forward (pixel -> world) only.
//!
//! Both are unified behind the [`CoordinateMapper`] trait so the tracking
//! coordinator can hold one mapper per enabled camera without caring which
//! variant backs it.

mod dense;
mod error;
mod projective;

pub use dense::DenseMapper;
pub use error::{Error, Result};
pub use projective::ProjectiveMapper;

/// Capability shared by both coordinate mapper variants: transform a point
/// or a batch of points, forward (pixel -> world) or, where supported,
/// backward (world -> pixel).
pub trait CoordinateMapper: Send + Sync {
    fn transform_point(&self, point: (f64, f64), inverse: bool) -> Result<(f64, f64)>;
    fn transform_points(&self, points: &[(f64, f64)], inverse: bool) -> Result<Vec<(f64, f64)>>;
}

impl CoordinateMapper for ProjectiveMapper {
    fn transform_point(&self, point: (f64, f64), inverse: bool) -> Result<(f64, f64)> {
        ProjectiveMapper::transform_point(self, point, inverse)
    }

    fn transform_points(&self, points: &[(f64, f64)], inverse: bool) -> Result<Vec<(f64, f64)>> {
        ProjectiveMapper::transform_points(self, points, inverse)
    }
}

impl CoordinateMapper for DenseMapper {
    fn transform_point(&self, point: (f64, f64), inverse: bool) -> Result<(f64, f64)> {
        DenseMapper::transform_point(self, point, inverse)
    }

    fn transform_points(&self, points: &[(f64, f64)], inverse: bool) -> Result<Vec<(f64, f64)>> {
        DenseMapper::transform_points(self, points, inverse)
    }
}

/// Which mapper variant a deployment is configured to use, mirroring the
/// `coordinate_transform_mode` setting in the MCMOT YAML config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformMode {
    Projective,
    Dense,
}

/// Loads the mapper for a single camera according to `mode`, grounded on
/// the one-mapper-per-enabled-camera rule in the tracking coordinator.
pub fn load_mapper(
    mode: TransformMode,
    path: impl AsRef<std::path::Path>,
) -> Result<Box<dyn CoordinateMapper>> {
    match mode {
        TransformMode::Projective => Ok(Box::new(ProjectiveMapper::load(path)?)),
        TransformMode::Dense => Ok(Box::new(DenseMapper::load(path)?)),
    }
}
