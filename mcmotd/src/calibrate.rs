//! `mcmotd calibrate`: the compute-and-save homography tool, the CLI-side
//! counterpart of `ProjectiveMapper::from_point_correspondences` (§3
//! supplement grounded on `homography_mapper.py::compute_and_save_homography`).

use anyhow::{Context, Result};
use mcmot_geom::ProjectiveMapper;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct Correspondence {
    src: (f64, f64),
    dst: (f64, f64),
}

#[derive(Debug, Deserialize)]
struct CorrespondenceFile {
    points: Vec<Correspondence>,
}

pub fn run(points_path: &Path, output_path: &Path) -> Result<()> {
    let contents = std::fs::read_to_string(points_path)
        .with_context(|| format!("reading correspondence points from {}", points_path.display()))?;
    let parsed: CorrespondenceFile =
        serde_json::from_str(&contents).with_context(|| "parsing correspondence points file")?;

    let (src, dst): (Vec<_>, Vec<_>) = parsed.points.into_iter().map(|c| (c.src, c.dst)).unzip();
    let mapper = ProjectiveMapper::from_point_correspondences(&src, &dst)
        .with_context(|| "fitting homography from point correspondences")?;
    mapper
        .save(output_path)
        .with_context(|| format!("writing homography to {}", output_path.display()))?;

    tracing::info!(points = src.len(), output = %output_path.display(), "homography computed and saved");
    Ok(())
}
