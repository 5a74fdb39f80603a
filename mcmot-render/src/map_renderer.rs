//! Map renderer (component C14): draws global and local object positions
//! onto the floor-plan image and writes a timestamped snapshot.
//!
//! Grounded on the original `MapVisualizer`; text stamping follows
//! `media-utils/font-drawing`'s rusttype glyph-draw approach, adapted from
//! that crate's video-frame `ImageMutStride` target to a plain
//! `image::RgbImage` buffer.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use image::{Rgb, RgbImage};
use mcmot_types::{MapConfig, ObjectRecord};
use rusttype::{point, Font, Scale};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Write,
    Show,
    Both,
}

impl RenderMode {
    fn writes(self) -> bool {
        matches!(self, RenderMode::Write | RenderMode::Both)
    }

    fn shows(self) -> bool {
        matches!(self, RenderMode::Show | RenderMode::Both)
    }
}

/// One local object's annotation alongside its matched global (if any).
#[derive(Debug, Clone)]
pub struct LocalAnnotation {
    pub camera_id: String,
    pub class_name: String,
    pub local_id: Option<i64>,
    pub global_position: (f64, f64),
    pub distance_to_global_m: Option<f64>,
    pub color: Rgb<u8>,
}

fn hex_to_rgb(hex: &str) -> Option<Rgb<u8>> {
    let hex = hex.trim_start_matches('#');
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some(Rgb([r, g, b]))
}

fn draw_filled_circle(image: &mut RgbImage, center: (f64, f64), radius: f64, color: Rgb<u8>) {
    let (cx, cy) = center;
    let r = radius.max(1.0);
    let x_min = (cx - r).floor().max(0.0) as i64;
    let x_max = (cx + r).ceil().min(image.width() as f64 - 1.0) as i64;
    let y_min = (cy - r).floor().max(0.0) as i64;
    let y_max = (cy + r).ceil().min(image.height() as f64 - 1.0) as i64;
    for y in y_min..=y_max {
        for x in x_min..=x_max {
            let dx = x as f64 - cx;
            let dy = y as f64 - cy;
            if dx * dx + dy * dy <= r * r {
                image.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}

fn put_pixel_blended(image: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>, alpha: f64) {
    if x < 0 || y < 0 || x as u32 >= image.width() || y as u32 >= image.height() {
        return;
    }
    let old = *image.get_pixel(x as u32, y as u32);
    let q = alpha.clamp(0.0, 1.0);
    let p = 1.0 - q;
    let blended = Rgb([
        (old[0] as f64 * p + color[0] as f64 * q).round() as u8,
        (old[1] as f64 * p + color[1] as f64 * q).round() as u8,
        (old[2] as f64 * p + color[2] as f64 * q).round() as u8,
    ]);
    image.put_pixel(x as u32, y as u32, blended);
}

fn draw_label(image: &mut RgbImage, font: &Font<'_>, text: &str, origin: (f64, f64), color: Rgb<u8>) {
    let scale = Scale::uniform(14.0);
    let v_metrics = font.v_metrics(scale);
    let glyphs: Vec<_> = font.layout(text, scale, point(origin.0 as f32, origin.1 as f32 + v_metrics.ascent)).collect();
    for glyph in glyphs {
        if let Some(bounds) = glyph.pixel_bounding_box() {
            glyph.draw(|x, y, coverage| {
                put_pixel_blended(image, x as i64 + bounds.min.x as i64, y as i64 + bounds.min.y as i64, color, coverage as f64);
            });
        }
    }
}

struct CachedImage {
    path: PathBuf,
    mtime: SystemTime,
    image: RgbImage,
}

/// Renders the floor plan with the current tracked objects. Caches the
/// decoded base image by the source file's mtime so repeated calls within a
/// cycle do not re-decode a static asset.
pub struct MapRenderer {
    base_image_path: PathBuf,
    map_config: MapConfig,
    global_radius_ratio: f64,
    output_dir: PathBuf,
    font: Option<Font<'static>>,
    cached: Option<CachedImage>,
}

impl MapRenderer {
    pub fn new(base_image_path: PathBuf, map_config: MapConfig, global_radius_ratio: f64, output_dir: PathBuf, font_path: Option<&Path>) -> Result<Self> {
        let font = match font_path {
            Some(path) => {
                let bytes = std::fs::read(path)?;
                Some(Font::try_from_vec(bytes).ok_or_else(|| Error::InvalidFont(path.display().to_string()))?)
            }
            None => None,
        };
        Ok(Self { base_image_path, map_config, global_radius_ratio, output_dir, font, cached: None })
    }

    fn load_base_image(&mut self) -> Result<RgbImage> {
        let mtime = std::fs::metadata(&self.base_image_path)?.modified()?;
        if let Some(cached) = &self.cached {
            if cached.path == self.base_image_path && cached.mtime == mtime {
                return Ok(cached.image.clone());
            }
        }
        let decoded = image::open(&self.base_image_path)?.to_rgb8();
        self.cached = Some(CachedImage { path: self.base_image_path.clone(), mtime, image: decoded.clone() });
        Ok(decoded)
    }

    fn meters_to_pixels(&self, point_m: (f64, f64)) -> (f64, f64) {
        (point_m.0 / self.map_config.meters_per_pixel_x(), point_m.1 / self.map_config.meters_per_pixel_y())
    }

    /// Draws the current snapshot and, in write/both modes, writes a
    /// timestamped PNG into `output_dir`. Returns the path written, if any.
    /// Never mutates `globals`/`locals`.
    pub fn render(&mut self, globals: &[ObjectRecord], locals: &[LocalAnnotation], timestamp: DateTime<Utc>, mode: RenderMode) -> Result<Option<PathBuf>> {
        let mut image = self.load_base_image()?;
        let min_dim = image.width().min(image.height()) as f64;
        let global_radius = min_dim * self.global_radius_ratio;
        let local_radius = (global_radius * 0.5).max(1.0);

        let global_positions: HashMap<String, (f64, f64)> = globals
            .iter()
            .filter_map(|g| Some((g.global_id.as_ref()?.to_string(), g.latest_point().map(|p| (p.x, p.y))?)))
            .collect();

        for global in globals {
            let Some(point) = global.latest_point() else { continue };
            let pixel = self.meters_to_pixels((point.x, point.y));
            draw_filled_circle(&mut image, pixel, global_radius, Rgb([255, 0, 0]));
            if let Some(font) = &self.font {
                let label = match &global.global_id {
                    Some(id) => format!("g{id}"),
                    None => "g?".to_string(),
                };
                draw_label(&mut image, font, &label, (pixel.0 + global_radius, pixel.1), Rgb([255, 0, 0]));
            }
        }

        for local in locals {
            let pixel = self.meters_to_pixels(local.global_position);
            draw_filled_circle(&mut image, pixel, local_radius, local.color);
            if let Some(font) = &self.font {
                let mut label = local.class_name.clone();
                if let Some(local_id) = local.local_id {
                    label.push_str(&format!("#{local_id}"));
                }
                if let Some(distance) = local.distance_to_global_m {
                    label.push_str(&format!(" {distance:.2}m"));
                } else if !global_positions.is_empty() {
                    label.push_str(" (unmatched)");
                }
                draw_label(&mut image, font, &label, (pixel.0 + local_radius, pixel.1 + local_radius), local.color);
            }
        }

        let mut written = None;
        if mode.writes() {
            std::fs::create_dir_all(&self.output_dir)?;
            let filename = format!("map_{}.png", timestamp.format("%Y%m%dT%H%M%S%.3f"));
            let path = self.output_dir.join(filename);
            image.save(&path)?;
            written = Some(path);
        }
        if mode.shows() {
            tracing::debug!("interactive display is not available in this headless build; skipping window update");
        }
        Ok(written)
    }
}

pub fn resolve_color(color_hex: Option<&str>, fallback: Rgb<u8>) -> Rgb<u8> {
    color_hex.and_then(hex_to_rgb).unwrap_or(fallback)
}
