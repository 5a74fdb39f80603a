//! Floor-plan map rendering (component C14).

mod error;
mod map_renderer;

pub use error::{Error, Result};
pub use map_renderer::{resolve_color, LocalAnnotation, MapRenderer, RenderMode};
