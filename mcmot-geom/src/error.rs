#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("{source}")]
    SerdeJson {
        #[from]
        source: serde_json::Error,
    },
    #[error("mapper not loaded")]
    NotLoaded,
    #[error("fewer than 4 point correspondences supplied ({count})")]
    TooFewCorrespondences { count: usize },
    #[error("homography is singular or degenerate")]
    SingularHomography,
    #[error("point out of bounds: ({x}, {y})")]
    OutOfBounds { x: f64, y: f64 },
    #[error("dense (thin-plate-spline) mappers do not support the inverse (global to pixel) direction")]
    UnsupportedDirection,
    #[error("malformed dense map file: {reason}")]
    MalformedMapFile { reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
