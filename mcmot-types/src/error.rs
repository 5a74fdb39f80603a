#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{source}")]
    SerdeJson {
        #[from]
        source: serde_json::Error,
    },
    #[error("invalid bbox: x2 ({x2}) must exceed x1 ({x1}) and y2 ({y2}) must exceed y1 ({y1})")]
    InvalidBBox { x1: f64, y1: f64, x2: f64, y2: f64 },
    #[error("unparseable timestamp: {raw}")]
    InvalidTimestamp { raw: String },
    #[error("missing camera_id")]
    MissingCameraId,
    #[error("malformed global id: {raw}")]
    MalformedGlobalId { raw: String },
}

pub type Result<T> = std::result::Result<T, Error>;
