#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("{source}")]
    Image {
        #[from]
        source: image::ImageError,
    },
    #[error("base floor image path has no parent directory or is otherwise unreadable: {0}")]
    UnreadableBaseImage(String),
    #[error("font file could not be parsed: {0}")]
    InvalidFont(String),
}

pub type Result<T> = std::result::Result<T, Error>;
