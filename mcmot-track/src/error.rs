#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{source}")]
    Geom {
        #[from]
        source: mcmot_geom::Error,
    },
    #[error("feature vectors have mismatched dimensionality: {a} vs {b}")]
    FeatureDimensionMismatch { a: usize, b: usize },
    #[error("assignment matcher received a non-finite cost at ({row}, {col})")]
    NonFiniteCost { row: usize, col: usize },
    #[error("cost matrix has zero rows or columns")]
    DegenerateCostMatrix,
    #[error("gallery has no pending update for global id {global_id}")]
    MissingPendingGlobal { global_id: String },
}

pub type Result<T> = std::result::Result<T, Error>;
