#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("pipeline node {node} failed: {reason}")]
    NodeFailed { node: String, reason: String },
    #[error("unknown pipeline {0:?}")]
    UnknownPipeline(String),
    #[error("unknown phase {0:?}")]
    UnknownPhase(String),
    #[error("startup task {task} failed fatally: {reason}")]
    StartupFailed { task: String, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
