/// Error taxonomy for the core engine.
///
/// Only operation-level failures (a bad scan root, an invalid task, a
/// cancelled scan) travel through this type. Per-item failures (an
/// unreadable directory, a file that vanished mid-hash, a missing sensor)
/// are logged where they happen and the batch carries on.
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("path not found: {}", .0.display())]
    PathNotFound(PathBuf),

    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache error at {}: {message}", .path.display())]
    CacheIo { path: PathBuf, message: String },

    #[error("serialisation error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("sensor unavailable: {0}")]
    Sensor(String),

    #[error("invalid task: {0}")]
    InvalidTask(String),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("worker pool error: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error("operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;
