//! Engine error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to spawn render worker: {0}")]
    WorkerSpawn(#[from] std::io::Error),

    #[error("surface reports an empty view ({0}x{1})")]
    EmptySurface(u32, u32),
}
