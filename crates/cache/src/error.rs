//! Cache error types

use thiserror::Error;

/// Cache-specific errors
#[derive(Debug, Error)]
pub enum CacheError {
    /// Codec, container or stream error (from contract)
    #[error(transparent)]
    Contract(#[from] contracts::ContractError),

    /// Background worker thread could not be started
    #[error("failed to spawn {name} worker: {source}")]
    WorkerSpawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// Background worker panicked
    #[error("{name} worker panicked")]
    WorkerPanicked { name: &'static str },

    /// Worker stopped after a failure that was already reported
    #[error("{name} worker stopped after an earlier error")]
    Aborted { name: &'static str },
}

impl CacheError {
    /// Create a worker spawn error
    pub fn worker_spawn(name: &'static str, source: std::io::Error) -> Self {
        Self::WorkerSpawn { name, source }
    }
}

/// Cache Result type alias
pub type Result<T> = std::result::Result<T, CacheError>;
