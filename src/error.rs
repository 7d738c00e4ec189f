//! Error types for the demand miner.
//!
//! Upstream failures never surface here: the engine degrades them into run
//! summary records. These variants cover what stops a run from starting or
//! what the persistence layer reports.

/// Top-level error type for the mining engine.
#[derive(Debug, thiserror::Error)]
pub enum MinerError {
    /// Invalid configuration, profile, or word group input.
    #[error("config error: {0}")]
    Config(String),

    /// The persisted cache could not be read or decoded.
    #[error("cache corruption: {0}")]
    CacheCorruption(String),

    /// Serialization of cache or results failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<miner_sources::SourceError> for MinerError {
    fn from(err: miner_sources::SourceError) -> Self {
        Self::Config(err.to_string())
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, MinerError>;
