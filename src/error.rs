//! Cache error types

/// Cache-related errors
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// A level or bus was declared without the pieces it needs.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An error returned by a tier or the authoritative source.
    ///
    /// Propagated to the caller verbatim; the orchestrator never retries.
    #[error("Backend error: {0}")]
    Backend(#[from] Box<dyn std::error::Error + Send + Sync>),

    /// A notice carried a command byte outside the recognized set.
    #[error("Unknown notice command: {0}")]
    UnknownCommand(u8),

    /// Notice encoding or decoding failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CacheError {
    /// Wrap an arbitrary backend failure.
    pub fn backend(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        CacheError::Backend(err.into())
    }
}
