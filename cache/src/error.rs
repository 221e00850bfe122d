use thiserror::Error;

/// Errors returned by the cache layer.
#[derive(Error, Debug)]
pub enum Error {
    /// The single sentinel for keys that are absent or expired. Identical
    /// across every backend so callers can match on one constant.
    #[error("cache: not found")]
    NotFound,

    #[error("cache: serialization error: {0}")]
    Serialization(String),

    /// Engine and I/O failures, propagated verbatim and never retried here.
    #[error("cache: engine error: {0}")]
    Engine(#[from] hoard_kv::EngineError),

    #[error("cache: unsupported backend: {0}")]
    UnsupportedBackend(String),
}

impl Error {
    /// Reports whether this is the not-found sentinel.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound)
    }
}

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, Error>;
