//! Error types for the sucre image decoding library.

use thiserror::Error;

/// Primary error type for image decoding operations.
#[derive(Error, Debug)]
pub enum RasterError {
    #[error("type error: expected {expected}, got {got}")]
    TypeError {
        expected: &'static str,
        got: &'static str,
    },

    #[error("key not found: {0}")]
    KeyError(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("resource limit exceeded: {0}")]
    Limit(String),

    #[error("executor error: {0}")]
    Executor(String),
}

/// Convenience Result type alias for RasterError.
pub type Result<T> = std::result::Result<T, RasterError>;
