//! Error types for ensayo
//!
//! Toyota Way: Clear error messages with actionable guidance (Respect for People)
//!
//! Not-found and not-ready conditions are deliberately NOT errors: operations
//! report them as `Ok(false)` / `Ok(None)` so batch call sites can proceed
//! without per-call error handling. `Error` is reserved for structural
//! rejection and infrastructure failure.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Ensayo error types
#[derive(Error, Debug)]
pub enum Error {
    /// Experiment failed structural validation (nothing is stored)
    #[error("Experiment validation failed: {0}")]
    Validation(String),

    /// Storage adapter failure (the in-memory state may be ahead of the store)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Record encode/decode failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error from a durable storage adapter
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
