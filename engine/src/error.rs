//! Error types for the stitch engine.

use thiserror::Error;

/// All possible errors from the stitch engine.
///
/// Staging mutations never produce errors - input that cannot be resolved
/// leaves the state untouched. Errors arise only at the collaborator
/// boundary and when serializing the outbound payload.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("lookup failed: {0}")]
    Lookup(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

impl Error {
    /// Wrap a collaborator failure into a [`Error::Lookup`].
    pub fn lookup(err: impl std::fmt::Display) -> Self {
        Error::Lookup(err.to_string())
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
