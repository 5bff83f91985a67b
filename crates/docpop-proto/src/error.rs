//! Protocol error types.

use thiserror::Error;

/// Errors raised while building or manipulating documents and requests.
#[derive(Debug, Error)]
pub enum Error {
    /// A field path could not be parsed.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// A populate spec is malformed.
    #[error("invalid populate spec: {0}")]
    InvalidSpec(String),

    /// A projection mixes inclusion and exclusion or names no fields.
    #[error("invalid projection: {0}")]
    InvalidProjection(String),

    /// The entity backend failed to save or remove a document.
    #[error("backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl Error {
    /// Wrap any backend error.
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Error::Backend(Box::new(err))
    }
}
