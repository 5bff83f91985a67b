//! Core error types.

use docpop_proto::IdType;
use thiserror::Error;

use crate::query::LookupError;

/// Population and storage errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(#[from] docpop_proto::Error),

    /// A populate path names no registered reference.
    #[error("no reference registered at '{path}' on '{source_type}'")]
    UnknownReference { source_type: String, path: String },

    /// A reference has no target collection and the spec named none.
    #[error("reference '{path}' on '{source_type}' has no target; set a model on the populate spec")]
    AmbiguousTarget { source_type: String, path: String },

    /// A collection is not registered.
    #[error("unknown collection: {0}")]
    UnknownCollection(String),

    /// A reference's identifier type disagrees with its target collection.
    #[error("reference '{path}' on '{source_type}' holds {actual} identifiers but its target uses {expected}")]
    IdTypeMismatch {
        source_type: String,
        path: String,
        expected: IdType,
        actual: IdType,
    },

    /// The reference registry is inconsistent.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Nested populate specs go deeper than allowed.
    #[error("populate nesting depth {depth} exceeds maximum {max}")]
    DepthExceeded { depth: usize, max: usize },

    /// The query executor failed.
    #[error("lookup in '{collection}' failed")]
    Lookup {
        collection: String,
        #[source]
        source: LookupError,
    },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Invalid data format.
    #[error("invalid data: {0}")]
    InvalidData(String),
}
