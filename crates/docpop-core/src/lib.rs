//! docpop core - reference population, reference registry, and document storage.
//!
//! This crate resolves populate requests against a registry of reference
//! fields, batches identifier lookups per nesting level, and substitutes the
//! looked-up documents into the source documents in place.

pub mod catalog;
pub mod config;
pub mod error;
pub mod metrics;
pub mod populate;
pub mod query;
pub mod storage;

pub use catalog::{Cardinality, CollectionDef, ReferenceDescriptor, Registry, RegistryBuilder};
pub use config::PopulateConfig;
pub use error::Error;
pub use populate::{PathResolver, Populator, ResolvedSpec};
pub use query::{LookupError, LookupRequest, QueryExecutor};
pub use storage::{DocumentStore, StorageConfig};

// Metrics exports
pub use metrics::{new_shared_metrics, PopulateMetrics, SharedPopulateMetrics};

/// Re-export protocol types.
pub use docpop_proto as proto;
