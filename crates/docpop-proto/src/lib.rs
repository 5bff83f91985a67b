//! docpop data model and request types.
//!
//! This crate defines the plain data shared by the population engine and
//! the stores it talks to.
//!
//! # Modules
//!
//! - [`value`] - Field values and document identifiers
//! - [`document`] - Documents, populated-field bookkeeping, the populatable capability
//! - [`entity`] - Materialized documents bound to a persistence backend
//! - [`path`] - Dotted field paths and the slot walker
//! - [`query`] - Filters, ordering and projections for lookups
//! - [`populate`] - Populate specs and requests
//! - [`error`] - Error types

pub mod document;
pub mod entity;
pub mod error;
pub mod path;
pub mod populate;
pub mod query;
pub mod value;

pub use error::Error;

// Re-export commonly used types at crate root
pub use document::{Document, Populatable, PopulatedFields};
pub use entity::{Entity, EntityBackend};
pub use path::{FieldPath, PathSet};
pub use populate::{PopulateOptions, PopulateRequest, PopulateSpec};
pub use query::{FilterExpr, OrderDirection, OrderSpec, Projection};
pub use value::{DocId, IdType, Value};
