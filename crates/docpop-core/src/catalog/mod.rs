//! Reference metadata registry.
//!
//! The registry records, per collection and field path, which collection a
//! reference points at, whether it holds one identifier or many, and which
//! identifier type it stores. It is built once, validated, and then shared by
//! reference.

mod collection;
mod reference;
mod registry;

pub use collection::CollectionDef;
pub use reference::{Cardinality, ReferenceDescriptor};
pub use registry::{Registry, RegistryBuilder};
