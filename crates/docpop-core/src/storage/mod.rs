//! Storage layer.
//!
//! A sled-backed document store that answers population lookups and persists
//! the entities population hands out.

mod codec;
mod config;
mod store;

pub mod key;

pub use codec::{decode_document, encode_document};
pub use config::StorageConfig;
pub use store::DocumentStore;
