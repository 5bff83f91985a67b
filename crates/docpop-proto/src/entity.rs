//! Materialized documents bound to their originating collection.

use std::fmt;
use std::sync::Arc;

use crate::document::{Document, Populatable};
use crate::error::Error;
use crate::value::{DocId, Value};

/// Persistence capability an entity is bound to.
///
/// Implemented by whatever store produced the entity's row.
pub trait EntityBackend: Send + Sync {
    /// Write a document under the given collection and identifier.
    fn save_document(&self, collection: &str, id: &DocId, document: &Document)
        -> Result<(), Error>;

    /// Delete a document. Returns whether it existed.
    fn remove_document(&self, collection: &str, id: &DocId) -> Result<bool, Error>;
}

/// A stateful document that can be saved or removed.
#[derive(Clone)]
pub struct Entity {
    collection: String,
    id: DocId,
    document: Document,
    backend: Arc<dyn EntityBackend>,
}

impl Entity {
    /// Bind a document to its collection, identifier and backend.
    pub fn new(
        collection: impl Into<String>,
        id: DocId,
        document: Document,
        backend: Arc<dyn EntityBackend>,
    ) -> Self {
        Self {
            collection: collection.into(),
            id,
            document,
            backend,
        }
    }

    /// The collection this entity was loaded from.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// The entity's identifier.
    pub fn id(&self) -> &DocId {
        &self.id
    }

    /// The entity's document.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Mutable access to the entity's document.
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    /// Unwrap into the plain document, dropping the backend binding.
    pub fn into_document(self) -> Document {
        self.document
    }

    /// Get a value by dotted path.
    pub fn get(&self, path: &str) -> Option<&Value> {
        self.document.get(path)
    }

    /// Assign a value by dotted path.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> Result<(), Error> {
        self.document.set(path, value)
    }

    /// The raw identifier(s) a populated path held before substitution.
    pub fn populated(&self, path: &str) -> Option<&Value> {
        self.document.populated(path)
    }

    /// Check if a path currently holds document content.
    pub fn is_populated(&self, path: &str) -> bool {
        self.document.is_populated(path)
    }

    /// Restore the raw identifier(s) of a populated path.
    pub fn depopulate(&mut self, path: &str) -> bool {
        self.document.depopulate(path)
    }

    /// Write the entity back to its collection.
    ///
    /// Populated paths are written as their original identifiers.
    pub fn save(&self) -> Result<(), Error> {
        let document = self.document.depopulated();
        self.backend
            .save_document(&self.collection, &self.id, &document)
    }

    /// Delete the entity from its own collection.
    ///
    /// Calling this on a populated sub-document removes the referenced
    /// document from its collection entirely, not just from the field that
    /// referenced it; the referencing document keeps a dangling identifier.
    pub fn remove(&self) -> Result<bool, Error> {
        self.backend.remove_document(&self.collection, &self.id)
    }
}

impl Populatable for Entity {
    fn document(&self) -> &Document {
        &self.document
    }

    fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.collection == other.collection
            && self.id == other.id
            && self.document == other.document
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("collection", &self.collection)
            .field("id", &self.id)
            .field("document", &self.document)
            .finish_non_exhaustive()
    }
}
