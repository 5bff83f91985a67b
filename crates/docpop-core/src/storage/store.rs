//! Sled-backed document store.

use std::borrow::Cow;
use std::collections::HashMap;

use docpop_proto::{DocId, Document, EntityBackend, IdType};
use parking_lot::RwLock;
use sled::{Db, Tree};
use tracing::{debug, trace};

use super::codec::{decode_document, encode_document};
use super::config::StorageConfig;
use super::key::{self, collection_tree, current_timestamp, encode_id};
use crate::error::Error;
use crate::query::{LookupError, LookupRequest, QueryExecutor};

/// Documents grouped by collection, one sled tree per collection.
///
/// The store answers population lookups and backs the entities population
/// materializes, so saving or removing an entity writes here.
pub struct DocumentStore {
    /// The underlying sled database.
    db: Db,

    /// Open collection trees by collection name.
    trees: RwLock<HashMap<String, Tree>>,
}

impl DocumentStore {
    /// Open or create a store with the given configuration.
    pub fn open(config: StorageConfig) -> Result<Self, Error> {
        let db = config.to_sled_config().open()?;
        debug!(
            path = %config.path.display(),
            temporary = config.temporary,
            recovered = db.was_recovered(),
            "opened document store"
        );
        Ok(Self {
            db,
            trees: RwLock::new(HashMap::new()),
        })
    }

    /// Check if the database was recovered from a previous crash.
    pub fn was_recovered(&self) -> bool {
        self.db.was_recovered()
    }

    fn tree(&self, collection: &str) -> Result<Tree, Error> {
        if let Some(tree) = self.trees.read().get(collection) {
            return Ok(tree.clone());
        }
        let tree = self.db.open_tree(collection_tree(collection))?;
        self.trees
            .write()
            .insert(collection.to_string(), tree.clone());
        Ok(tree)
    }

    /// Write a document under `id`, replacing any previous version.
    ///
    /// Populated fields are written back as the identifiers they replaced.
    pub fn insert(&self, collection: &str, id: &DocId, doc: &Document) -> Result<(), Error> {
        let doc = if doc.populated_fields().is_empty() {
            Cow::Borrowed(doc)
        } else {
            Cow::Owned(doc.depopulated())
        };
        let bytes = encode_document(&doc)?;
        self.tree(collection)?.insert(encode_id(id), bytes)?;
        trace!(collection, id = %id, "stored document");
        Ok(())
    }

    /// Write a document keyed by the value of its `id_field`.
    pub fn insert_document(
        &self,
        collection: &str,
        id_field: &str,
        doc: &Document,
    ) -> Result<DocId, Error> {
        let id = doc.id(id_field).ok_or_else(|| {
            Error::InvalidData(format!(
                "document in {} has no usable '{}' field",
                collection, id_field
            ))
        })?;
        self.insert(collection, &id, doc)?;
        Ok(id)
    }

    /// Get a document by identifier.
    pub fn get(&self, collection: &str, id: &DocId) -> Result<Option<Document>, Error> {
        match self.tree(collection)?.get(encode_id(id))? {
            Some(bytes) => Ok(Some(decode_document(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Delete a document. Returns whether it existed.
    pub fn remove(&self, collection: &str, id: &DocId) -> Result<bool, Error> {
        let existed = self.tree(collection)?.remove(encode_id(id))?.is_some();
        trace!(collection, id = %id, existed, "removed document");
        Ok(existed)
    }

    /// Count documents in a collection.
    pub fn count(&self, collection: &str) -> Result<usize, Error> {
        Ok(self.tree(collection)?.len())
    }

    /// All identifiers stored in a collection, in key order.
    pub fn ids(&self, collection: &str) -> Result<Vec<DocId>, Error> {
        self.tree(collection)?
            .iter()
            .keys()
            .map(|k| key::decode_id(&k?))
            .collect()
    }

    /// Generate a fresh identifier of the given type.
    ///
    /// Object identifiers combine the current time with a store-wide counter,
    /// so they are unique within the store and roughly time-ordered.
    pub fn generate_id(&self, id_type: IdType) -> Result<DocId, Error> {
        let counter = self.db.generate_id()?;
        let id = match id_type {
            IdType::Int => DocId::Int(counter as i64 + 1),
            IdType::Uuid | IdType::String => {
                let mut bytes = [0u8; 16];
                bytes[..8].copy_from_slice(&current_timestamp().to_be_bytes());
                bytes[8..].copy_from_slice(&counter.to_be_bytes());
                if id_type == IdType::Uuid {
                    DocId::Uuid(bytes)
                } else {
                    DocId::String(hex::encode(bytes))
                }
            }
        };
        Ok(id)
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<usize, Error> {
        Ok(self.db.flush()?)
    }
}

impl QueryExecutor for DocumentStore {
    fn find_by_ids(&self, request: &LookupRequest) -> Result<Vec<Document>, LookupError> {
        let tree = self.tree(&request.collection).map_err(LookupError::new)?;
        let mut candidates = Vec::with_capacity(request.ids.len());
        for id in &request.ids {
            let Some(bytes) = tree.get(encode_id(id)).map_err(LookupError::new)? else {
                continue;
            };
            let mut doc = decode_document(&bytes).map_err(LookupError::new)?;
            if !doc.contains(&request.id_field) {
                doc.insert(request.id_field.clone(), id.to_value());
            }
            candidates.push(doc);
        }
        trace!(
            collection = %request.collection,
            requested = request.ids.len(),
            found = candidates.len(),
            "loaded lookup candidates"
        );
        Ok(request.apply(candidates))
    }
}

impl EntityBackend for DocumentStore {
    fn save_document(
        &self,
        collection: &str,
        id: &DocId,
        document: &Document,
    ) -> Result<(), docpop_proto::Error> {
        self.insert(collection, id, document)
            .map_err(docpop_proto::Error::backend)
    }

    fn remove_document(&self, collection: &str, id: &DocId) -> Result<bool, docpop_proto::Error> {
        self.remove(collection, id).map_err(docpop_proto::Error::backend)
    }
}
