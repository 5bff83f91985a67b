//! Lookup batching.
//!
//! Identifiers gathered from every document and spec of one level are grouped
//! into batches, one per distinct set of lookup parameters. Each batch becomes
//! a single [`LookupRequest`].

use std::collections::{HashMap, HashSet};

use docpop_proto::{DocId, Document, FilterExpr, OrderSpec, Projection};

use super::resolver::ResolvedSpec;
use crate::query::LookupRequest;

/// Which source documents a batch serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchScope {
    /// Identifiers from all documents of the level.
    Global,
    /// Identifiers from one document, shared by its filtered fields.
    Document(usize),
    /// Identifiers from one field of one document, so a limit caps that
    /// field's sub-selection only.
    Field { doc: usize, spec: usize },
}

/// Parameters that must match for two specs to share a lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchKey {
    pub target: String,
    pub id_field: String,
    pub filter: Option<FilterExpr>,
    pub projection: Option<Projection>,
    pub sort: Vec<OrderSpec>,
    pub limit: Option<usize>,
    pub scope: BatchScope,
}

impl BatchKey {
    /// The key for the identifiers spec number `index` holds in document
    /// `doc`.
    ///
    /// Returns `None` when the spec can never match anything.
    pub fn for_spec(spec: &ResolvedSpec, index: usize, doc: usize) -> Option<BatchKey> {
        let limit = if spec.is_many() {
            spec.limit
        } else {
            match spec.limit {
                Some(0) => return None,
                // A single identifier is never cut by a positive limit.
                _ => None,
            }
        };
        let scope = match (spec.is_many(), limit.is_some(), spec.filter.is_some()) {
            (true, true, _) => BatchScope::Field { doc, spec: index },
            (true, false, true) => BatchScope::Document(doc),
            _ => BatchScope::Global,
        };

        Some(BatchKey {
            target: spec.target.clone(),
            id_field: spec.id_field.clone(),
            filter: spec.filter.clone(),
            projection: spec.select.clone(),
            // Without a limit, ordering cannot change which rows come back.
            sort: if limit.is_some() {
                spec.sort.clone()
            } else {
                vec![]
            },
            limit,
            scope,
        })
    }
}

/// Distinct identifiers sharing one lookup.
#[derive(Debug)]
pub struct Batch {
    key: BatchKey,
    ids: Vec<DocId>,
    seen: HashSet<DocId>,
}

impl Batch {
    fn new(key: BatchKey) -> Self {
        Self {
            key,
            ids: vec![],
            seen: HashSet::new(),
        }
    }

    /// Add an identifier unless already present.
    pub fn add(&mut self, id: DocId) {
        if self.seen.insert(id.clone()) {
            self.ids.push(id);
        }
    }

    /// Lookup parameters.
    pub fn key(&self) -> &BatchKey {
        &self.key
    }

    /// Distinct identifiers in first-seen order.
    pub fn ids(&self) -> &[DocId] {
        &self.ids
    }

    /// Whether matched rows should lose the identifier field the executor
    /// was asked to return.
    ///
    /// Only an explicit exclusion strips it; inclusion lists keep the
    /// identifier without naming it.
    pub fn strips_id(&self) -> bool {
        match &self.key.projection {
            Some(Projection::Exclude(fields)) => fields.iter().any(|f| *f == self.key.id_field),
            _ => false,
        }
    }

    /// Build the executor request.
    pub fn to_request(&self) -> LookupRequest {
        LookupRequest {
            collection: self.key.target.clone(),
            id_field: self.key.id_field.clone(),
            ids: self.ids.clone(),
            filter: self.key.filter.clone(),
            projection: self
                .key
                .projection
                .as_ref()
                .map(|p| p.with_required(&self.key.id_field)),
            sort: self.key.sort.clone(),
            limit: self.key.limit,
        }
    }

    /// Index rows by identifier, applying the identifier strip.
    pub fn index_rows(&self, rows: Vec<Document>) -> HashMap<DocId, Document> {
        let strip = self.strips_id();
        let mut found = HashMap::with_capacity(rows.len());
        for mut row in rows {
            let Some(id) = row.id(&self.key.id_field) else {
                continue;
            };
            if !self.seen.contains(&id) {
                continue;
            }
            if strip {
                row.remove(&self.key.id_field);
            }
            found.insert(id, row);
        }
        found
    }
}

/// Batches of one level.
#[derive(Debug, Default)]
pub struct BatchSet {
    batches: Vec<Batch>,
}

impl BatchSet {
    /// Create an empty batch set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Find or create the batch for a key and return its index.
    pub fn batch_for(&mut self, key: BatchKey) -> usize {
        match self.batches.iter().position(|b| b.key == key) {
            Some(index) => index,
            None => {
                self.batches.push(Batch::new(key));
                self.batches.len() - 1
            }
        }
    }

    /// Add an identifier to a batch.
    pub fn add(&mut self, batch: usize, id: DocId) {
        self.batches[batch].add(id);
    }

    /// All batches.
    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    /// Number of batches.
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    /// Check if there is nothing to look up.
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}
