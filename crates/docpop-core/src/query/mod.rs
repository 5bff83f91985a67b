//! Lookups against target collections.
//!
//! Population never reads storage directly. It hands a [`LookupRequest`] to a
//! [`QueryExecutor`], which returns the matching documents in any order.

mod filter;

use std::cmp::Ordering;
use std::fmt;

use docpop_proto::{DocId, Document, FilterExpr, OrderDirection, OrderSpec, Projection};

pub use filter::FilterEvaluator;

/// Error returned by a query executor.
///
/// Carried unchanged as the source of [`crate::Error::Lookup`].
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct LookupError(Box<dyn std::error::Error + Send + Sync + 'static>);

impl LookupError {
    /// Wrap an executor error.
    pub fn new(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self(Box::new(err))
    }

    /// Create an error from a message.
    pub fn msg(message: impl fmt::Display) -> Self {
        Self(message.to_string().into())
    }

    /// The wrapped error.
    pub fn inner(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.0.as_ref()
    }
}

/// A batched lookup of documents by identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupRequest {
    /// Target collection.
    pub collection: String,
    /// Identifier field of the target collection.
    pub id_field: String,
    /// Distinct identifiers to fetch.
    pub ids: Vec<DocId>,
    /// Additional condition on returned documents.
    pub filter: Option<FilterExpr>,
    /// Fields to return. Always keeps `id_field`.
    pub projection: Option<Projection>,
    /// Ordering applied before `limit`.
    pub sort: Vec<OrderSpec>,
    /// Maximum documents to return.
    pub limit: Option<usize>,
}

impl LookupRequest {
    /// A plain lookup of `ids` in `collection`.
    pub fn new(collection: impl Into<String>, id_field: impl Into<String>, ids: Vec<DocId>) -> Self {
        Self {
            collection: collection.into(),
            id_field: id_field.into(),
            ids,
            filter: None,
            projection: None,
            sort: vec![],
            limit: None,
        }
    }

    /// Filter, sort, limit and project candidate documents.
    ///
    /// Candidates are expected to already be restricted to `ids`.
    /// Executors that load documents themselves can use this to honor the
    /// rest of the request.
    pub fn apply(&self, candidates: impl IntoIterator<Item = Document>) -> Vec<Document> {
        let mut rows: Vec<Document> = candidates
            .into_iter()
            .filter(|doc| match &self.filter {
                Some(filter) => FilterEvaluator::evaluate(filter, doc),
                None => true,
            })
            .collect();

        if !self.sort.is_empty() {
            sort_documents(&mut rows, &self.sort);
        }
        if let Some(limit) = self.limit {
            rows.truncate(limit);
        }
        if let Some(projection) = &self.projection {
            rows = rows.iter().map(|doc| projection.apply(doc)).collect();
        }
        rows
    }
}

/// The capability population uses to fetch referenced documents.
pub trait QueryExecutor: Send + Sync {
    /// Find the documents of `request.collection` whose identifier is one of
    /// `request.ids`, honoring the filter, projection, sort and limit.
    fn find_by_ids(&self, request: &LookupRequest) -> Result<Vec<Document>, LookupError>;
}

/// Stable sort by the given order specs.
///
/// Missing or incomparable values sort last in both directions.
pub fn sort_documents(rows: &mut [Document], order: &[OrderSpec]) {
    rows.sort_by(|a, b| {
        for spec in order {
            let ordering = match (a.get(&spec.field), b.get(&spec.field)) {
                (Some(x), Some(y)) => match FilterEvaluator::compare_values(x, y) {
                    Some(ord) => match spec.direction {
                        OrderDirection::Asc => ord,
                        OrderDirection::Desc => ord.reverse(),
                    },
                    None => Ordering::Equal,
                },
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}
