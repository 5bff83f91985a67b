//! Reference descriptors.

use docpop_proto::{FieldPath, IdType};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// How many identifiers a reference field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cardinality {
    /// A single identifier.
    Single,
    /// An array of identifiers.
    Many,
}

/// Metadata for one reference field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceDescriptor {
    /// Collection holding the reference.
    pub source_type: String,
    /// Normalized dotted path of the reference field.
    pub field_path: String,
    /// Referenced collection, if fixed.
    pub target_type: Option<String>,
    /// Reference cardinality.
    pub cardinality: Cardinality,
    /// Identifier type stored in the field.
    pub id_type: IdType,
}

impl ReferenceDescriptor {
    /// A single-valued reference to `target`.
    pub fn single(
        source_type: impl Into<String>,
        field_path: impl Into<String>,
        target_type: impl Into<String>,
    ) -> Self {
        Self {
            source_type: source_type.into(),
            field_path: field_path.into(),
            target_type: Some(target_type.into()),
            cardinality: Cardinality::Single,
            id_type: IdType::Uuid,
        }
    }

    /// A many-valued reference to `target`.
    pub fn many(
        source_type: impl Into<String>,
        field_path: impl Into<String>,
        target_type: impl Into<String>,
    ) -> Self {
        Self {
            cardinality: Cardinality::Many,
            ..Self::single(source_type, field_path, target_type)
        }
    }

    /// A reference whose target is chosen per populate call.
    pub fn untargeted(
        source_type: impl Into<String>,
        field_path: impl Into<String>,
        cardinality: Cardinality,
    ) -> Self {
        Self {
            source_type: source_type.into(),
            field_path: field_path.into(),
            target_type: None,
            cardinality,
            id_type: IdType::Uuid,
        }
    }

    /// Set the identifier type.
    pub fn with_id_type(mut self, id_type: IdType) -> Self {
        self.id_type = id_type;
        self
    }

    /// Check if the field holds an array of identifiers.
    pub fn is_many(&self) -> bool {
        self.cardinality == Cardinality::Many
    }

    /// Parse the field path, dropping array index segments.
    pub(crate) fn parsed_path(&self) -> Result<FieldPath, Error> {
        Ok(FieldPath::parse(&self.field_path)?.normalized())
    }
}
