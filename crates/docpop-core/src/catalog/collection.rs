//! Collection definitions.

use docpop_proto::IdType;
use serde::{Deserialize, Serialize};

/// Default identifier field name.
pub const DEFAULT_ID_FIELD: &str = "_id";

/// A registered collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionDef {
    /// Collection name.
    pub name: String,
    /// Field holding each document's identifier.
    #[serde(default = "default_id_field")]
    pub id_field: String,
    /// Identifier type.
    #[serde(default = "default_id_type")]
    pub id_type: IdType,
}

fn default_id_field() -> String {
    DEFAULT_ID_FIELD.to_string()
}

fn default_id_type() -> IdType {
    IdType::Uuid
}

impl CollectionDef {
    /// Create a collection keyed by `_id` with the given identifier type.
    pub fn new(name: impl Into<String>, id_type: IdType) -> Self {
        Self {
            name: name.into(),
            id_field: default_id_field(),
            id_type,
        }
    }

    /// Use a different identifier field.
    pub fn with_id_field(mut self, field: impl Into<String>) -> Self {
        self.id_field = field.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let users = CollectionDef::new("User", IdType::Int);
        assert_eq!(users.id_field, "_id");
        assert_eq!(users.with_id_field("key").id_field, "key");
    }

    #[test]
    fn test_deserialize_defaults() {
        let def: CollectionDef = serde_json::from_str(r#"{"name":"Story"}"#).unwrap();
        assert_eq!(def.id_field, "_id");
        assert_eq!(def.id_type, IdType::Uuid);
    }
}
