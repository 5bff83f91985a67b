//! Runtime value types for document fields.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::entity::Entity;

/// A field value inside a document.
///
/// Unlike a flat wire format, values nest: arrays hold arbitrary values and
/// objects hold embedded documents. Population replaces identifier values with
/// `Object` (lean) or `Entity` (materialized) values.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// 32-bit signed integer.
    Int32(i32),
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit floating point.
    Float64(f64),
    /// UTF-8 string.
    String(String),
    /// 16-byte object identifier.
    Uuid([u8; 16]),
    /// Timestamp as microseconds since Unix epoch.
    Timestamp(i64),
    /// Ordered list of values.
    Array(Vec<Value>),
    /// Embedded document or lean populated record.
    Object(Document),
    /// Materialized document bound to its collection.
    Entity(Box<Entity>),
}

impl Value {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if this value is an array.
    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    /// Check if this value holds document content rather than identifiers.
    ///
    /// Arrays count as populated as soon as one element is a document.
    pub fn is_populated(&self) -> bool {
        match self {
            Value::Object(_) | Value::Entity(_) => true,
            Value::Array(items) => items
                .iter()
                .any(|v| matches!(v, Value::Object(_) | Value::Entity(_))),
            _ => false,
        }
    }

    /// Try to get as bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get as i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(i) => Some(*i),
            Value::Int32(i) => Some(*i as i64),
            _ => None,
        }
    }

    /// Try to get as f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float64(f) => Some(*f),
            Value::Int32(i) => Some(*i as f64),
            Value::Int64(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to get as string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as UUID.
    pub fn as_uuid(&self) -> Option<&[u8; 16]> {
        match self {
            Value::Uuid(u) => Some(u),
            _ => None,
        }
    }

    /// Try to get as array slice.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Get the document behind an `Object` or `Entity`.
    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Object(doc) => Some(doc),
            Value::Entity(entity) => Some(entity.document()),
            _ => None,
        }
    }

    /// Mutable access to the document behind an `Object` or `Entity`.
    pub fn as_document_mut(&mut self) -> Option<&mut Document> {
        match self {
            Value::Object(doc) => Some(doc),
            Value::Entity(entity) => Some(entity.document_mut()),
            _ => None,
        }
    }

    /// Try to get as a materialized entity.
    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            Value::Entity(entity) => Some(entity),
            _ => None,
        }
    }

    /// Interpret this value as a document identifier.
    pub fn as_doc_id(&self) -> Option<DocId> {
        DocId::from_value(self)
    }

    /// Convert to a JSON value for display and debugging.
    ///
    /// Entities render as their documents; UUIDs render as hex strings.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int32(i) => serde_json::json!(i),
            Value::Int64(i) => serde_json::json!(i),
            Value::Float64(f) => serde_json::json!(f),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Uuid(u) => serde_json::Value::String(hex::encode(u)),
            Value::Timestamp(t) => serde_json::json!(t),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Object(doc) => doc.to_json(),
            Value::Entity(entity) => entity.document().to_json(),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<[u8; 16]> for Value {
    fn from(v: [u8; 16]) -> Self {
        Value::Uuid(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl From<Document> for Value {
    fn from(v: Document) -> Self {
        Value::Object(v)
    }
}

impl From<Entity> for Value {
    fn from(v: Entity) -> Self {
        Value::Entity(Box::new(v))
    }
}

impl From<DocId> for Value {
    fn from(v: DocId) -> Self {
        v.into_value()
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

/// The primitive type a collection uses to identify its documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdType {
    /// 16-byte object identifier.
    Uuid,
    /// String key.
    String,
    /// Integer key.
    Int,
}

impl fmt::Display for IdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdType::Uuid => write!(f, "uuid"),
            IdType::String => write!(f, "string"),
            IdType::Int => write!(f, "int"),
        }
    }
}

/// A hashable document identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DocId {
    /// 16-byte object identifier.
    Uuid([u8; 16]),
    /// String key.
    String(String),
    /// Integer key.
    Int(i64),
}

impl DocId {
    /// Extract an identifier from a raw field value.
    ///
    /// Both integer widths map to `Int`. Anything else is not an identifier.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Uuid(u) => Some(DocId::Uuid(*u)),
            Value::String(s) => Some(DocId::String(s.clone())),
            Value::Int32(i) => Some(DocId::Int(*i as i64)),
            Value::Int64(i) => Some(DocId::Int(*i)),
            _ => None,
        }
    }

    /// Convert back to a field value.
    pub fn into_value(self) -> Value {
        match self {
            DocId::Uuid(u) => Value::Uuid(u),
            DocId::String(s) => Value::String(s),
            DocId::Int(i) => Value::Int64(i),
        }
    }

    /// Convert to a field value without consuming the identifier.
    pub fn to_value(&self) -> Value {
        self.clone().into_value()
    }

    /// The identifier's primitive type.
    pub fn id_type(&self) -> IdType {
        match self {
            DocId::Uuid(_) => IdType::Uuid,
            DocId::String(_) => IdType::String,
            DocId::Int(_) => IdType::Int,
        }
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocId::Uuid(u) => write!(f, "{}", hex::encode(u)),
            DocId::String(s) => write!(f, "{}", s),
            DocId::Int(i) => write!(f, "{}", i),
        }
    }
}

impl From<[u8; 16]> for DocId {
    fn from(v: [u8; 16]) -> Self {
        DocId::Uuid(v)
    }
}

impl From<&str> for DocId {
    fn from(v: &str) -> Self {
        DocId::String(v.to_string())
    }
}

impl From<String> for DocId {
    fn from(v: String) -> Self {
        DocId::String(v)
    }
}

impl From<i64> for DocId {
    fn from(v: i64) -> Self {
        DocId::Int(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_id_from_value() {
        assert_eq!(
            DocId::from_value(&Value::Uuid([7; 16])),
            Some(DocId::Uuid([7; 16]))
        );
        assert_eq!(DocId::from_value(&Value::Int32(3)), Some(DocId::Int(3)));
        assert_eq!(DocId::from_value(&Value::Int64(3)), Some(DocId::Int(3)));
        assert_eq!(
            DocId::from_value(&Value::from("abc")),
            Some(DocId::String("abc".into()))
        );
        assert_eq!(DocId::from_value(&Value::Null), None);
        assert_eq!(DocId::from_value(&Value::Bool(true)), None);
    }

    #[test]
    fn test_int_widths_share_identity() {
        let a = DocId::from_value(&Value::Int32(42)).unwrap();
        let b = DocId::from_value(&Value::Int64(42)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.id_type(), IdType::Int);
    }

    #[test]
    fn test_is_populated() {
        assert!(!Value::Uuid([1; 16]).is_populated());
        assert!(!Value::Array(vec![Value::Uuid([1; 16])]).is_populated());
        assert!(Value::Object(Document::new()).is_populated());
        assert!(Value::Array(vec![Value::Uuid([1; 16]), Value::Object(Document::new())])
            .is_populated());
    }

    #[test]
    fn test_display_uuid_as_hex() {
        let id = DocId::Uuid([0xab; 16]);
        assert_eq!(id.to_string(), "ab".repeat(16));
    }

    #[test]
    fn test_to_json() {
        let doc = Document::new().with("name", "Alice").with("age", 30);
        let json = Value::Object(doc).to_json();
        assert_eq!(json, serde_json::json!({"name": "Alice", "age": 30}));
    }
}
