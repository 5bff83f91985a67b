//! Documents, populated-field bookkeeping and the populatable capability.

use std::collections::BTreeMap;

use crate::error::Error;
use crate::path::{is_index, normalize_str, FieldPath, PathSet};
use crate::value::{DocId, Value};

/// Original raw values of populated paths, keyed by normalized path.
///
/// For a path that runs through an array of subdocuments the recorded value
/// is an array holding the raw value of each slot, in document order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PopulatedFields {
    entries: BTreeMap<String, Value>,
}

impl PopulatedFields {
    /// Get the original value recorded for a path.
    pub fn get(&self, path: &str) -> Option<&Value> {
        self.entries.get(&normalize_str(path))
    }

    /// Check if a path has been populated.
    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(&normalize_str(path))
    }

    /// Record the original value of a populated path.
    pub fn record(&mut self, path: &str, original: Value) {
        self.entries.insert(normalize_str(path), original);
    }

    /// Forget a path and return its original value.
    pub fn remove(&mut self, path: &str) -> Option<Value> {
        self.entries.remove(&normalize_str(path))
    }

    /// Forget a path and every populated path below it.
    pub fn clear_under(&mut self, path: &str) {
        let path = normalize_str(path);
        let nested = format!("{}.", path);
        self.entries
            .retain(|key, _| key != &path && !key.starts_with(&nested));
    }

    /// Iterate over populated paths.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_str())
    }

    /// Number of populated paths.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing has been populated.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// An ordered set of named fields.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    fields: Vec<(String, Value)>,
    populated: PopulatedFields,
}

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a document from field pairs.
    pub fn from_fields(fields: Vec<(String, Value)>) -> Self {
        Self {
            fields,
            populated: PopulatedFields::default(),
        }
    }

    /// Builder form of [`Document::insert`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Fields in insertion order.
    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    /// Consume the document, returning its fields.
    pub fn into_fields(self) -> Vec<(String, Value)> {
        self.fields
    }

    pub(crate) fn fields_mut(&mut self) -> &mut [(String, Value)] {
        &mut self.fields
    }

    /// Split into fields and populated bookkeeping so both can be borrowed
    /// mutably at once.
    pub fn parts_mut(&mut self) -> (&mut [(String, Value)], &mut PopulatedFields) {
        (&mut self.fields, &mut self.populated)
    }

    /// Number of top-level fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if the document has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Read the identifier stored in `id_field`.
    pub fn id(&self, id_field: &str) -> Option<DocId> {
        self.get(id_field).and_then(DocId::from_value)
    }

    /// Get a top-level field.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Get a value by dotted path.
    ///
    /// Numeric segments index into arrays; other segments descend into
    /// embedded, lean or materialized documents.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.field(first)?;

        for segment in segments {
            current = match current {
                Value::Array(items) if is_index(segment) => {
                    items.get(segment.parse::<usize>().ok()?)?
                }
                other => other.as_document()?.field(segment)?,
            };
        }

        Some(current)
    }

    /// Check whether a path holds a value.
    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Set a top-level field, replacing any existing value in place.
    ///
    /// Direct assignment clears populated bookkeeping for the field.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        self.populated.clear_under(&name);
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Set a value by dotted path, creating intermediate objects.
    ///
    /// Direct assignment clears populated bookkeeping at and below the path;
    /// assigning a document to a single reference field is how a reference is
    /// set manually without a lookup.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> Result<(), Error> {
        let parsed = FieldPath::parse(path)?;
        self.populated.clear_under(path);
        set_in(&mut self.fields, parsed.segments(), value.into(), path)
    }

    /// Remove a value by dotted path.
    ///
    /// Bookkeeping is cleared for the normalized path and below, so removing
    /// `comments.0.author` forgets the originals of `comments.author` for
    /// every element. Sibling fields such as `comments.0.text` leave it alone.
    pub fn remove(&mut self, path: &str) -> Option<Value> {
        let (parent, last) = match path.rsplit_once('.') {
            Some((parent, last)) => (Some(parent), last),
            None => (None, path),
        };

        let fields = match parent {
            None => &mut self.fields,
            Some(parent) => &mut self.get_mut(parent)?.as_document_mut()?.fields,
        };
        let pos = fields.iter().position(|(n, _)| n == last)?;
        let (_, value) = fields.remove(pos);
        self.populated.clear_under(path);
        Some(value)
    }

    fn get_mut(&mut self, path: &str) -> Option<&mut Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self
            .fields
            .iter_mut()
            .find(|(n, _)| n == first)
            .map(|(_, v)| v)?;

        for segment in segments {
            current = if is_index(segment) && current.is_array() {
                match current {
                    Value::Array(items) => items.get_mut(segment.parse::<usize>().ok()?)?,
                    _ => return None,
                }
            } else {
                current
                    .as_document_mut()?
                    .fields
                    .iter_mut()
                    .find(|(n, _)| n == segment)
                    .map(|(_, v)| v)?
            };
        }

        Some(current)
    }

    /// Populated-field bookkeeping.
    pub fn populated_fields(&self) -> &PopulatedFields {
        &self.populated
    }

    /// The raw identifier(s) a populated path held before substitution.
    pub fn populated(&self, path: &str) -> Option<&Value> {
        self.populated.get(path)
    }

    /// Check if a path currently holds document content.
    ///
    /// True both for lookups and for documents assigned by hand.
    pub fn is_populated(&self, path: &str) -> bool {
        self.get(path).map(Value::is_populated).unwrap_or(false)
    }

    /// Restore the raw identifier(s) of a populated path.
    ///
    /// Returns `false` if the path was not populated by a lookup.
    pub fn depopulate(&mut self, path: &str) -> bool {
        let original = match self.populated.remove(path) {
            Some(original) => original,
            None => return false,
        };

        let Ok(parsed) = FieldPath::parse(path) else {
            return false;
        };
        let set = PathSet::new([&parsed]);
        let mut slots = set.collect(&mut self.fields);
        let mut slots = slots.swap_remove(0);

        match slots.len() {
            0 => {}
            1 => *slots[0] = original,
            _ => {
                if let Value::Array(originals) = original {
                    for (slot, raw) in slots.iter_mut().zip(originals) {
                        **slot = raw;
                    }
                }
            }
        }
        true
    }

    /// Restore every populated path.
    pub fn depopulate_all(&mut self) {
        let paths: Vec<String> = self.populated.paths().map(String::from).collect();
        for path in paths {
            self.depopulate(&path);
        }
    }

    /// A copy with every populated path restored to its raw identifiers.
    pub fn depopulated(&self) -> Document {
        let mut doc = self.clone();
        doc.depopulate_all();
        doc
    }

    /// Convert to a JSON object for display and debugging.
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .fields
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect();
        serde_json::Value::Object(map)
    }
}

fn set_in(
    fields: &mut Vec<(String, Value)>,
    segments: &[String],
    value: Value,
    path: &str,
) -> Result<(), Error> {
    let (head, rest) = match segments.split_first() {
        Some(split) => split,
        None => return Err(Error::InvalidPath("empty path".into())),
    };

    let pos = match fields.iter().position(|(n, _)| n == head) {
        Some(pos) => pos,
        None => {
            let placeholder = if rest.is_empty() {
                Value::Null
            } else {
                Value::Object(Document::new())
            };
            fields.push((head.clone(), placeholder));
            fields.len() - 1
        }
    };

    let slot = &mut fields[pos].1;
    if rest.is_empty() {
        *slot = value;
        return Ok(());
    }
    set_in_value(slot, rest, value, path)
}

fn set_in_value(
    slot: &mut Value,
    segments: &[String],
    value: Value,
    path: &str,
) -> Result<(), Error> {
    match slot {
        Value::Array(items) if is_index(&segments[0]) => {
            let index: usize = segments[0]
                .parse()
                .map_err(|_| Error::InvalidPath(path.to_string()))?;
            let item = items.get_mut(index).ok_or_else(|| {
                Error::InvalidPath(format!("index {} out of range in '{}'", index, path))
            })?;
            if segments.len() == 1 {
                *item = value;
                Ok(())
            } else {
                set_in_value(item, &segments[1..], value, path)
            }
        }
        Value::Null => {
            *slot = Value::Object(Document::new());
            set_in_value(slot, segments, value, path)
        }
        other => match other.as_document_mut() {
            Some(doc) => set_in(&mut doc.fields, segments, value, path),
            None => Err(Error::InvalidPath(format!(
                "'{}' runs through a non-document value",
                path
            ))),
        },
    }
}

/// Capability shared by everything population can mutate.
///
/// Plain documents and materialized entities both implement it, so callers
/// can populate either without the engine inspecting types at runtime.
pub trait Populatable {
    /// The underlying document.
    fn document(&self) -> &Document;

    /// Mutable access to the underlying document.
    fn document_mut(&mut self) -> &mut Document;

    /// Check if a path holds a value.
    fn has_field(&self, path: &str) -> bool {
        self.document().contains(path)
    }

    /// Get a value by dotted path.
    fn get_field(&self, path: &str) -> Option<&Value> {
        self.document().get(path)
    }

    /// Assign a value by dotted path.
    fn set_field(&mut self, path: &str, value: Value) -> Result<(), Error> {
        self.document_mut().set(path, value)
    }
}

impl Populatable for Document {
    fn document(&self) -> &Document {
        self
    }

    fn document_mut(&mut self) -> &mut Document {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn post() -> Document {
        Document::new()
            .with("_id", Value::Int64(1))
            .with("title", "Hello")
            .with(
                "comments",
                Value::Array(vec![
                    Value::Object(Document::new().with("text", "a").with("author", Value::Int64(10))),
                    Value::Object(Document::new().with("text", "b").with("author", Value::Int64(11))),
                ]),
            )
    }

    #[test]
    fn test_get_paths() {
        let doc = post();
        assert_eq!(doc.get("title"), Some(&Value::from("Hello")));
        assert_eq!(doc.get("comments.1.author"), Some(&Value::Int64(11)));
        assert_eq!(doc.get("comments.5.author"), None);
        assert_eq!(doc.get("missing"), None);
        assert_eq!(doc.id("_id"), Some(DocId::Int(1)));
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut doc = Document::new().with("a", 1).with("b", 2);
        doc.insert("a", 3);
        let names: Vec<&str> = doc.fields().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(doc.get("a"), Some(&Value::Int32(3)));
    }

    #[test]
    fn test_set_creates_intermediates() {
        let mut doc = Document::new();
        doc.set("meta.owner.name", "Zed").unwrap();
        assert_eq!(doc.get("meta.owner.name"), Some(&Value::from("Zed")));

        let mut doc = post();
        doc.set("comments.0.text", "edited").unwrap();
        assert_eq!(doc.get("comments.0.text"), Some(&Value::from("edited")));

        assert!(doc.set("title.inner", 1).is_err());
        assert!(doc.set("comments.9.text", "x").is_err());
    }

    #[test]
    fn test_remove() {
        let mut doc = post();
        assert_eq!(doc.remove("title"), Some(Value::from("Hello")));
        assert!(!doc.contains("title"));
        assert_eq!(doc.remove("comments.0.text"), Some(Value::from("a")));
        assert!(!doc.contains("comments.0.text"));
        assert_eq!(doc.remove("nope"), None);
    }

    #[test]
    fn test_remove_through_arrays_and_entries() {
        let mut doc = post();
        doc.parts_mut()
            .1
            .record("comments.author", Value::Array(vec![Value::Int64(10), Value::Int64(11)]));

        // A sibling field of the populated path keeps the bookkeeping.
        assert_eq!(doc.remove("comments.1.text"), Some(Value::from("b")));
        assert!(doc.populated("comments.author").is_some());
        assert_eq!(doc.get("comments.1.author"), Some(&Value::Int64(11)));

        // Removing one slot of the populated path forgets the whole entry.
        assert_eq!(doc.remove("comments.0.author"), Some(Value::Int64(10)));
        assert_eq!(doc.populated("comments.author"), None);

        assert_eq!(doc.remove("comments.7.text"), None);
        assert_eq!(doc.remove("title.inner"), None);
    }

    #[test]
    fn test_set_clears_populated_entry() {
        let mut doc = Document::new().with("author", Value::Object(Document::new()));
        doc.parts_mut().1.record("author", Value::Int64(5));
        assert_eq!(doc.populated("author"), Some(&Value::Int64(5)));

        doc.set("author", Value::Int64(6)).unwrap();
        assert_eq!(doc.populated("author"), None);
        assert!(!doc.is_populated("author"));
    }

    #[test]
    fn test_depopulate_single_and_nested() {
        let mut doc = post();
        doc.insert("author", Value::Object(Document::new().with("name", "Ann")));
        doc.parts_mut().1.record("author", Value::Int64(7));

        doc.set("comments.0.author", Value::Object(Document::new())).unwrap();
        doc.set("comments.1.author", Value::Object(Document::new())).unwrap();
        doc.parts_mut()
            .1
            .record("comments.author", Value::Array(vec![Value::Int64(10), Value::Int64(11)]));

        let restored = doc.depopulated();
        assert_eq!(restored.get("author"), Some(&Value::Int64(7)));
        assert_eq!(restored.get("comments.0.author"), Some(&Value::Int64(10)));
        assert_eq!(restored.get("comments.1.author"), Some(&Value::Int64(11)));
        assert!(restored.populated_fields().is_empty());

        // The original is untouched.
        assert!(doc.is_populated("author"));
        assert!(!doc.clone().depopulate("title"));
    }

    #[test]
    fn test_populatable_capability() {
        let mut doc = Document::new();
        assert!(!doc.has_field("x"));
        doc.set_field("x", Value::Int32(1)).unwrap();
        assert_eq!(doc.get_field("x"), Some(&Value::Int32(1)));
    }
}
