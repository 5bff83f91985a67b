//! Dotted field paths and the slot walker used by population.
//!
//! A path like `comments.author` names the `author` field of every element of
//! the `comments` array. Numeric segments (`comments.0.author`) address a
//! single element when reading, but are dropped when a path is normalized for
//! reference lookup, so a reference resolves regardless of array nesting.

use std::collections::BTreeMap;
use std::fmt;

use crate::document::Document;
use crate::error::Error;
use crate::value::Value;

/// A parsed, dot-separated field path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    /// Parse a dotted path. Empty paths and empty segments are rejected.
    pub fn parse(path: &str) -> Result<Self, Error> {
        let path = path.trim();
        if path.is_empty() {
            return Err(Error::InvalidPath("empty path".into()));
        }
        if path.chars().any(char::is_whitespace) {
            return Err(Error::InvalidPath(format!(
                "path '{}' contains whitespace",
                path
            )));
        }

        let segments: Vec<String> = path.split('.').map(String::from).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(Error::InvalidPath(format!("path '{}' has an empty segment", path)));
        }

        Ok(Self { segments })
    }

    /// Path segments in order.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Always false for a parsed path; present for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Drop array index segments.
    pub fn normalized(&self) -> FieldPath {
        FieldPath {
            segments: self
                .segments
                .iter()
                .filter(|s| !is_index(s))
                .cloned()
                .collect(),
        }
    }

    /// Check whether this path is a strict prefix of `other`.
    pub fn is_prefix_of(&self, other: &FieldPath) -> bool {
        self.segments.len() < other.segments.len()
            && other.segments[..self.segments.len()] == self.segments[..]
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

/// Check if a path segment is an array index.
pub(crate) fn is_index(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

/// Normalize a path string, dropping index segments.
pub(crate) fn normalize_str(path: &str) -> String {
    path.split('.')
        .filter(|s| !is_index(s))
        .collect::<Vec<_>>()
        .join(".")
}

#[derive(Debug, Default)]
struct Node {
    children: BTreeMap<String, Node>,
    terminal: Option<usize>,
}

/// A trie of normalized paths for walking a document once and collecting the
/// mutable slots of every path at the same time.
///
/// Slots of different paths never alias, which is what lets population mutate
/// several reference fields of one document in a single pass.
#[derive(Debug, Default)]
pub struct PathSet {
    root: Node,
    len: usize,
}

impl PathSet {
    /// Build a path set. Slot lists are returned in the order of `paths`.
    pub fn new<'a>(paths: impl IntoIterator<Item = &'a FieldPath>) -> Self {
        let mut set = PathSet::default();
        for path in paths {
            let mut node = &mut set.root;
            for segment in path.normalized().segments() {
                node = node.children.entry(segment.clone()).or_default();
            }
            node.terminal = Some(set.len);
            set.len += 1;
        }
        set
    }

    /// Number of paths in the set.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Collect the non-null slots of every path in the given fields.
    ///
    /// Arrays met before the end of a path are walked element by element;
    /// at the end of a path the whole value (array or not) is one slot.
    /// Embedded and lean documents met before the end of a path are entered;
    /// materialized entities are not. Registered reference paths never nest,
    /// so an intermediate document is never a populated reference.
    pub fn collect<'d>(&self, fields: &'d mut [(String, Value)]) -> Vec<Vec<&'d mut Value>> {
        let mut out: Vec<Vec<&'d mut Value>> = (0..self.len).map(|_| Vec::new()).collect();
        collect_fields(fields, &self.root, &mut out);
        out
    }
}

fn collect_fields<'d>(
    fields: &'d mut [(String, Value)],
    node: &Node,
    out: &mut [Vec<&'d mut Value>],
) {
    for (name, value) in fields.iter_mut() {
        if let Some(child) = node.children.get(name.as_str()) {
            descend(value, child, out);
        }
    }
}

fn descend<'d>(value: &'d mut Value, node: &Node, out: &mut [Vec<&'d mut Value>]) {
    if let Some(index) = node.terminal {
        if !value.is_null() {
            out[index].push(value);
        }
        return;
    }

    match value {
        Value::Array(items) => {
            for item in items.iter_mut() {
                descend(item, node, out);
            }
        }
        Value::Object(doc) => collect_fields(doc.fields_mut(), node, out),
        _ => {}
    }
}

/// Collect mutable references to every document held by a value.
///
/// `Object` and `Entity` values yield their document; arrays are searched
/// element by element.
pub fn documents_mut<'d>(value: &'d mut Value, out: &mut Vec<&'d mut Document>) {
    match value {
        Value::Object(doc) => out.push(doc),
        Value::Entity(entity) => out.push(entity.document_mut()),
        Value::Array(items) => {
            for item in items.iter_mut() {
                documents_mut(item, out);
            }
        }
        _ => {}
    }
}
