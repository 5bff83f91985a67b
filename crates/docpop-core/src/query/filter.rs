//! Filter evaluation for lookups.
//!
//! `FilterEvaluator` evaluates filter expressions from the request IR against
//! documents. Field names are dotted paths; when a path ends at an array,
//! equality and set membership match any element.

use std::cmp::Ordering;

use docpop_proto::{Document, FilterExpr, Value};

/// Evaluates filter expressions against documents.
pub struct FilterEvaluator;

impl FilterEvaluator {
    /// Evaluate a filter expression against a document.
    pub fn evaluate(filter: &FilterExpr, doc: &Document) -> bool {
        match filter {
            FilterExpr::Eq { field, value } => doc
                .get(field)
                .map(|fv| Self::matches_any(fv, |v| Self::values_equal(v, value)))
                .unwrap_or(false),
            FilterExpr::Ne { field, value } => doc
                .get(field)
                .map(|fv| !Self::matches_any(fv, |v| Self::values_equal(v, value)))
                .unwrap_or(true),
            FilterExpr::Lt { field, value } => Self::compare_field(doc, field, value, Ordering::is_lt),
            FilterExpr::Le { field, value } => Self::compare_field(doc, field, value, Ordering::is_le),
            FilterExpr::Gt { field, value } => Self::compare_field(doc, field, value, Ordering::is_gt),
            FilterExpr::Ge { field, value } => Self::compare_field(doc, field, value, Ordering::is_ge),
            FilterExpr::In { field, values } => match doc.get(field) {
                Some(fv) => Self::matches_any(fv, |v| {
                    values.iter().any(|candidate| Self::values_equal(v, candidate))
                }),
                None => false,
            },
            FilterExpr::NotIn { field, values } => match doc.get(field) {
                Some(fv) => !Self::matches_any(fv, |v| {
                    values.iter().any(|candidate| Self::values_equal(v, candidate))
                }),
                None => true, // NULL is not in any set
            },
            FilterExpr::IsNull { field } => matches!(doc.get(field), None | Some(Value::Null)),
            FilterExpr::IsNotNull { field } => !matches!(doc.get(field), None | Some(Value::Null)),
            FilterExpr::Like { field, pattern } => match doc.get(field) {
                Some(Value::String(s)) => Self::like_match(s, pattern),
                _ => false,
            },
            FilterExpr::NotLike { field, pattern } => match doc.get(field) {
                Some(Value::String(s)) => !Self::like_match(s, pattern),
                _ => true,
            },
            FilterExpr::And(filters) => filters.iter().all(|f| Self::evaluate(f, doc)),
            FilterExpr::Or(filters) => filters.iter().any(|f| Self::evaluate(f, doc)),
            FilterExpr::Not(inner) => !Self::evaluate(inner, doc),
        }
    }

    /// Apply a predicate to a value, or to each element of an array value.
    fn matches_any<F>(value: &Value, predicate: F) -> bool
    where
        F: Fn(&Value) -> bool,
    {
        match value {
            Value::Array(items) => items.iter().any(&predicate) || predicate(value),
            other => predicate(other),
        }
    }

    fn compare_field<F>(doc: &Document, field: &str, value: &Value, accept: F) -> bool
    where
        F: Fn(Ordering) -> bool,
    {
        match doc.get(field) {
            Some(fv) => Self::compare_values(fv, value).map(accept).unwrap_or(false),
            None => false, // Missing field doesn't match
        }
    }

    /// Check if two values are equal, coercing between numeric types.
    pub fn values_equal(a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            (Value::Uuid(a), Value::Uuid(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| Self::values_equal(x, y))
            }
            (Value::Object(_) | Value::Entity(_), Value::Object(_) | Value::Entity(_)) => {
                a.as_document() == b.as_document()
            }
            _ => Self::compare_numbers(a, b)
                .map(Ordering::is_eq)
                .unwrap_or(false),
        }
    }

    /// Compare two values, returning their ordering if comparable.
    pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
        match (a, b) {
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            (Value::Uuid(a), Value::Uuid(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            _ => Self::compare_numbers(a, b),
        }
    }

    fn compare_numbers(a: &Value, b: &Value) -> Option<Ordering> {
        match (a, b) {
            (Value::Int32(a), Value::Int32(b)) => Some(a.cmp(b)),
            (Value::Int64(a), Value::Int64(b)) => Some(a.cmp(b)),
            (Value::Int32(a), Value::Int64(b)) => Some((*a as i64).cmp(b)),
            (Value::Int64(a), Value::Int32(b)) => Some(a.cmp(&(*b as i64))),
            (Value::Float64(_), _) | (_, Value::Float64(_)) => {
                a.as_f64()?.partial_cmp(&b.as_f64()?)
            }
            _ => None, // Incompatible types
        }
    }

    /// Match a string against a SQL LIKE pattern.
    ///
    /// Supports:
    /// - `%` matches zero or more characters
    /// - `_` matches exactly one character
    /// - `\\%` matches literal `%`
    /// - `\\_` matches literal `_`
    pub fn like_match(value: &str, pattern: &str) -> bool {
        let value: Vec<char> = value.chars().collect();
        let pattern: Vec<char> = pattern.chars().collect();
        Self::like_match_from(&value, &pattern)
    }

    fn like_match_from(value: &[char], pattern: &[char]) -> bool {
        match pattern.split_first() {
            None => value.is_empty(),
            Some(('%', rest)) => {
                if rest.is_empty() {
                    return true;
                }
                (0..=value.len()).any(|skip| Self::like_match_from(&value[skip..], rest))
            }
            Some(('_', rest)) => !value.is_empty() && Self::like_match_from(&value[1..], rest),
            Some(('\\', rest)) => match (rest.split_first(), value.split_first()) {
                (Some((p, rest)), Some((c, tail))) if p == c => Self::like_match_from(tail, rest),
                _ => false,
            },
            Some((p, rest)) => match value.split_first() {
                Some((c, tail)) if c == p => Self::like_match_from(tail, rest),
                _ => false,
            },
        }
    }
}
