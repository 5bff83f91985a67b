//! Lookup IR: filters, ordering and projections.

use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::error::Error;
use crate::value::Value;

/// Filter expression evaluated against candidate documents.
///
/// Field names may be dotted paths into embedded documents.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    /// Field equals value.
    Eq { field: String, value: Value },
    /// Field not equals value.
    Ne { field: String, value: Value },
    /// Field less than value.
    Lt { field: String, value: Value },
    /// Field less than or equal to value.
    Le { field: String, value: Value },
    /// Field greater than value.
    Gt { field: String, value: Value },
    /// Field greater than or equal to value.
    Ge { field: String, value: Value },
    /// Field is in a set of values.
    In { field: String, values: Vec<Value> },
    /// Field is not in a set of values.
    NotIn { field: String, values: Vec<Value> },
    /// Field is null or absent.
    IsNull { field: String },
    /// Field is present and not null.
    IsNotNull { field: String },
    /// Field matches a LIKE pattern.
    Like { field: String, pattern: String },
    /// Field does not match a LIKE pattern.
    NotLike { field: String, pattern: String },
    /// All conditions must be true.
    And(Vec<FilterExpr>),
    /// At least one condition must be true.
    Or(Vec<FilterExpr>),
    /// Condition must be false.
    Not(Box<FilterExpr>),
}

impl FilterExpr {
    /// Create an equality filter.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        FilterExpr::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Create a not-equal filter.
    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        FilterExpr::Ne {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Create a less-than filter.
    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        FilterExpr::Lt {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Create a less-than-or-equal filter.
    pub fn le(field: impl Into<String>, value: impl Into<Value>) -> Self {
        FilterExpr::Le {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Create a greater-than filter.
    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        FilterExpr::Gt {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Create a greater-than-or-equal filter.
    pub fn ge(field: impl Into<String>, value: impl Into<Value>) -> Self {
        FilterExpr::Ge {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Create an IN filter.
    pub fn in_values(field: impl Into<String>, values: Vec<Value>) -> Self {
        FilterExpr::In {
            field: field.into(),
            values,
        }
    }

    /// Create a NOT IN filter.
    pub fn not_in_values(field: impl Into<String>, values: Vec<Value>) -> Self {
        FilterExpr::NotIn {
            field: field.into(),
            values,
        }
    }

    /// Create an IS NULL filter.
    pub fn is_null(field: impl Into<String>) -> Self {
        FilterExpr::IsNull {
            field: field.into(),
        }
    }

    /// Create an IS NOT NULL filter.
    pub fn is_not_null(field: impl Into<String>) -> Self {
        FilterExpr::IsNotNull {
            field: field.into(),
        }
    }

    /// Create a LIKE filter.
    pub fn like(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        FilterExpr::Like {
            field: field.into(),
            pattern: pattern.into(),
        }
    }

    /// Create an AND filter.
    pub fn and(exprs: Vec<FilterExpr>) -> Self {
        FilterExpr::And(exprs)
    }

    /// Create an OR filter.
    pub fn or(exprs: Vec<FilterExpr>) -> Self {
        FilterExpr::Or(exprs)
    }

    /// Negate a filter.
    pub fn not(expr: FilterExpr) -> Self {
        FilterExpr::Not(Box::new(expr))
    }
}

/// Order specification for sorting lookup results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSpec {
    /// Field to order by.
    pub field: String,
    /// Sort direction.
    pub direction: OrderDirection,
}

impl OrderSpec {
    /// Create an ascending order spec.
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: OrderDirection::Asc,
        }
    }

    /// Create a descending order spec.
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: OrderDirection::Desc,
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderDirection {
    /// Ascending order.
    Asc,
    /// Descending order.
    Desc,
}

/// Field selection applied to looked-up documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    /// Keep only the named fields.
    Include(Vec<String>),
    /// Drop the named fields.
    Exclude(Vec<String>),
}

impl Projection {
    /// Parse a space-delimited selection such as `"name email"` or `"-age"`.
    ///
    /// Inclusion and exclusion cannot be mixed.
    pub fn parse(spec: &str) -> Result<Self, Error> {
        let mut include = Vec::new();
        let mut exclude = Vec::new();

        for token in spec.split_whitespace() {
            match token.strip_prefix('-') {
                Some(field) if !field.is_empty() => exclude.push(field.to_string()),
                Some(_) => {
                    return Err(Error::InvalidProjection(format!(
                        "dangling '-' in '{}'",
                        spec
                    )))
                }
                None => include.push(token.trim_start_matches('+').to_string()),
            }
        }

        match (include.is_empty(), exclude.is_empty()) {
            (false, true) => Ok(Projection::Include(include)),
            (true, false) => Ok(Projection::Exclude(exclude)),
            (true, true) => Err(Error::InvalidProjection("no fields selected".into())),
            (false, false) => Err(Error::InvalidProjection(format!(
                "'{}' mixes inclusion and exclusion",
                spec
            ))),
        }
    }

    /// Keep only the given fields.
    pub fn include<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Projection::Include(fields.into_iter().map(Into::into).collect())
    }

    /// Drop the given fields.
    pub fn exclude<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Projection::Exclude(fields.into_iter().map(Into::into).collect())
    }

    /// Check whether a top-level field survives this projection.
    pub fn keeps(&self, field: &str) -> bool {
        match self {
            Projection::Include(fields) => fields.iter().any(|f| f == field),
            Projection::Exclude(fields) => !fields.iter().any(|f| f == field),
        }
    }

    /// A projection that also keeps `field`.
    pub fn with_required(&self, field: &str) -> Projection {
        match self {
            Projection::Include(fields) => {
                let mut fields = fields.clone();
                if !fields.iter().any(|f| f == field) {
                    fields.push(field.to_string());
                }
                Projection::Include(fields)
            }
            Projection::Exclude(fields) => {
                Projection::Exclude(fields.iter().filter(|f| *f != field).cloned().collect())
            }
        }
    }

    /// Apply the projection, preserving the document's field order.
    pub fn apply(&self, doc: &Document) -> Document {
        match self {
            Projection::Include(fields) => Document::from_fields(include_fields(doc, fields)),
            Projection::Exclude(fields) => Document::from_fields(exclude_fields(doc, fields)),
        }
    }
}

/// Paths below `name` with the `name.` prefix stripped.
fn sub_paths<'a>(paths: &'a [String], name: &str) -> Vec<String> {
    let prefix = format!("{}.", name);
    paths
        .iter()
        .filter_map(|p| p.strip_prefix(&prefix))
        .map(String::from)
        .collect()
}

fn include_fields(doc: &Document, paths: &[String]) -> Vec<(String, Value)> {
    let mut out = Vec::new();
    for (name, value) in doc.fields() {
        if paths.iter().any(|p| p == name) {
            out.push((name.clone(), value.clone()));
            continue;
        }
        let nested = sub_paths(paths, name);
        if nested.is_empty() {
            continue;
        }
        if let Value::Object(inner) = value {
            out.push((
                name.clone(),
                Value::Object(Document::from_fields(include_fields(inner, &nested))),
            ));
        }
    }
    out
}

fn exclude_fields(doc: &Document, paths: &[String]) -> Vec<(String, Value)> {
    let mut out = Vec::new();
    for (name, value) in doc.fields() {
        if paths.iter().any(|p| p == name) {
            continue;
        }
        let nested = sub_paths(paths, name);
        match value {
            Value::Object(inner) if !nested.is_empty() => out.push((
                name.clone(),
                Value::Object(Document::from_fields(exclude_fields(inner, &nested))),
            )),
            _ => out.push((name.clone(), value.clone())),
        }
    }
    out
}
