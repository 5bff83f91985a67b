//! Populate requests.
//!
//! A request is a list of specs, one per reference path. Each spec may
//! narrow the looked-up documents with a filter, a projection and options,
//! and may carry nested specs that are applied to the populated documents.

use crate::error::Error;
use crate::query::{FilterExpr, OrderSpec, Projection};

/// Lookup and materialization options for one populated path.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PopulateOptions {
    /// Maximum documents per source document's sub-selection.
    pub limit: Option<usize>,
    /// Ordering used to choose which documents survive `limit`.
    pub sort: Vec<OrderSpec>,
    /// Return plain records instead of entities. `None` inherits.
    pub lean: Option<bool>,
    /// Keep unmatched identifiers of many-valued references as nulls.
    pub retain_nulls: bool,
}

/// Population of one reference path.
#[derive(Debug, Clone, PartialEq)]
pub struct PopulateSpec {
    /// Dotted path of the reference field. Whitespace separates several
    /// paths that share the rest of the spec.
    pub path: String,
    /// Target collection, overriding the registered one.
    pub model: Option<String>,
    /// Condition the referenced documents must match.
    pub filter: Option<FilterExpr>,
    /// Fields to keep on referenced documents.
    pub select: Option<Projection>,
    /// Lookup options.
    pub options: PopulateOptions,
    /// Specs applied to the populated documents.
    pub populate: Vec<PopulateSpec>,
}

impl PopulateSpec {
    /// Create a spec for a path.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            model: None,
            filter: None,
            select: None,
            options: PopulateOptions::default(),
            populate: vec![],
        }
    }

    /// Set the target collection.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Only populate documents matching a filter.
    pub fn with_match(mut self, filter: FilterExpr) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Select fields on referenced documents.
    pub fn select(mut self, projection: Projection) -> Self {
        self.select = Some(projection);
        self
    }

    /// Cap the documents populated per source document.
    pub fn limit(mut self, limit: usize) -> Self {
        self.options.limit = Some(limit);
        self
    }

    /// Add ordering for limit selection.
    pub fn sort(mut self, order: OrderSpec) -> Self {
        self.options.sort.push(order);
        self
    }

    /// Return plain records.
    pub fn lean(mut self) -> Self {
        self.options.lean = Some(true);
        self
    }

    /// Explicitly set lean mode.
    pub fn with_lean(mut self, lean: bool) -> Self {
        self.options.lean = Some(lean);
        self
    }

    /// Keep unmatched identifiers as nulls.
    pub fn retain_nulls(mut self) -> Self {
        self.options.retain_nulls = true;
        self
    }

    /// Add a nested spec.
    pub fn populate(mut self, nested: impl Into<PopulateRequest>) -> Self {
        self.populate.extend(nested.into().specs);
        self
    }

    /// Split a multi-path spec into one spec per path, recursively.
    pub fn expand(self) -> Result<Vec<PopulateSpec>, Error> {
        let paths: Vec<String> = self.path.split_whitespace().map(String::from).collect();
        if paths.is_empty() {
            return Err(Error::InvalidSpec("populate path is empty".into()));
        }

        let mut nested = Vec::with_capacity(self.populate.len());
        for spec in self.populate {
            nested.extend(spec.expand()?);
        }

        Ok(paths
            .into_iter()
            .map(|path| PopulateSpec {
                path,
                model: self.model.clone(),
                filter: self.filter.clone(),
                select: self.select.clone(),
                options: self.options.clone(),
                populate: nested.clone(),
            })
            .collect())
    }
}

/// One or more populate specs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PopulateRequest {
    specs: Vec<PopulateSpec>,
}

impl PopulateRequest {
    /// Create an empty request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a spec.
    pub fn with(mut self, spec: impl Into<PopulateRequest>) -> Self {
        self.specs.extend(spec.into().specs);
        self
    }

    /// Specs as supplied.
    pub fn specs(&self) -> &[PopulateSpec] {
        &self.specs
    }

    /// Check if the request names no paths.
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Expand multi-path specs into one spec per path.
    pub fn expand(self) -> Result<Vec<PopulateSpec>, Error> {
        let mut out = Vec::with_capacity(self.specs.len());
        for spec in self.specs {
            out.extend(spec.expand()?);
        }
        Ok(out)
    }
}

impl From<PopulateSpec> for PopulateRequest {
    fn from(spec: PopulateSpec) -> Self {
        Self { specs: vec![spec] }
    }
}

impl From<Vec<PopulateSpec>> for PopulateRequest {
    fn from(specs: Vec<PopulateSpec>) -> Self {
        Self { specs }
    }
}

impl From<&str> for PopulateRequest {
    fn from(paths: &str) -> Self {
        PopulateSpec::new(paths).into()
    }
}

impl From<String> for PopulateRequest {
    fn from(paths: String) -> Self {
        PopulateSpec::new(paths).into()
    }
}

impl From<&[&str]> for PopulateRequest {
    fn from(paths: &[&str]) -> Self {
        Self {
            specs: paths.iter().map(|p| PopulateSpec::new(*p)).collect(),
        }
    }
}

impl<const N: usize> From<[&str; N]> for PopulateRequest {
    fn from(paths: [&str; N]) -> Self {
        Self {
            specs: paths.iter().map(|p| PopulateSpec::new(*p)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_space_delimited_shorthand() {
        let specs = PopulateRequest::from("author  fans\tstories").expand().unwrap();
        let paths: Vec<&str> = specs.iter().map(|s| s.path.as_str()).collect();
        assert_eq!(paths, vec!["author", "fans", "stories"]);
    }

    #[test]
    fn test_expand_shares_options() {
        let specs = PopulateSpec::new("author editor")
            .select(Projection::include(["name"]))
            .limit(2)
            .lean()
            .expand()
            .unwrap();

        assert_eq!(specs.len(), 2);
        for spec in &specs {
            assert_eq!(spec.select, Some(Projection::include(["name"])));
            assert_eq!(spec.options.limit, Some(2));
            assert_eq!(spec.options.lean, Some(true));
        }
    }

    #[test]
    fn test_expand_nested() {
        let specs = PopulateSpec::new("friends")
            .populate("friends fans")
            .expand()
            .unwrap();
        assert_eq!(specs[0].populate.len(), 2);
        assert_eq!(specs[0].populate[1].path, "fans");
    }

    #[test]
    fn test_empty_path_rejected() {
        assert!(PopulateRequest::from("   ").expand().is_err());
        assert!(PopulateSpec::new("a").populate("").expand().is_err());
    }

    #[test]
    fn test_request_builders() {
        let request = PopulateRequest::new()
            .with("author")
            .with(PopulateSpec::new("fans").limit(1))
            .with(["stories", "editor"]);
        assert_eq!(request.specs().len(), 4);
        assert!(!request.is_empty());
    }
}
