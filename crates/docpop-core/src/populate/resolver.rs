//! Path resolution: turning a populate request into resolved specs.

use std::collections::HashMap;

use docpop_proto::{FieldPath, FilterExpr, OrderSpec, PopulateRequest, PopulateSpec, Projection};

use crate::catalog::{ReferenceDescriptor, Registry};
use crate::config::PopulateConfig;
use crate::error::Error;

/// A populate spec bound to its reference descriptor and target collection.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSpec {
    /// Normalized path of the reference field.
    pub path: FieldPath,
    /// Registered metadata for the path.
    pub descriptor: ReferenceDescriptor,
    /// Collection the identifiers are looked up in.
    pub target: String,
    /// Identifier field of the target collection.
    pub id_field: String,
    /// Condition on referenced documents.
    pub filter: Option<FilterExpr>,
    /// Fields to keep on referenced documents.
    pub select: Option<Projection>,
    /// Ordering used to pick rows under `limit`.
    pub sort: Vec<OrderSpec>,
    /// Maximum referenced documents per source document.
    pub limit: Option<usize>,
    /// Whether substituted documents are plain records.
    pub lean: bool,
    /// Keep unmatched identifiers of array references as nulls.
    pub retain_nulls: bool,
    /// Specs applied to the substituted documents.
    pub children: Vec<ResolvedSpec>,
    /// Nesting depth, starting at 1.
    pub depth: usize,
}

impl ResolvedSpec {
    /// Check if the reference holds an array of identifiers.
    pub fn is_many(&self) -> bool {
        self.descriptor.is_many()
    }
}

/// Resolves populate requests against the reference registry.
pub struct PathResolver<'a> {
    registry: &'a Registry,
    config: &'a PopulateConfig,
}

impl<'a> PathResolver<'a> {
    /// Create a resolver.
    pub fn new(registry: &'a Registry, config: &'a PopulateConfig) -> Self {
        Self { registry, config }
    }

    /// Resolve a request for documents of `source_type`.
    ///
    /// Every path, including nested ones, is resolved before anything is
    /// looked up, so resolution errors never leave documents half populated.
    pub fn resolve(
        &self,
        source_type: &str,
        request: impl Into<PopulateRequest>,
    ) -> Result<Vec<ResolvedSpec>, Error> {
        if self.registry.collection(source_type).is_none() {
            return Err(Error::UnknownCollection(source_type.to_string()));
        }
        let specs = request.into().expand()?;
        self.resolve_level(source_type, specs, 1, self.config.lean)
    }

    fn resolve_level(
        &self,
        source_type: &str,
        specs: Vec<PopulateSpec>,
        depth: usize,
        inherited_lean: bool,
    ) -> Result<Vec<ResolvedSpec>, Error> {
        if specs.is_empty() {
            return Ok(vec![]);
        }
        if depth > self.config.max_depth {
            return Err(Error::DepthExceeded {
                depth,
                max: self.config.max_depth,
            });
        }

        let specs = dedupe(specs)?;
        let mut resolved = Vec::with_capacity(specs.len());
        for (path, spec) in specs {
            resolved.push(self.resolve_spec(source_type, path, spec, depth, inherited_lean)?);
        }
        Ok(resolved)
    }

    fn resolve_spec(
        &self,
        source_type: &str,
        path: FieldPath,
        spec: PopulateSpec,
        depth: usize,
        inherited_lean: bool,
    ) -> Result<ResolvedSpec, Error> {
        let path_str = path.to_string();
        let descriptor = self
            .registry
            .describe(source_type, &path_str)
            .ok_or_else(|| Error::UnknownReference {
                source_type: source_type.to_string(),
                path: path_str.clone(),
            })?;

        let target = spec
            .model
            .clone()
            .or_else(|| descriptor.target_type.clone())
            .ok_or_else(|| Error::AmbiguousTarget {
                source_type: source_type.to_string(),
                path: path_str.clone(),
            })?;
        let target_def = self
            .registry
            .collection(&target)
            .ok_or_else(|| Error::UnknownCollection(target.clone()))?;
        if target_def.id_type != descriptor.id_type {
            return Err(Error::IdTypeMismatch {
                source_type: source_type.to_string(),
                path: path_str,
                expected: target_def.id_type,
                actual: descriptor.id_type,
            });
        }

        let lean = spec.options.lean.unwrap_or(inherited_lean);
        let children = self.resolve_level(&target, spec.populate, depth + 1, lean)?;

        Ok(ResolvedSpec {
            path,
            descriptor: descriptor.clone(),
            id_field: target_def.id_field.clone(),
            target,
            filter: spec.filter,
            select: spec.select,
            sort: spec.options.sort,
            limit: spec.options.limit,
            lean,
            retain_nulls: spec.options.retain_nulls,
            children,
            depth,
        })
    }
}

/// Drop repeated paths. A later spec replaces an earlier one for the same
/// normalized path but keeps the earlier position.
fn dedupe(specs: Vec<PopulateSpec>) -> Result<Vec<(FieldPath, PopulateSpec)>, Error> {
    let mut out: Vec<(FieldPath, PopulateSpec)> = Vec::with_capacity(specs.len());
    let mut positions: HashMap<FieldPath, usize> = HashMap::new();

    for spec in specs {
        let path = FieldPath::parse(&spec.path)?.normalized();
        match positions.get(&path) {
            Some(&pos) => out[pos].1 = spec,
            None => {
                positions.insert(path.clone(), out.len());
                out.push((path, spec));
            }
        }
    }
    Ok(out)
}
