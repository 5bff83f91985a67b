//! The validated reference registry.

use std::collections::HashMap;

use docpop_proto::FieldPath;
use tracing::debug;

use super::{CollectionDef, ReferenceDescriptor};
use crate::error::Error;

/// Collections and their reference fields.
///
/// Construct with [`Registry::builder`]; building checks that every
/// reference is consistent with the collections it connects.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    collections: HashMap<String, CollectionDef>,
    /// References keyed by source collection, then normalized path.
    references: HashMap<String, HashMap<String, ReferenceDescriptor>>,
}

impl Registry {
    /// Start building a registry.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Get a collection by name.
    pub fn collection(&self, name: &str) -> Option<&CollectionDef> {
        self.collections.get(name)
    }

    /// Look up the reference at `path` on `source_type`.
    ///
    /// Array index segments in `path` are ignored.
    pub fn describe(&self, source_type: &str, path: &str) -> Option<&ReferenceDescriptor> {
        let normalized = FieldPath::parse(path).ok()?.normalized().to_string();
        self.references.get(source_type)?.get(&normalized)
    }

    /// All references held by a collection.
    pub fn references_from(&self, source_type: &str) -> Vec<&ReferenceDescriptor> {
        let mut refs: Vec<&ReferenceDescriptor> = self
            .references
            .get(source_type)
            .map(|m| m.values().collect())
            .unwrap_or_default();
        refs.sort_by(|a, b| a.field_path.cmp(&b.field_path));
        refs
    }

    /// Names of all registered collections.
    pub fn collection_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.collections.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

/// Builder for [`Registry`].
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    collections: Vec<CollectionDef>,
    references: Vec<ReferenceDescriptor>,
}

impl RegistryBuilder {
    /// Register a collection.
    pub fn with_collection(mut self, collection: CollectionDef) -> Self {
        self.collections.push(collection);
        self
    }

    /// Register a reference field.
    pub fn with_reference(mut self, reference: ReferenceDescriptor) -> Self {
        self.references.push(reference);
        self
    }

    /// Validate and build the registry.
    pub fn build(self) -> Result<Registry, Error> {
        let mut collections = HashMap::new();
        for def in self.collections {
            FieldPath::parse(&def.id_field)?;
            if collections.contains_key(&def.name) {
                return Err(Error::Configuration(format!(
                    "collection '{}' registered twice",
                    def.name
                )));
            }
            collections.insert(def.name.clone(), def);
        }

        let mut references: HashMap<String, HashMap<String, ReferenceDescriptor>> =
            HashMap::new();
        for mut reference in self.references {
            if !collections.contains_key(&reference.source_type) {
                return Err(Error::UnknownCollection(reference.source_type));
            }

            let path = reference.parsed_path()?;
            reference.field_path = path.to_string();

            if let Some(target) = &reference.target_type {
                let target_def = collections
                    .get(target)
                    .ok_or_else(|| Error::UnknownCollection(target.clone()))?;
                if target_def.id_type != reference.id_type {
                    return Err(Error::IdTypeMismatch {
                        source_type: reference.source_type,
                        path: reference.field_path,
                        expected: target_def.id_type,
                        actual: reference.id_type,
                    });
                }
            }

            let by_path = references.entry(reference.source_type.clone()).or_default();
            if by_path.contains_key(&reference.field_path) {
                return Err(Error::Configuration(format!(
                    "reference '{}' on '{}' registered twice",
                    reference.field_path, reference.source_type
                )));
            }
            for existing in by_path.values() {
                let other = existing.parsed_path()?;
                if other.is_prefix_of(&path) || path.is_prefix_of(&other) {
                    return Err(Error::Configuration(format!(
                        "references '{}' and '{}' on '{}' overlap",
                        existing.field_path, reference.field_path, reference.source_type
                    )));
                }
            }
            by_path.insert(reference.field_path.clone(), reference);
        }

        debug!(
            collections = collections.len(),
            references = references.values().map(HashMap::len).sum::<usize>(),
            "built reference registry"
        );

        Ok(Registry {
            collections,
            references,
        })
    }
}
