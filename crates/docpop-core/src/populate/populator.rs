//! The population entry point.

use std::sync::Arc;

use docpop_proto::{Document, EntityBackend, Populatable, PopulateRequest};
use tracing::{debug, instrument};

use super::coordinator::Coordinator;
use super::executor::PopulationExecutor;
use super::materializer::Materializer;
use super::resolver::{PathResolver, ResolvedSpec};
use crate::catalog::Registry;
use crate::config::PopulateConfig;
use crate::error::Error;
use crate::metrics::SharedPopulateMetrics;
use crate::query::QueryExecutor;

/// Populates reference fields of documents.
///
/// A populator borrows the reference registry and shares the query executor
/// and entity backend it was built with. It keeps no state between calls
/// beyond optional metrics counters.
pub struct Populator<'r> {
    registry: &'r Registry,
    executor: Arc<dyn QueryExecutor>,
    materializer: Materializer,
    config: PopulateConfig,
    metrics: Option<SharedPopulateMetrics>,
}

impl<'r> Populator<'r> {
    /// Create a populator over a store that both answers lookups and backs
    /// materialized entities.
    pub fn new<S>(registry: &'r Registry, store: Arc<S>) -> Self
    where
        S: QueryExecutor + EntityBackend + 'static,
    {
        let executor: Arc<dyn QueryExecutor> = store.clone();
        let backend: Arc<dyn EntityBackend> = store;
        Self::with_parts(registry, executor, backend)
    }

    /// Create a populator from separate executor and backend.
    pub fn with_parts(
        registry: &'r Registry,
        executor: Arc<dyn QueryExecutor>,
        backend: Arc<dyn EntityBackend>,
    ) -> Self {
        Self {
            registry,
            executor,
            materializer: Materializer::new(backend),
            config: PopulateConfig::default(),
            metrics: None,
        }
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: PopulateConfig) -> Self {
        self.config = config;
        self
    }

    /// Record counters into a shared metrics registry.
    pub fn with_metrics(mut self, metrics: SharedPopulateMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// The active configuration.
    pub fn config(&self) -> &PopulateConfig {
        &self.config
    }

    /// Resolve a request without looking anything up.
    pub fn plan(
        &self,
        source_type: &str,
        request: impl Into<PopulateRequest>,
    ) -> Result<Vec<ResolvedSpec>, Error> {
        PathResolver::new(self.registry, &self.config).resolve(source_type, request)
    }

    /// Populate documents of `source_type` in place.
    ///
    /// Every path is resolved before the first lookup. Lookups for one
    /// nesting level are batched; levels run one after another. If a lookup
    /// fails, the failing level is left unsubstituted and earlier levels keep
    /// their substitutions.
    #[instrument(skip(self, docs, request), fields(documents = docs.len()))]
    pub fn populate<T: Populatable>(
        &self,
        source_type: &str,
        docs: &mut [T],
        request: impl Into<PopulateRequest>,
    ) -> Result<(), Error> {
        let specs = self.plan(source_type, request)?;
        if let Some(metrics) = &self.metrics {
            metrics.record_call();
        }
        if docs.is_empty() || specs.is_empty() {
            return Ok(());
        }
        debug!(paths = specs.len(), "resolved populate request");

        let documents: Vec<&mut Document> = docs.iter_mut().map(|d| d.document_mut()).collect();
        let executor = PopulationExecutor::new(
            self.executor.as_ref(),
            &self.materializer,
            self.metrics.as_deref(),
            self.config.lookup_workers(),
        );
        Coordinator::new(&executor).run(documents, &specs)
    }

    /// Populate a single document in place.
    pub fn populate_one<T: Populatable>(
        &self,
        source_type: &str,
        doc: &mut T,
        request: impl Into<PopulateRequest>,
    ) -> Result<(), Error> {
        self.populate(source_type, std::slice::from_mut(doc), request)
    }
}
