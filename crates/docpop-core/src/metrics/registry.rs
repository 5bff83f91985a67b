//! Population metrics registry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

/// Counters shared by every populate call that is handed the same registry.
pub struct PopulateMetrics {
    populate_calls: AtomicU64,
    levels: AtomicU64,

    // Lookup metrics
    lookup_count: AtomicU64,
    lookup_failures: AtomicU64,
    lookup_time_us: AtomicU64,
    ids_requested: AtomicU64,
    lookups_by_collection: RwLock<HashMap<String, AtomicU64>>,

    // Substitution metrics
    documents_materialized: AtomicU64,
    references_missing: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub populate_calls: u64,
    pub levels: u64,
    pub lookup_count: u64,
    pub lookup_failures: u64,
    pub lookup_time_us: u64,
    pub ids_requested: u64,
    pub documents_materialized: u64,
    pub references_missing: u64,
    pub lookups_by_collection: HashMap<String, u64>,
}

impl PopulateMetrics {
    /// Create a new metrics registry.
    pub fn new() -> Self {
        Self {
            populate_calls: AtomicU64::new(0),
            levels: AtomicU64::new(0),
            lookup_count: AtomicU64::new(0),
            lookup_failures: AtomicU64::new(0),
            lookup_time_us: AtomicU64::new(0),
            ids_requested: AtomicU64::new(0),
            lookups_by_collection: RwLock::new(HashMap::new()),
            documents_materialized: AtomicU64::new(0),
            references_missing: AtomicU64::new(0),
        }
    }

    /// Record a populate call.
    pub fn record_call(&self) {
        self.populate_calls.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one processed nesting level.
    pub fn record_level(&self) {
        self.levels.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a lookup against a collection.
    pub fn record_lookup(&self, collection: &str, ids: u64, duration_us: u64) {
        self.lookup_count.fetch_add(1, Ordering::Relaxed);
        self.ids_requested.fetch_add(ids, Ordering::Relaxed);
        self.lookup_time_us.fetch_add(duration_us, Ordering::Relaxed);

        {
            let map = self.lookups_by_collection.read();
            if let Some(counter) = map.get(collection) {
                counter.fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
        self.lookups_by_collection
            .write()
            .entry(collection.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed lookup.
    pub fn record_lookup_failure(&self) {
        self.lookup_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record substituted documents.
    pub fn record_materialized(&self, count: u64) {
        self.documents_materialized.fetch_add(count, Ordering::Relaxed);
    }

    /// Record identifiers with no matching document.
    pub fn record_missing(&self, count: u64) {
        self.references_missing.fetch_add(count, Ordering::Relaxed);
    }

    // Getters

    /// Get total populate calls.
    pub fn populate_calls(&self) -> u64 {
        self.populate_calls.load(Ordering::Relaxed)
    }

    /// Get total processed levels.
    pub fn levels(&self) -> u64 {
        self.levels.load(Ordering::Relaxed)
    }

    /// Get total lookups issued.
    pub fn lookup_count(&self) -> u64 {
        self.lookup_count.load(Ordering::Relaxed)
    }

    /// Get failed lookups.
    pub fn lookup_failures(&self) -> u64 {
        self.lookup_failures.load(Ordering::Relaxed)
    }

    /// Get total identifiers requested across lookups.
    pub fn ids_requested(&self) -> u64 {
        self.ids_requested.load(Ordering::Relaxed)
    }

    /// Get average lookup duration in microseconds.
    pub fn avg_lookup_time_us(&self) -> u64 {
        let count = self.lookup_count();
        if count == 0 {
            return 0;
        }
        self.lookup_time_us.load(Ordering::Relaxed) / count
    }

    /// Get substituted document count.
    pub fn documents_materialized(&self) -> u64 {
        self.documents_materialized.load(Ordering::Relaxed)
    }

    /// Get unmatched identifier count.
    pub fn references_missing(&self) -> u64 {
        self.references_missing.load(Ordering::Relaxed)
    }

    /// Get lookup counts by collection.
    pub fn lookups_by_collection(&self) -> HashMap<String, u64> {
        self.lookups_by_collection
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.load(Ordering::Relaxed)))
            .collect()
    }

    /// Copy every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            populate_calls: self.populate_calls(),
            levels: self.levels(),
            lookup_count: self.lookup_count(),
            lookup_failures: self.lookup_failures(),
            lookup_time_us: self.lookup_time_us.load(Ordering::Relaxed),
            ids_requested: self.ids_requested(),
            documents_materialized: self.documents_materialized(),
            references_missing: self.references_missing(),
            lookups_by_collection: self.lookups_by_collection(),
        }
    }

    /// Export to Prometheus text format.
    pub fn to_prometheus(&self) -> String {
        let mut out = String::new();

        out.push_str("# HELP docpop_populate_calls_total Total populate calls\n");
        out.push_str("# TYPE docpop_populate_calls_total counter\n");
        out.push_str(&format!("docpop_populate_calls_total {}\n\n", self.populate_calls()));

        out.push_str("# HELP docpop_levels_total Nesting levels processed\n");
        out.push_str("# TYPE docpop_levels_total counter\n");
        out.push_str(&format!("docpop_levels_total {}\n\n", self.levels()));

        out.push_str("# HELP docpop_lookups_total Lookups issued to the query executor\n");
        out.push_str("# TYPE docpop_lookups_total counter\n");
        out.push_str(&format!("docpop_lookups_total {}\n", self.lookup_count()));
        let mut by_collection: Vec<(String, u64)> =
            self.lookups_by_collection().into_iter().collect();
        by_collection.sort();
        for (collection, count) in by_collection {
            out.push_str(&format!(
                "docpop_lookups_total{{collection=\"{}\"}} {}\n",
                collection, count
            ));
        }
        out.push('\n');

        out.push_str("# HELP docpop_lookup_failures_total Failed lookups\n");
        out.push_str("# TYPE docpop_lookup_failures_total counter\n");
        out.push_str(&format!("docpop_lookup_failures_total {}\n\n", self.lookup_failures()));

        out.push_str("# HELP docpop_lookup_duration_us_avg Average lookup duration in microseconds\n");
        out.push_str("# TYPE docpop_lookup_duration_us_avg gauge\n");
        out.push_str(&format!(
            "docpop_lookup_duration_us_avg {}\n\n",
            self.avg_lookup_time_us()
        ));

        out.push_str("# HELP docpop_ids_requested_total Identifiers requested\n");
        out.push_str("# TYPE docpop_ids_requested_total counter\n");
        out.push_str(&format!("docpop_ids_requested_total {}\n\n", self.ids_requested()));

        out.push_str("# HELP docpop_documents_materialized_total Documents substituted\n");
        out.push_str("# TYPE docpop_documents_materialized_total counter\n");
        out.push_str(&format!(
            "docpop_documents_materialized_total {}\n\n",
            self.documents_materialized()
        ));

        out.push_str("# HELP docpop_references_missing_total Identifiers without a matching document\n");
        out.push_str("# TYPE docpop_references_missing_total counter\n");
        out.push_str(&format!(
            "docpop_references_missing_total {}\n",
            self.references_missing()
        ));

        out
    }

    /// Reset all metrics (for testing).
    pub fn reset(&self) {
        self.populate_calls.store(0, Ordering::Relaxed);
        self.levels.store(0, Ordering::Relaxed);
        self.lookup_count.store(0, Ordering::Relaxed);
        self.lookup_failures.store(0, Ordering::Relaxed);
        self.lookup_time_us.store(0, Ordering::Relaxed);
        self.ids_requested.store(0, Ordering::Relaxed);
        self.lookups_by_collection.write().clear();
        self.documents_materialized.store(0, Ordering::Relaxed);
        self.references_missing.store(0, Ordering::Relaxed);
    }
}

impl Default for PopulateMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared metrics handle.
pub type SharedPopulateMetrics = Arc<PopulateMetrics>;

/// Create a new shared metrics registry.
pub fn new_shared_metrics() -> SharedPopulateMetrics {
    Arc::new(PopulateMetrics::new())
}
