//! Population of one nesting level.
//!
//! A level runs in three phases: every slot of every document is collected
//! and its identifiers are assigned to batches, every batch is looked up, and
//! only then are slots substituted. A failed lookup therefore leaves the
//! level untouched.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;

use docpop_proto::path::documents_mut;
use docpop_proto::{DocId, Document, PathSet, PopulatedFields, Value};
use tracing::{debug, trace, warn};

use super::batch::{Batch, BatchKey, BatchSet};
use super::materializer::Materializer;
use super::resolver::ResolvedSpec;
use crate::error::Error;
use crate::metrics::PopulateMetrics;
use crate::query::QueryExecutor;

/// Rows found by one batch, keyed by identifier.
type Found = HashMap<DocId, Document>;

/// The mutable state of one source document during a level.
struct SourceSlots<'a> {
    populated: &'a mut PopulatedFields,
    /// Slots per spec, in spec order.
    slots: Vec<Vec<&'a mut Value>>,
    /// Batch per spec, if the spec looks anything up for this document.
    batches: Vec<Option<usize>>,
}

#[derive(Debug, Default)]
struct SubstitutionStats {
    materialized: u64,
    missing: u64,
}

/// Runs single levels of population.
pub struct PopulationExecutor<'p> {
    executor: &'p dyn QueryExecutor,
    materializer: &'p Materializer,
    metrics: Option<&'p PopulateMetrics>,
    workers: usize,
}

impl<'p> PopulationExecutor<'p> {
    /// Create a level executor running at most `workers` lookups at once.
    pub fn new(
        executor: &'p dyn QueryExecutor,
        materializer: &'p Materializer,
        metrics: Option<&'p PopulateMetrics>,
        workers: usize,
    ) -> Self {
        Self {
            executor,
            materializer,
            metrics,
            workers: workers.max(1),
        }
    }

    /// Populate `specs` on `docs`.
    ///
    /// Returns, per spec, the documents now held at its path; these are the
    /// sources of the spec's nested specs. Only specs with nested specs get
    /// a non-empty list.
    pub fn run<'a>(
        &self,
        docs: Vec<&'a mut Document>,
        specs: &[ResolvedSpec],
    ) -> Result<Vec<Vec<&'a mut Document>>, Error> {
        let set = PathSet::new(specs.iter().map(|s| &s.path));
        let doc_count = docs.len();

        let mut sources: Vec<SourceSlots<'a>> = docs
            .into_iter()
            .map(|doc| {
                let (fields, populated) = doc.parts_mut();
                SourceSlots {
                    populated,
                    slots: set.collect(fields),
                    batches: vec![None; specs.len()],
                }
            })
            .collect();

        let batches = plan_batches(&mut sources, specs);
        debug!(
            documents = doc_count,
            specs = specs.len(),
            batches = batches.len(),
            "populating level"
        );

        let found = self.lookup_all(&batches)?;

        let mut stats = SubstitutionStats::default();
        for source in sources.iter_mut() {
            for (s, spec) in specs.iter().enumerate() {
                if let Some(batch) = source.batches[s] {
                    self.substitute_spec(
                        spec,
                        &mut source.slots[s],
                        source.populated,
                        &found[batch],
                        &mut stats,
                    );
                }
            }
        }

        if let Some(metrics) = self.metrics {
            metrics.record_level();
            metrics.record_materialized(stats.materialized);
            metrics.record_missing(stats.missing);
        }
        trace!(
            materialized = stats.materialized,
            missing = stats.missing,
            "level substituted"
        );

        let mut children: Vec<Vec<&'a mut Document>> = specs.iter().map(|_| Vec::new()).collect();
        for source in sources {
            for (s, slots) in source.slots.into_iter().enumerate() {
                if specs[s].children.is_empty() {
                    continue;
                }
                for slot in slots {
                    documents_mut(slot, &mut children[s]);
                }
            }
        }
        Ok(children)
    }

    fn lookup_all(&self, batches: &BatchSet) -> Result<Vec<Found>, Error> {
        let workers = self.workers.min(batches.len());
        if workers <= 1 {
            return batches.batches().iter().map(|batch| self.lookup(batch)).collect();
        }

        // Workers pull batch indexes from a shared cursor and stop at the
        // first failure.
        let next = AtomicUsize::new(0);
        let failed = AtomicBool::new(false);
        let work = || {
            let mut done = Vec::new();
            while !failed.load(Ordering::Relaxed) {
                let index = next.fetch_add(1, Ordering::Relaxed);
                let Some(batch) = batches.batches().get(index) else {
                    break;
                };
                let result = self.lookup(batch);
                if result.is_err() {
                    failed.store(true, Ordering::Relaxed);
                }
                done.push((index, result));
            }
            done
        };

        let mut results: Vec<(usize, Result<Found, Error>)> = std::thread::scope(|scope| {
            let work = &work;
            let handles: Vec<_> = (1..workers)
                .filter_map(|n| {
                    std::thread::Builder::new()
                        .name(format!("docpop-lookup-{}", n))
                        .spawn_scoped(scope, move || work())
                        .map_err(|e| warn!(error = %e, "could not start lookup thread"))
                        .ok()
                })
                .collect();
            // The calling thread works too, so lookups finish even if no
            // thread could be started.
            let mut results = work();
            for handle in handles {
                match handle.join() {
                    Ok(done) => results.extend(done),
                    Err(panic) => std::panic::resume_unwind(panic),
                }
            }
            results
        });
        results.sort_by_key(|(index, _)| *index);
        results.into_iter().map(|(_, result)| result).collect()
    }

    fn lookup(&self, batch: &Batch) -> Result<Found, Error> {
        let request = batch.to_request();
        if request.limit == Some(0) {
            return Ok(Found::new());
        }

        let started = Instant::now();
        let rows = match self.executor.find_by_ids(&request) {
            Ok(rows) => rows,
            Err(source) => {
                warn!(collection = %request.collection, error = %source, "lookup failed");
                if let Some(metrics) = self.metrics {
                    metrics.record_lookup_failure();
                }
                return Err(Error::Lookup {
                    collection: request.collection,
                    source,
                });
            }
        };

        if let Some(metrics) = self.metrics {
            metrics.record_lookup(
                &request.collection,
                request.ids.len() as u64,
                started.elapsed().as_micros() as u64,
            );
        }
        trace!(
            collection = %request.collection,
            ids = request.ids.len(),
            rows = rows.len(),
            "lookup complete"
        );
        Ok(batch.index_rows(rows))
    }

    fn substitute_spec(
        &self,
        spec: &ResolvedSpec,
        slots: &mut [&mut Value],
        populated: &mut PopulatedFields,
        found: &Found,
        stats: &mut SubstitutionStats,
    ) {
        let path = spec.path.to_string();
        let previous = populated.get(&path).cloned();
        let total = slots.len();
        let mut originals = Vec::with_capacity(total);
        let mut changed = false;

        for (k, slot) in slots.iter_mut().enumerate() {
            if slot.is_populated() || slot_ids(slot).is_empty() {
                let original = previous_original(previous.as_ref(), k, total)
                    .unwrap_or_else(|| (**slot).clone());
                originals.push(original);
                continue;
            }
            let raw = (**slot).clone();
            if self.substitute(&mut **slot, spec, found, stats) {
                changed = true;
            }
            originals.push(raw);
        }

        if changed {
            let original = match originals.len() {
                1 => originals.swap_remove(0),
                _ => Value::Array(originals),
            };
            populated.record(&path, original);
        }
    }

    /// Replace identifiers in one slot. Returns whether the slot changed.
    fn substitute(
        &self,
        slot: &mut Value,
        spec: &ResolvedSpec,
        found: &Found,
        stats: &mut SubstitutionStats,
    ) -> bool {
        match slot {
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items.iter() {
                    let id = item.as_doc_id();
                    match id.as_ref().and_then(|id| found.get(id).map(|row| (id, row))) {
                        Some((id, row)) => {
                            out.push(self.materializer.materialize(
                                &spec.target,
                                id,
                                row.clone(),
                                spec.lean,
                            ));
                            stats.materialized += 1;
                        }
                        None => {
                            if id.is_some() {
                                stats.missing += 1;
                            }
                            if spec.retain_nulls {
                                out.push(Value::Null);
                            }
                        }
                    }
                }
                *items = out;
                true
            }
            other => {
                let Some(id) = other.as_doc_id() else {
                    return false;
                };
                match found.get(&id) {
                    Some(row) => {
                        *other = self
                            .materializer
                            .materialize(&spec.target, &id, row.clone(), spec.lean);
                        stats.materialized += 1;
                        true
                    }
                    None => {
                        stats.missing += 1;
                        false
                    }
                }
            }
        }
    }
}

/// Assign every pending identifier to a batch.
fn plan_batches(sources: &mut [SourceSlots<'_>], specs: &[ResolvedSpec]) -> BatchSet {
    let mut batches = BatchSet::new();
    for (d, source) in sources.iter_mut().enumerate() {
        for (s, spec) in specs.iter().enumerate() {
            let pending: Vec<DocId> = source.slots[s]
                .iter()
                .filter(|slot| !slot.is_populated())
                .flat_map(|slot| slot_ids(slot))
                .collect();
            if pending.is_empty() {
                continue;
            }
            let Some(key) = BatchKey::for_spec(spec, s, d) else {
                continue;
            };
            let batch = batches.batch_for(key);
            for id in pending {
                batches.add(batch, id);
            }
            source.batches[s] = Some(batch);
        }
    }
    batches
}

/// Identifiers held by a raw slot, in order, duplicates included.
fn slot_ids(slot: &Value) -> Vec<DocId> {
    match slot {
        Value::Array(items) => items.iter().filter_map(DocId::from_value).collect(),
        other => DocId::from_value(other).into_iter().collect(),
    }
}

/// The raw value an earlier call recorded for slot `k` of `total`.
fn previous_original(previous: Option<&Value>, k: usize, total: usize) -> Option<Value> {
    match (previous?, total) {
        (value, 1) => Some(value.clone()),
        (Value::Array(items), _) => items.get(k).cloned(),
        _ => None,
    }
}
