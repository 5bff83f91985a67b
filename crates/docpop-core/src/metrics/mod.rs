//! Population counters.
//!
//! # Usage
//!
//! ```ignore
//! use docpop_core::metrics::new_shared_metrics;
//!
//! let metrics = new_shared_metrics();
//! let populator = Populator::new(&registry, store).with_metrics(metrics.clone());
//! populator.populate("Story", &mut stories, "author fans")?;
//!
//! assert_eq!(metrics.lookup_count(), 1);
//! println!("{}", metrics.to_prometheus());
//! ```

mod registry;

pub use registry::{new_shared_metrics, MetricsSnapshot, PopulateMetrics, SharedPopulateMetrics};
