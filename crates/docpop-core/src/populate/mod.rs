//! Reference population.
//!
//! Population replaces identifiers stored in reference fields with the
//! documents they point at. A call goes through these stages:
//!
//! 1. [`PathResolver`] binds every requested path, nested ones included, to
//!    its registered reference and target collection.
//! 2. [`PopulationExecutor`] collects identifiers for one level, batches them
//!    into lookups, and substitutes the results in place.
//! 3. [`Materializer`] wraps each looked-up row as an entity or a lean record.
//! 4. [`Coordinator`] repeats the level step for nested specs.

mod batch;
mod coordinator;
mod executor;
mod materializer;
mod populator;
mod resolver;

pub use batch::{Batch, BatchKey, BatchScope, BatchSet};
pub use coordinator::Coordinator;
pub use executor::PopulationExecutor;
pub use materializer::Materializer;
pub use populator::Populator;
pub use resolver::{PathResolver, ResolvedSpec};
