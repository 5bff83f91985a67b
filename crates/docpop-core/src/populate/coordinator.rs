//! Recursive population over nested specs.

use docpop_proto::Document;
use tracing::trace;

use super::executor::PopulationExecutor;
use super::resolver::ResolvedSpec;
use crate::error::Error;

/// Documents waiting for one set of specs.
struct Level<'a, 's> {
    docs: Vec<&'a mut Document>,
    specs: &'s [ResolvedSpec],
    depth: usize,
}

/// Drives levels from an explicit work stack.
///
/// After a level is substituted, the documents held at each spec's path,
/// whether freshly looked up or populated earlier, become the sources of
/// that spec's nested specs.
pub struct Coordinator<'e, 'p> {
    executor: &'e PopulationExecutor<'p>,
}

impl<'e, 'p> Coordinator<'e, 'p> {
    /// Create a coordinator over a level executor.
    pub fn new(executor: &'e PopulationExecutor<'p>) -> Self {
        Self { executor }
    }

    /// Populate `specs` and all nested specs on `docs`.
    pub fn run<'a>(&self, docs: Vec<&'a mut Document>, specs: &[ResolvedSpec]) -> Result<(), Error> {
        let mut stack = vec![Level {
            docs,
            specs,
            depth: 1,
        }];

        while let Some(level) = stack.pop() {
            if level.docs.is_empty() || level.specs.is_empty() {
                continue;
            }
            trace!(
                depth = level.depth,
                documents = level.docs.len(),
                "processing level"
            );

            let children = self.executor.run(level.docs, level.specs)?;
            for (spec, docs) in level.specs.iter().zip(children) {
                if !spec.children.is_empty() && !docs.is_empty() {
                    stack.push(Level {
                        docs,
                        specs: &spec.children,
                        depth: level.depth + 1,
                    });
                }
            }
        }
        Ok(())
    }
}
