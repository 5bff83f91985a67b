//! Turning looked-up rows into substitutable values.

use std::sync::Arc;

use docpop_proto::{DocId, Document, Entity, EntityBackend, Value};

/// Wraps rows as entities bound to a backend, or as plain records.
#[derive(Clone)]
pub struct Materializer {
    backend: Arc<dyn EntityBackend>,
}

impl Materializer {
    /// Create a materializer whose entities save and remove through `backend`.
    pub fn new(backend: Arc<dyn EntityBackend>) -> Self {
        Self { backend }
    }

    /// Materialize one row of `collection`.
    pub fn materialize(&self, collection: &str, id: &DocId, row: Document, lean: bool) -> Value {
        if lean {
            Value::Object(row)
        } else {
            Value::Entity(Box::new(Entity::new(
                collection,
                id.clone(),
                row,
                Arc::clone(&self.backend),
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docpop_proto::Error as ProtoError;

    struct NoopBackend;

    impl EntityBackend for NoopBackend {
        fn save_document(&self, _: &str, _: &DocId, _: &Document) -> Result<(), ProtoError> {
            Ok(())
        }

        fn remove_document(&self, _: &str, _: &DocId) -> Result<bool, ProtoError> {
            Ok(false)
        }
    }

    #[test]
    fn test_lean_and_materialized() {
        let materializer = Materializer::new(Arc::new(NoopBackend));
        let row = Document::new().with("_id", Value::Int64(1)).with("name", "Al");

        let lean = materializer.materialize("Person", &DocId::Int(1), row.clone(), true);
        assert!(matches!(lean, Value::Object(_)));
        assert!(lean.as_entity().is_none());

        let full = materializer.materialize("Person", &DocId::Int(1), row, false);
        let entity = full.as_entity().unwrap();
        assert_eq!(entity.collection(), "Person");
        assert_eq!(entity.id(), &DocId::Int(1));
        assert_eq!(entity.get("name"), Some(&Value::from("Al")));
    }
}
