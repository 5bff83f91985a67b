//! Integration tests for reference population against the sled store.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use docpop_core::proto::{
    DocId, Document, Entity, EntityBackend, FilterExpr, IdType, OrderSpec, PopulateRequest,
    PopulateSpec, Projection, Value,
};
use docpop_core::{
    new_shared_metrics, Cardinality, CollectionDef, DocumentStore, Error, LookupError,
    LookupRequest, PopulateConfig, Populator, QueryExecutor, ReferenceDescriptor, Registry,
    SharedPopulateMetrics, StorageConfig,
};
use pretty_assertions::assert_eq;

struct TestContext {
    store: Arc<DocumentStore>,
    registry: Registry,
    metrics: SharedPopulateMetrics,
    _storage_dir: tempfile::TempDir,
}

impl TestContext {
    fn new() -> Self {
        let storage_dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(StorageConfig::new(storage_dir.path())).unwrap();
        let ctx = Self {
            store: Arc::new(store),
            registry: blog_registry(),
            metrics: new_shared_metrics(),
            _storage_dir: storage_dir,
        };
        ctx.seed();
        ctx
    }

    fn populator(&self) -> Populator<'_> {
        Populator::new(&self.registry, self.store.clone()).with_metrics(self.metrics.clone())
    }

    fn seed(&self) {
        let people = [
            person(1, "Al", 30).with("friends", ids(&[2, 3])),
            person(2, "Bo", 20)
                .with("friends", ids(&[]))
                .with("employer", "acme"),
            person(3, "Cy", 40).with("friends", ids(&[4])),
            person(4, "Di", 50).with("friends", ids(&[1])),
        ];
        for doc in &people {
            self.store.insert_document("Person", "_id", doc).unwrap();
        }
        self.store
            .insert_document(
                "Company",
                "_id",
                &Document::new().with("_id", "acme").with("name", "Acme"),
            )
            .unwrap();
    }

    fn people(&self, id_list: &[i64]) -> Vec<Document> {
        id_list
            .iter()
            .map(|id| self.store.get("Person", &DocId::Int(*id)).unwrap().unwrap())
            .collect()
    }
}

fn blog_registry() -> Registry {
    Registry::builder()
        .with_collection(CollectionDef::new("Person", IdType::Int))
        .with_collection(CollectionDef::new("Story", IdType::Int))
        .with_collection(CollectionDef::new("Company", IdType::String))
        .with_reference(ReferenceDescriptor::single("Story", "author", "Person").with_id_type(IdType::Int))
        .with_reference(ReferenceDescriptor::many("Story", "fans", "Person").with_id_type(IdType::Int))
        .with_reference(
            ReferenceDescriptor::single("Story", "comments.author", "Person")
                .with_id_type(IdType::Int),
        )
        .with_reference(
            ReferenceDescriptor::untargeted("Story", "subject", Cardinality::Single)
                .with_id_type(IdType::Int),
        )
        .with_reference(ReferenceDescriptor::many("Person", "friends", "Person").with_id_type(IdType::Int))
        .with_reference(
            ReferenceDescriptor::single("Person", "employer", "Company").with_id_type(IdType::String),
        )
        .build()
        .unwrap()
}

fn person(id: i64, name: &str, age: i64) -> Document {
    Document::new()
        .with("_id", id)
        .with("name", name)
        .with("age", age)
}

fn ids(list: &[i64]) -> Value {
    Value::Array(list.iter().map(|id| Value::Int64(*id)).collect())
}

fn stories() -> Vec<Document> {
    vec![
        Document::new()
            .with("_id", 10i64)
            .with("title", "First")
            .with("author", 1i64)
            .with("fans", ids(&[2, 3, 2]))
            .with(
                "comments",
                Value::Array(vec![
                    Value::Object(Document::new().with("text", "nice").with("author", 3i64)),
                    Value::Object(Document::new().with("text", "meh").with("author", 9i64)),
                ]),
            ),
        Document::new()
            .with("_id", 11i64)
            .with("title", "Second")
            .with("author", 9i64)
            .with("fans", ids(&[1, 9, 4])),
    ]
}

fn names(doc: &Document, path: &str) -> Vec<Value> {
    doc.get(path)
        .and_then(Value::as_array)
        .unwrap()
        .iter()
        .map(|v| match v.as_document() {
            Some(d) => d.get("name").cloned().unwrap_or(Value::Null),
            None => v.clone(),
        })
        .collect()
}

fn name(doc: &Document, path: &str) -> Option<Value> {
    doc.get(&format!("{}.name", path)).cloned()
}

/// Executor wrapper that counts lookups and can fail one collection.
struct InstrumentedExecutor {
    store: Arc<DocumentStore>,
    fail_collection: Option<&'static str>,
    calls: AtomicUsize,
}

impl InstrumentedExecutor {
    fn new(store: Arc<DocumentStore>, fail_collection: Option<&'static str>) -> Self {
        Self {
            store,
            fail_collection,
            calls: AtomicUsize::new(0),
        }
    }
}

impl QueryExecutor for InstrumentedExecutor {
    fn find_by_ids(&self, request: &LookupRequest) -> Result<Vec<Document>, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_collection == Some(request.collection.as_str()) {
            return Err(LookupError::msg("connection reset"));
        }
        self.store.find_by_ids(request)
    }
}

#[test]
fn test_populate_single_and_many_references() {
    let ctx = TestContext::new();
    let mut stories = stories();

    ctx.populator()
        .populate("Story", &mut stories, "author fans")
        .unwrap();

    let first = &stories[0];
    assert_eq!(name(first, "author"), Some(Value::from("Al")));
    assert!(matches!(first.get("author"), Some(Value::Entity(_))));
    // Order and duplicates follow the stored identifiers.
    assert_eq!(
        names(first, "fans"),
        vec![Value::from("Bo"), Value::from("Cy"), Value::from("Bo")]
    );

    // Unmatched identifiers are dropped from arrays.
    assert_eq!(names(&stories[1], "fans"), vec![Value::from("Al"), Value::from("Di")]);
}

#[test]
fn test_missing_single_reference_is_unchanged() {
    let ctx = TestContext::new();
    let mut stories = stories();

    ctx.populator()
        .populate("Story", &mut stories, "author")
        .unwrap();

    assert_eq!(stories[1].get("author"), Some(&Value::Int64(9)));
    assert!(!stories[1].is_populated("author"));
    assert_eq!(stories[1].populated("author"), None);
    assert_eq!(ctx.metrics.references_missing(), 1);
}

#[test]
fn test_populate_is_idempotent() {
    let ctx = TestContext::new();
    let mut stories = vec![stories().remove(0)];
    let populator = ctx.populator();

    populator.populate("Story", &mut stories, "author fans").unwrap();
    let once = stories.clone();
    assert_eq!(ctx.metrics.lookup_count(), 1);

    populator.populate("Story", &mut stories, "author fans").unwrap();
    assert_eq!(stories, once);
    assert_eq!(stories[0].populated("fans"), Some(&ids(&[2, 3, 2])));
    assert_eq!(ctx.metrics.lookup_count(), 1);
}

#[test]
fn test_shared_batch_across_paths() {
    let ctx = TestContext::new();
    let mut stories = stories();

    ctx.populator()
        .populate("Story", &mut stories, "author fans comments.author")
        .unwrap();

    assert_eq!(ctx.metrics.lookup_count(), 1);
    assert_eq!(ctx.metrics.ids_requested(), 5);
    assert_eq!(
        ctx.metrics.lookups_by_collection().get("Person").copied(),
        Some(1)
    );

    let first = &stories[0];
    assert_eq!(name(first, "comments.0.author"), Some(Value::from("Cy")));
    assert_eq!(first.get("comments.1.author"), Some(&Value::Int64(9)));
    assert_eq!(first.populated("comments.author"), Some(&ids(&[3, 9])));
}

#[test]
fn test_match_filters_referenced_documents() {
    let ctx = TestContext::new();
    let mut stories = stories();

    let spec = PopulateSpec::new("fans").with_match(FilterExpr::ge("age", 30));
    ctx.populator().populate("Story", &mut stories, spec).unwrap();

    assert_eq!(names(&stories[0], "fans"), vec![Value::from("Cy")]);
    assert_eq!(names(&stories[1], "fans"), vec![Value::from("Al"), Value::from("Di")]);
}

#[test]
fn test_per_document_limit() {
    let ctx = TestContext::new();
    let mut stories = stories();

    let spec = PopulateSpec::new("fans")
        .sort(OrderSpec::desc("age"))
        .limit(2);
    ctx.populator().populate("Story", &mut stories, spec).unwrap();

    // Sort picks the survivors; the array keeps identifier order.
    assert_eq!(
        names(&stories[0], "fans"),
        vec![Value::from("Bo"), Value::from("Cy"), Value::from("Bo")]
    );
    assert_eq!(names(&stories[1], "fans"), vec![Value::from("Al"), Value::from("Di")]);
    assert_eq!(ctx.metrics.lookup_count(), 2);

    let mut stories = self::stories();
    let spec = PopulateSpec::new("fans").sort(OrderSpec::desc("age")).limit(1);
    ctx.populator().populate("Story", &mut stories, spec).unwrap();
    assert_eq!(names(&stories[0], "fans"), vec![Value::from("Cy")]);
    assert_eq!(names(&stories[1], "fans"), vec![Value::from("Di")]);
}

#[test]
fn test_retain_nulls() {
    let ctx = TestContext::new();
    let mut stories = stories();

    let spec = PopulateSpec::new("fans").retain_nulls();
    ctx.populator().populate("Story", &mut stories, spec).unwrap();

    assert_eq!(
        names(&stories[1], "fans"),
        vec![Value::from("Al"), Value::Null, Value::from("Di")]
    );
}

#[test]
fn test_lean_and_select() {
    let ctx = TestContext::new();
    let mut stories = stories();

    let spec = PopulateSpec::new("author")
        .lean()
        .select(Projection::include(["name"]));
    ctx.populator().populate("Story", &mut stories, spec).unwrap();

    let author = stories[0].get("author").unwrap();
    assert_eq!(
        author,
        &Value::Object(Document::new().with("_id", 1i64).with("name", "Al"))
    );

    let mut stories = self::stories();
    let populator = ctx
        .populator()
        .with_config(PopulateConfig::default().with_lean(true));
    populator.populate("Story", &mut stories, "fans").unwrap();
    assert!(matches!(stories[0].get("fans.0"), Some(Value::Object(_))));
}

#[test]
fn test_projection_excluding_id_strips_it() {
    let ctx = TestContext::new();
    let mut stories = stories();

    let spec = PopulateSpec::new("author")
        .lean()
        .select(Projection::parse("-_id -age -friends").unwrap());
    ctx.populator().populate("Story", &mut stories, spec).unwrap();

    let author = stories[0].get("author").and_then(Value::as_document).unwrap();
    assert_eq!(author.get("name"), Some(&Value::from("Al")));
    assert!(!author.contains("_id"));
}

#[test]
fn test_recursive_population() {
    let ctx = TestContext::new();
    let mut stories = stories();

    let spec = PopulateSpec::new("fans")
        .populate(PopulateSpec::new("friends").populate("employer"));
    ctx.populator().populate("Story", &mut stories, spec).unwrap();

    let second = &stories[1];
    assert_eq!(name(second, "fans.0"), Some(Value::from("Al")));
    assert_eq!(
        names(second.get("fans.0").and_then(Value::as_document).unwrap(), "friends"),
        vec![Value::from("Bo"), Value::from("Cy")]
    );
    assert_eq!(
        name(second, "fans.0.friends.0.employer"),
        Some(Value::from("Acme"))
    );
    // Duplicated references are materialized independently.
    assert_eq!(name(&stories[0], "fans.1.friends.0"), Some(Value::from("Di")));
    assert!(stories[0].get("fans.2").unwrap().as_document().unwrap().populated("friends").is_none());
    assert_eq!(ctx.metrics.levels(), 3);
    assert_eq!(ctx.metrics.lookups_by_collection().get("Company").copied(), Some(1));
}

#[test]
fn test_manual_assignment() {
    let ctx = TestContext::new();
    let mut stories = stories();
    let manual = Document::new().with("_id", 7i64).with("name", "Manual");
    stories[0].set("author", manual.clone()).unwrap();

    ctx.populator()
        .populate("Story", &mut stories[..1], "author")
        .unwrap();

    assert_eq!(stories[0].get("author"), Some(&Value::Object(manual)));
    assert!(stories[0].is_populated("author"));
    assert_eq!(stories[0].populated("author"), None);
    assert_eq!(ctx.metrics.lookup_count(), 0);
}

#[test]
fn test_depopulate_and_reassignment() {
    let ctx = TestContext::new();
    let mut stories = stories();

    ctx.populator()
        .populate("Story", &mut stories, "author fans")
        .unwrap();

    let first = &mut stories[0];
    assert_eq!(first.populated("author"), Some(&Value::Int64(1)));
    assert!(first.depopulate("fans"));
    assert_eq!(first.get("fans"), Some(&ids(&[2, 3, 2])));
    assert_eq!(first.populated("fans"), None);
    assert!(!first.depopulate("fans"));

    first.set("author", 4i64).unwrap();
    assert_eq!(first.populated("author"), None);
    assert_eq!(first.get("author"), Some(&Value::Int64(4)));
}

#[test]
fn test_entity_save_and_remove() {
    let ctx = TestContext::new();
    let mut stories = stories();

    let spec = PopulateSpec::new("fans").populate("friends");
    ctx.populator().populate("Story", &mut stories, spec).unwrap();

    let mut cy = stories[0]
        .get("fans.1")
        .and_then(Value::as_entity)
        .cloned()
        .unwrap();
    assert_eq!(cy.id(), &DocId::Int(3));
    cy.set("name", "Cyrus").unwrap();
    cy.save().unwrap();

    let stored = ctx.store.get("Person", &DocId::Int(3)).unwrap().unwrap();
    assert_eq!(stored.get("name"), Some(&Value::from("Cyrus")));
    // Populated paths are written back as identifiers.
    assert_eq!(stored.get("friends"), Some(&ids(&[4])));

    // Removing an entity deletes it from its own collection.
    assert!(cy.remove().unwrap());
    assert_eq!(ctx.store.get("Person", &DocId::Int(3)).unwrap(), None);
    assert_eq!(ctx.store.count("Person").unwrap(), 3);

    let mut fresh = self::stories();
    ctx.populator().populate("Story", &mut fresh, "fans").unwrap();
    assert_eq!(names(&fresh[0], "fans"), vec![Value::from("Bo"), Value::from("Bo")]);
}

#[test]
fn test_populate_entities() {
    let ctx = TestContext::new();
    let backend: Arc<dyn EntityBackend> = ctx.store.clone();
    let mut people: Vec<Entity> = ctx
        .people(&[1, 3])
        .into_iter()
        .map(|doc| {
            let id = doc.id("_id").unwrap();
            Entity::new("Person", id, doc, backend.clone())
        })
        .collect();

    ctx.populator()
        .populate("Person", &mut people, "friends")
        .unwrap();

    assert_eq!(
        names(people[0].document(), "friends"),
        vec![Value::from("Bo"), Value::from("Cy")]
    );
    assert!(people[1].is_populated("friends"));
}

#[test]
fn test_untargeted_reference_needs_model() {
    let ctx = TestContext::new();
    let mut story = Document::new().with("_id", 12i64).with("subject", 4i64);

    let err = ctx
        .populator()
        .populate_one("Story", &mut story, "subject")
        .unwrap_err();
    assert!(matches!(err, Error::AmbiguousTarget { .. }));

    ctx.populator()
        .populate_one("Story", &mut story, PopulateSpec::new("subject").model("Person"))
        .unwrap();
    assert_eq!(name(&story, "subject"), Some(Value::from("Di")));

    let mut story = Document::new().with("_id", 13i64).with("subject", 4i64);
    let err = ctx
        .populator()
        .populate_one("Story", &mut story, PopulateSpec::new("subject").model("Company"))
        .unwrap_err();
    assert!(matches!(err, Error::IdTypeMismatch { .. }));
}

#[test]
fn test_resolution_errors_precede_lookups() {
    let ctx = TestContext::new();
    let executor = Arc::new(InstrumentedExecutor::new(ctx.store.clone(), None));
    let populator = Populator::with_parts(&ctx.registry, executor.clone(), ctx.store.clone());
    let mut stories = stories();
    let before = stories.clone();

    let err = populator
        .populate("Story", &mut stories, "author nope")
        .unwrap_err();
    assert!(matches!(err, Error::UnknownReference { ref path, .. } if path == "nope"));

    let err = populator
        .populate("Planet", &mut stories, "author")
        .unwrap_err();
    assert!(matches!(err, Error::UnknownCollection(ref name) if name == "Planet"));

    assert_eq!(executor.calls.load(Ordering::SeqCst), 0);
    assert_eq!(stories, before);
}

#[test]
fn test_lookup_failure_keeps_earlier_levels() {
    let ctx = TestContext::new();
    let executor = Arc::new(InstrumentedExecutor::new(ctx.store.clone(), Some("Company")));
    let populator = Populator::with_parts(&ctx.registry, executor.clone(), ctx.store.clone())
        .with_metrics(ctx.metrics.clone());
    let mut people = ctx.people(&[1]);

    let spec = PopulateSpec::new("friends").populate("employer");
    let err = populator.populate("Person", &mut people, spec).unwrap_err();

    match &err {
        Error::Lookup { collection, source } => {
            assert_eq!(collection, "Company");
            assert_eq!(source.to_string(), "connection reset");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(std::error::Error::source(&err).is_some());

    // Friends were substituted before the employer level failed.
    assert_eq!(
        names(&people[0], "friends"),
        vec![Value::from("Bo"), Value::from("Cy")]
    );
    assert_eq!(
        people[0].get("friends.0.employer"),
        Some(&Value::from("acme"))
    );
    assert_eq!(ctx.metrics.lookup_failures(), 1);
}

#[test]
fn test_depth_bound() {
    let ctx = TestContext::new();
    let populator = ctx
        .populator()
        .with_config(PopulateConfig::default().with_max_depth(1));
    let mut stories = stories();

    let spec = PopulateSpec::new("fans").populate("friends");
    let err = populator.populate("Story", &mut stories, spec).unwrap_err();
    assert!(matches!(err, Error::DepthExceeded { depth: 2, max: 1 }));
    assert_eq!(stories, self::stories());
}

#[test]
fn test_concurrent_lookups_match_sequential() {
    let ctx = TestContext::new();
    let request = PopulateRequest::new()
        .with("author")
        .with(PopulateSpec::new("fans").with_match(FilterExpr::ge("age", 30)));

    let mut sequential = stories();
    ctx.populator()
        .populate("Story", &mut sequential, request.clone())
        .unwrap();

    let mut concurrent = stories();
    ctx.populator()
        .with_config(PopulateConfig::default().with_concurrent_lookups(true))
        .populate("Story", &mut concurrent, request)
        .unwrap();

    assert_eq!(concurrent, sequential);
}

#[test]
fn test_registry_rejects_mismatched_id_type() {
    let err = Registry::builder()
        .with_collection(CollectionDef::new("Person", IdType::Int))
        .with_collection(CollectionDef::new("Story", IdType::Int))
        .with_reference(ReferenceDescriptor::single("Story", "author", "Person"))
        .build()
        .unwrap_err();
    assert!(matches!(
        err,
        Error::IdTypeMismatch {
            expected: IdType::Int,
            actual: IdType::Uuid,
            ..
        }
    ));
}

#[test]
fn test_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = DocumentStore::open(StorageConfig::new(dir.path())).unwrap();
        store
            .insert_document("Person", "_id", &person(1, "Al", 30))
            .unwrap();
        store.flush().unwrap();
    }

    let store = DocumentStore::open(StorageConfig::new(dir.path())).unwrap();
    assert_eq!(
        store.get("Person", &DocId::Int(1)).unwrap(),
        Some(person(1, "Al", 30))
    );
}
