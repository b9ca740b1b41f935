//! In-memory document engine
//!
//! Implements `StorageEngine` over per-collection document lists kept in
//! insertion order. Reads filter with `FilterMatcher`, then sort (stable),
//! skip and limit. Used for `memory://` URLs and throughout the tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use futures_util::future::{self, BoxFuture};
use futures_util::FutureExt;
use serde_json::{Number, Value};

use super::engine::{Connector, EngineFuture, FindSpec, SortDirection, StorageEngine};
use super::matcher::{lookup, sort_order, Document, FilterMatcher};
use super::object_id::ObjectId;
use super::update::UpdateDescriptor;
use crate::config::StoreConfig;
use crate::errors::{StoreError, StoreResult};
use crate::ID_FIELD;

/// URL scheme served by `MemoryConnector`
pub const MEMORY_SCHEME: &str = "memory://";

/// Documents and index definitions of one collection
#[derive(Debug, Default, Clone)]
struct CollectionData {
    documents: Vec<Document>,
    indexes: BTreeMap<String, Document>,
}

impl CollectionData {
    fn position(&self, filter: &Document) -> StoreResult<Option<usize>> {
        let matcher = FilterMatcher::new();
        for (i, doc) in self.documents.iter().enumerate() {
            if matcher.is_match(doc, filter)? {
                return Ok(Some(i));
            }
        }
        Ok(None)
    }
}

/// In-memory storage engine
#[derive(Debug)]
pub struct MemoryEngine {
    database: String,
    collections: RwLock<HashMap<String, CollectionData>>,
}

impl MemoryEngine {
    /// Create an empty engine for the given database
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Names of the indexes defined on a collection
    pub fn index_names(&self, collection: &str) -> StoreResult<Vec<String>> {
        let collections = self.read_lock()?;
        Ok(collections
            .get(collection)
            .map(|c| c.indexes.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn read_lock(
        &self,
    ) -> StoreResult<std::sync::RwLockReadGuard<'_, HashMap<String, CollectionData>>> {
        self.collections
            .read()
            .map_err(|e| StoreError::storage(e.to_string()))
    }

    fn write_lock(
        &self,
    ) -> StoreResult<std::sync::RwLockWriteGuard<'_, HashMap<String, CollectionData>>> {
        self.collections
            .write()
            .map_err(|e| StoreError::storage(e.to_string()))
    }

    /// Filter, sort, skip and limit
    fn select(&self, collection: &str, spec: &FindSpec) -> StoreResult<Vec<Document>> {
        let collections = self.read_lock()?;
        let Some(data) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let matcher = FilterMatcher::new();
        let mut matched = Vec::new();
        for doc in &data.documents {
            if matcher.is_match(doc, &spec.filter)? {
                matched.push(doc.clone());
            }
        }
        drop(collections);

        if let Some(sort) = &spec.sort {
            matched.sort_by(|a, b| {
                let ordering = sort_order(lookup(a, &sort.field), lookup(b, &sort.field));
                match sort.direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            });
        }

        let skip = spec.skip.unwrap_or(0) as usize;
        let limit = match spec.limit {
            // A zero limit means no limit
            Some(0) | None => usize::MAX,
            Some(n) => n as usize,
        };

        Ok(matched.into_iter().skip(skip).take(limit).collect())
    }

    fn insert(&self, collection: &str, mut document: Document) -> StoreResult<ObjectId> {
        let id = match document.get(ID_FIELD) {
            Some(value) if !value.is_null() => ObjectId::from_value(value)
                .map_err(|e| StoreError::storage(e.to_string()))?,
            _ => ObjectId::new(),
        };
        document.insert(ID_FIELD.to_string(), id.to_value());

        let mut collections = self.write_lock()?;
        let data = collections.entry(collection.to_string()).or_default();

        let id_value = id.to_value();
        if data.documents.iter().any(|d| d.get(ID_FIELD) == Some(&id_value)) {
            return Err(StoreError::storage(format!(
                "duplicate key error: {}.{} _id {}",
                self.database, collection, id
            )));
        }

        data.documents.push(document);
        Ok(id)
    }

    fn modify_first(
        &self,
        collection: &str,
        filter: &Document,
        apply: impl FnOnce(&mut Document),
    ) -> StoreResult<u64> {
        let mut collections = self.write_lock()?;
        let Some(data) = collections.get_mut(collection) else {
            return Ok(0);
        };

        match data.position(filter)? {
            Some(i) => {
                let doc = &mut data.documents[i];
                let id = doc.get(ID_FIELD).cloned();
                apply(doc);
                // The identifier is immutable
                if let Some(id) = id {
                    doc.insert(ID_FIELD.to_string(), id);
                }
                Ok(1)
            }
            None => Ok(0),
        }
    }

    fn delete(&self, collection: &str, filter: &Document, many: bool) -> StoreResult<u64> {
        let mut collections = self.write_lock()?;
        let Some(data) = collections.get_mut(collection) else {
            return Ok(0);
        };

        if !many {
            return Ok(match data.position(filter)? {
                Some(i) => {
                    data.documents.remove(i);
                    1
                }
                None => 0,
            });
        }

        let matcher = FilterMatcher::new();
        let documents = std::mem::take(&mut data.documents);
        let mut kept = Vec::with_capacity(documents.len());
        let mut deleted = 0;
        let mut failure = None;
        for doc in documents {
            if failure.is_some() {
                kept.push(doc);
                continue;
            }
            // A matcher error stops the sweep; earlier matches stay deleted
            match matcher.is_match(&doc, filter) {
                Ok(true) => deleted += 1,
                Ok(false) => kept.push(doc),
                Err(e) => {
                    failure = Some(e);
                    kept.push(doc);
                }
            }
        }
        data.documents = kept;

        match failure {
            Some(e) => Err(e),
            None => Ok(deleted),
        }
    }

    fn add_index(&self, collection: &str, name: &str, keys: &Document) -> StoreResult<()> {
        if keys.is_empty() {
            return Err(StoreError::IndexCreation(format!(
                "index '{}' has no keys",
                name
            )));
        }

        let mut collections = self.write_lock()?;
        let data = collections.entry(collection.to_string()).or_default();

        match data.indexes.get(name) {
            Some(existing) if existing != keys => Err(StoreError::IndexCreation(format!(
                "index '{}' already exists with different options",
                name
            ))),
            Some(_) => Ok(()),
            None => {
                data.indexes.insert(name.to_string(), keys.clone());
                Ok(())
            }
        }
    }
}

/// Sums numeric values, skipping everything else.
///
/// Stays integral while every value is an integer and the total fits in
/// `i64`; otherwise the total is a float.
fn sum_numbers<'v>(values: impl Iterator<Item = &'v Value>) -> Number {
    let mut integral = Some(0i64);
    let mut float = 0.0;

    for number in values.filter_map(|v| match v {
        Value::Number(n) => Some(n),
        _ => None,
    }) {
        float += number.as_f64().unwrap_or(0.0);
        integral = match (integral, number.as_i64()) {
            (Some(total), Some(n)) => total.checked_add(n),
            _ => None,
        };
    }

    match integral {
        Some(total) => Number::from(total),
        None => Number::from_f64(float).unwrap_or_else(|| Number::from(0)),
    }
}

fn ready<'a, T: Send + 'a>(result: StoreResult<T>) -> EngineFuture<'a, T> {
    future::ready(result).boxed()
}

impl StorageEngine for MemoryEngine {
    fn database(&self) -> &str {
        &self.database
    }

    fn find<'a>(
        &'a self,
        collection: &'a str,
        spec: &'a FindSpec,
    ) -> EngineFuture<'a, Vec<Document>> {
        ready(self.select(collection, spec))
    }

    fn find_one<'a>(
        &'a self,
        collection: &'a str,
        spec: &'a FindSpec,
    ) -> EngineFuture<'a, Option<Document>> {
        let mut single = spec.clone();
        single.limit = Some(1);
        ready(
            self.select(collection, &single)
                .map(|docs| docs.into_iter().next()),
        )
    }

    fn count<'a>(&'a self, collection: &'a str, spec: &'a FindSpec) -> EngineFuture<'a, u64> {
        ready(self.select(collection, spec).map(|docs| docs.len() as u64))
    }

    fn sum<'a>(
        &'a self,
        collection: &'a str,
        spec: &'a FindSpec,
        field: &'a str,
    ) -> EngineFuture<'a, Number> {
        ready(
            self.select(collection, spec)
                .map(|docs| sum_numbers(docs.iter().filter_map(|doc| lookup(doc, field)))),
        )
    }

    fn insert_one<'a>(
        &'a self,
        collection: &'a str,
        document: Document,
    ) -> EngineFuture<'a, ObjectId> {
        ready(self.insert(collection, document))
    }

    fn replace_one<'a>(
        &'a self,
        collection: &'a str,
        filter: &'a Document,
        replacement: Document,
    ) -> EngineFuture<'a, u64> {
        ready(self.modify_first(collection, filter, |doc| *doc = replacement))
    }

    fn update_one<'a>(
        &'a self,
        collection: &'a str,
        filter: &'a Document,
        update: &'a UpdateDescriptor,
    ) -> EngineFuture<'a, u64> {
        ready(self.modify_first(collection, filter, |doc| update.apply(doc)))
    }

    fn delete_one<'a>(
        &'a self,
        collection: &'a str,
        filter: &'a Document,
    ) -> EngineFuture<'a, u64> {
        ready(self.delete(collection, filter, false))
    }

    fn delete_many<'a>(
        &'a self,
        collection: &'a str,
        filter: &'a Document,
    ) -> EngineFuture<'a, u64> {
        ready(self.delete(collection, filter, true))
    }

    fn create_index<'a>(
        &'a self,
        collection: &'a str,
        name: &'a str,
        keys: &'a Document,
    ) -> EngineFuture<'a, ()> {
        ready(self.add_index(collection, name, keys))
    }

    fn collection_names(&self) -> EngineFuture<'_, Vec<String>> {
        ready(self.read_lock().map(|collections| {
            let mut names: Vec<String> = collections.keys().cloned().collect();
            names.sort();
            names
        }))
    }
}

/// Connector for `memory://<name>` URLs
///
/// Each successful connect hands out a fresh `MemoryEngine`, unless one was
/// supplied with `with_engine`.
#[derive(Clone, Default)]
pub struct MemoryConnector {
    engine: Option<Arc<MemoryEngine>>,
    failure: Option<String>,
    latency: Option<Duration>,
    attempts: Arc<AtomicUsize>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve an existing engine instead of creating one
    pub fn with_engine(engine: Arc<MemoryEngine>) -> Self {
        Self {
            engine: Some(engine),
            ..Self::default()
        }
    }

    /// Every connection attempt fails with `reason`
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            failure: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Delay bring-up, so concurrent waiters overlap the attempt
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of connection attempts made so far
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Connector for MemoryConnector {
    fn connect(
        &self,
        config: &StoreConfig,
    ) -> BoxFuture<'static, StoreResult<Arc<dyn StorageEngine>>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let url = config.url.clone();
        let database = config.database.clone();
        let engine = self.engine.clone();
        let failure = self.failure.clone();
        let latency = self.latency;

        async move {
            if let Some(latency) = latency {
                tokio::time::sleep(latency).await;
            }
            if let Some(reason) = failure {
                return Err(StoreError::ConnectionFailure(reason));
            }
            if !url.starts_with(MEMORY_SCHEME) {
                return Err(StoreError::ConnectionFailure(format!(
                    "unsupported url scheme: {}",
                    url
                )));
            }

            let engine: Arc<dyn StorageEngine> = match engine {
                Some(engine) => engine as Arc<dyn StorageEngine>,
                None => Arc::new(MemoryEngine::new(database)),
            };
            Ok(engine)
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SortSpec;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn test_insert_generates_id() {
        let engine = MemoryEngine::new("app");
        let id = engine.insert_one("users", doc(json!({"name": "Ann"}))).await.unwrap();

        let found = engine
            .find_one("users", &FindSpec::filter(doc(json!({"_id": id.to_value()}))))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found["name"], "Ann");
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let engine = MemoryEngine::new("app");
        let id = ObjectId::new();

        engine
            .insert_one("users", doc(json!({"_id": id.to_value()})))
            .await
            .unwrap();
        let err = engine
            .insert_one("users", doc(json!({"_id": id.to_value()})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::StorageOperation(_)));
    }

    #[tokio::test]
    async fn test_sort_skip_limit() {
        let engine = MemoryEngine::new("app");
        for age in [30, 10, 20, 40] {
            engine.insert_one("users", doc(json!({"age": age}))).await.unwrap();
        }

        let spec = FindSpec {
            sort: Some(SortSpec::desc("age")),
            skip: Some(1),
            limit: Some(2),
            ..Default::default()
        };
        let ages: Vec<Value> = engine
            .find("users", &spec)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d["age"].clone())
            .collect();
        assert_eq!(ages, vec![json!(30), json!(20)]);
    }

    #[tokio::test]
    async fn test_replace_keeps_id() {
        let engine = MemoryEngine::new("app");
        let id = engine.insert_one("items", doc(json!({"a": 1}))).await.unwrap();
        let filter = doc(json!({"_id": id.to_value()}));

        let matched = engine
            .replace_one("items", &filter, doc(json!({"b": 2})))
            .await
            .unwrap();
        assert_eq!(matched, 1);

        let stored = engine
            .find_one("items", &FindSpec::filter(filter.clone()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, doc(json!({"_id": id.to_value(), "b": 2})));
    }

    #[tokio::test]
    async fn test_delete_many_and_missing_collection() {
        let engine = MemoryEngine::new("app");
        for n in 0..5 {
            engine.insert_one("nums", doc(json!({"n": n}))).await.unwrap();
        }

        let deleted = engine
            .delete_many("nums", &doc(json!({"n": {"$gte": 2}})))
            .await
            .unwrap();
        assert_eq!(deleted, 3);
        assert_eq!(engine.count("nums", &FindSpec::default()).await.unwrap(), 2);

        assert_eq!(engine.delete_many("ghost", &Document::new()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sum_keeps_integers_exact() {
        let engine = MemoryEngine::new("app");
        for n in [json!(9_007_199_254_740_992i64), json!(1), json!("x")] {
            engine.insert_one("nums", doc(json!({"n": n}))).await.unwrap();
        }

        let total = engine.sum("nums", &FindSpec::default(), "n").await.unwrap();
        assert_eq!(total, Number::from(9_007_199_254_740_993i64));
    }

    #[tokio::test]
    async fn test_sum_mixed_and_overflowing() {
        let engine = MemoryEngine::new("app");
        engine.insert_one("a", doc(json!({"n": 1}))).await.unwrap();
        engine.insert_one("a", doc(json!({"n": 0.5}))).await.unwrap();
        assert_eq!(
            engine.sum("a", &FindSpec::default(), "n").await.unwrap(),
            Number::from_f64(1.5).unwrap()
        );

        engine.insert_one("b", doc(json!({"n": i64::MAX}))).await.unwrap();
        engine.insert_one("b", doc(json!({"n": 1}))).await.unwrap();
        let total = engine.sum("b", &FindSpec::default(), "n").await.unwrap();
        assert!(total.as_i64().is_none());
        assert!(total.as_f64().unwrap() > 9.0e18);

        let empty = engine.sum("ghost", &FindSpec::default(), "n").await.unwrap();
        assert_eq!(empty, Number::from(0));
    }

    #[tokio::test]
    async fn test_index_redefinition_rejected() {
        let engine = MemoryEngine::new("app");
        let keys = doc(json!({"email": 1}));

        engine.create_index("users", "email_1", &keys).await.unwrap();
        // Same definition is a no-op
        engine.create_index("users", "email_1", &keys).await.unwrap();

        let err = engine
            .create_index("users", "email_1", &doc(json!({"email": -1})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::IndexCreation(_)));
        assert_eq!(engine.index_names("users").unwrap(), vec!["email_1"]);
    }

    #[tokio::test]
    async fn test_connector_rejects_unknown_scheme() {
        let connector = MemoryConnector::new();
        let config = StoreConfig::new("tcp://localhost:27017", "app");

        let err = connector.connect(&config).await.err().unwrap();
        assert!(err.is_fatal());
        assert_eq!(connector.attempts(), 1);
    }
}
