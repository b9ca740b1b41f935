//! # Store Facade
//!
//! The public CRUD contract. Every operation awaits the connection guard,
//! resolves a collection handle, compiles predicates where a filter is
//! involved, executes, and normalizes raw documents into records.
//!
//! Failures propagate unchanged to the caller. The one exception is index
//! creation, which is best-effort.

use std::sync::Arc;

use serde_json::{json, Map, Number, Value};

use super::collection::Collection;
use super::record::Record;
use crate::config::StoreConfig;
use crate::connection::ConnectionGuard;
use crate::errors::StoreResult;
use crate::observability::{log_event_with_fields, Event};
use crate::query::{Cursor, Predicate};
use crate::storage::{
    Connector, Document, MemoryConnector, ObjectId, StorageEngine, UpdateDescriptor,
};
use crate::ID_FIELD;

/// Query compilation and CRUD over one storage engine
pub struct Store {
    config: StoreConfig,
    guard: ConnectionGuard,
}

impl Store {
    /// Create a store. The connection is brought up on first use.
    pub fn new(config: StoreConfig, connector: impl Connector + 'static) -> Self {
        Self::with_connector(config, Arc::new(connector))
    }

    pub fn with_connector(config: StoreConfig, connector: Arc<dyn Connector>) -> Self {
        let guard = ConnectionGuard::new(&config, connector);
        Self { config, guard }
    }

    /// Create a store and wait for its connection
    pub async fn connect(
        config: StoreConfig,
        connector: impl Connector + 'static,
    ) -> StoreResult<Self> {
        let store = Self::new(config, connector);
        store.ready().await?;
        Ok(store)
    }

    /// A store over a fresh in-memory engine
    pub fn in_memory(database: impl Into<String>) -> Self {
        let database = database.into();
        let url = format!("memory://{}", database);
        Self::new(StoreConfig::new(url, database), MemoryConnector::new())
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn guard(&self) -> &ConnectionGuard {
        &self.guard
    }

    /// Wait for the connection bring-up
    pub async fn ready(&self) -> StoreResult<()> {
        self.guard.engine().await.map(|_| ())
    }

    /// Resolve a collection handle
    pub async fn collection(&self, id: &str) -> StoreResult<Collection> {
        let engine = self.guard.engine().await?;
        Ok(Collection::new(id, engine))
    }

    // ==================
    // Reads
    // ==================

    /// Look up one record by identifier. A missing record is `None`.
    pub async fn find_by_id(&self, collection: &str, id: &str) -> StoreResult<Option<Record>> {
        let handle = self.collection(collection).await?;
        let filter = id_filter(&ObjectId::parse_str(id)?);

        handle
            .find_one_where(filter)
            .await?
            .map(Record::normalize)
            .transpose()
    }

    /// Look up several records in one query. Result order is unspecified
    /// and unknown ids are simply absent.
    pub async fn find_by_ids<S: AsRef<str>>(
        &self,
        collection: &str,
        ids: &[S],
    ) -> StoreResult<Vec<Record>> {
        let handle = self.collection(collection).await?;
        let oids = ids
            .iter()
            .map(|id| ObjectId::parse_str(id.as_ref()).map(|oid| oid.to_value()))
            .collect::<StoreResult<Vec<Value>>>()?;

        let mut filter = Map::new();
        filter.insert(ID_FIELD.to_string(), json!({ "$in": oids }));

        Record::normalize_all(handle.find_where(filter).await?)
    }

    pub async fn find(
        &self,
        collection: &str,
        predicates: &[Predicate],
    ) -> StoreResult<Vec<Record>> {
        let handle = self.collection(collection).await?;
        let cursor = handle.compile(predicates)?;
        Record::normalize_all(handle.find(&cursor).await?)
    }

    pub async fn find_one(
        &self,
        collection: &str,
        predicates: &[Predicate],
    ) -> StoreResult<Option<Record>> {
        let handle = self.collection(collection).await?;
        let cursor = handle.compile(predicates)?;
        handle
            .find_one(&cursor)
            .await?
            .map(Record::normalize)
            .transpose()
    }

    pub async fn count(&self, collection: &str, predicates: &[Predicate]) -> StoreResult<u64> {
        let handle = self.collection(collection).await?;
        let cursor = handle.compile(predicates)?;
        handle.count(&cursor).await
    }

    /// Sum of the numeric values of `field` over matching documents.
    /// Integer totals stay exact.
    pub async fn sum(
        &self,
        collection: &str,
        predicates: &[Predicate],
        field: &str,
    ) -> StoreResult<Number> {
        let handle = self.collection(collection).await?;
        let cursor = handle.compile(predicates)?;
        handle.sum(&cursor, field).await
    }

    // ==================
    // Writes
    // ==================

    /// Insert a document and return its identifier.
    ///
    /// A supplied `_id` is reused in native form; an invalid one fails with
    /// `InvalidIdentifier`.
    pub async fn insert(&self, collection: &str, mut document: Document) -> StoreResult<String> {
        let handle = self.collection(collection).await?;

        match document.get(ID_FIELD) {
            Some(Value::Null) => {
                document.remove(ID_FIELD);
            }
            Some(value) => {
                let oid = ObjectId::from_value(value)?;
                document.insert(ID_FIELD.to_string(), oid.to_value());
            }
            None => {}
        }

        let oid = handle.insert_one(document).await?;
        Ok(oid.to_hex())
    }

    /// Delete at most one document by identifier
    pub async fn remove_by_id(&self, collection: &str, id: &str) -> StoreResult<()> {
        let handle = self.collection(collection).await?;
        let filter = id_filter(&ObjectId::parse_str(id)?);
        handle.delete_one(&filter).await?;
        Ok(())
    }

    /// Delete every matching document. Not atomic across the matched set.
    pub async fn remove(&self, collection: &str, predicates: &[Predicate]) -> StoreResult<()> {
        let handle = self.collection(collection).await?;
        let cursor = handle.compile(predicates)?;
        handle.delete_many(&cursor).await?;
        Ok(())
    }

    /// Overwrite a document body, keeping its identifier
    pub async fn replace_by_id(
        &self,
        collection: &str,
        id: &str,
        mut object: Document,
    ) -> StoreResult<()> {
        let handle = self.collection(collection).await?;
        let filter = id_filter(&ObjectId::parse_str(id)?);
        object.remove(ID_FIELD);
        handle.replace_one(&filter, object).await?;
        Ok(())
    }

    /// Apply the touched keys of `candidate`: non-null values are set,
    /// null or absent ones unset, everything else left alone.
    pub async fn update_by_id<I, S>(
        &self,
        collection: &str,
        id: &str,
        candidate: &Document,
        touched: I,
    ) -> StoreResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let handle = self.collection(collection).await?;
        let filter = id_filter(&ObjectId::parse_str(id)?);

        let update = UpdateDescriptor::from_touched(candidate, touched);
        if update.is_empty() {
            return Ok(());
        }
        handle.update_one(&filter, &update).await?;
        Ok(())
    }

    // ==================
    // Indexes
    // ==================

    /// Best-effort index creation. Never fails, not even when the
    /// connection is down.
    pub async fn create_index(&self, collection: &str, name: &str, keys: &Document) {
        match self.collection(collection).await {
            Ok(handle) => handle.ensure_index(name, keys).await,
            Err(err) => {
                let message = err.to_string();
                log_event_with_fields(
                    Event::IndexCreateSkipped,
                    &[
                        ("collection", collection),
                        ("error", message.as_str()),
                        ("name", name),
                    ],
                );
            }
        }
    }

    // ==================
    // Raw access
    // ==================

    /// Compiled predicates as an aggregation pipeline
    pub async fn pipeline(
        &self,
        collection: &str,
        predicates: &[Predicate],
    ) -> StoreResult<Vec<Value>> {
        let handle = self.collection(collection).await?;
        Ok(handle.compile(predicates)?.pipeline())
    }

    /// The underlying engine
    pub async fn raw_engine(&self) -> StoreResult<Arc<dyn StorageEngine>> {
        self.guard.engine().await
    }

    /// A collection handle, bypassing normalization
    pub async fn raw_collection(&self, collection: &str) -> StoreResult<Collection> {
        self.collection(collection).await
    }

    /// An unconstrained cursor over the collection
    pub async fn raw_cursor(&self, collection: &str) -> StoreResult<Cursor> {
        Ok(self.collection(collection).await?.cursor())
    }
}

fn id_filter(oid: &ObjectId) -> Document {
    let mut filter = Map::new();
    filter.insert(ID_FIELD.to_string(), oid.to_value());
    filter
}
