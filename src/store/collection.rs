//! Collection accessor
//!
//! A `Collection` pairs a collection name with the live engine. Resolving
//! one is synchronous once the connection guard has completed; handles are
//! not cached or validated.

use std::sync::Arc;

use serde_json::Number;

use crate::errors::StoreResult;
use crate::observability::{log_event_with_fields, Event};
use crate::query::{Compiler, Cursor, Predicate};
use crate::storage::{Document, FindSpec, ObjectId, StorageEngine, UpdateDescriptor};

/// Live handle to one collection
#[derive(Clone)]
pub struct Collection {
    name: String,
    engine: Arc<dyn StorageEngine>,
}

impl Collection {
    pub fn new(name: impl Into<String>, engine: Arc<dyn StorageEngine>) -> Self {
        Self {
            name: name.into(),
            engine,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The engine behind this handle
    pub fn engine(&self) -> &Arc<dyn StorageEngine> {
        &self.engine
    }

    /// An unconstrained cursor
    pub fn cursor(&self) -> Cursor {
        Cursor::new(self.name.as_str())
    }

    /// Compile a predicate sequence against this collection
    pub fn compile(&self, predicates: &[Predicate]) -> StoreResult<Cursor> {
        Compiler::compile(&self.name, predicates)
    }

    // ==================
    // Cursor terminals
    // ==================

    pub async fn find(&self, cursor: &Cursor) -> StoreResult<Vec<Document>> {
        let spec = cursor.find_spec();
        self.engine.find(&self.name, &spec).await
    }

    pub async fn find_one(&self, cursor: &Cursor) -> StoreResult<Option<Document>> {
        let spec = cursor.find_spec();
        self.engine.find_one(&self.name, &spec).await
    }

    pub async fn count(&self, cursor: &Cursor) -> StoreResult<u64> {
        let spec = cursor.find_spec();
        self.engine.count(&self.name, &spec).await
    }

    pub async fn sum(&self, cursor: &Cursor, field: &str) -> StoreResult<Number> {
        let spec = cursor.find_spec();
        self.engine.sum(&self.name, &spec, field).await
    }

    /// Delete every document the cursor matches. Pagination is ignored.
    pub async fn delete_many(&self, cursor: &Cursor) -> StoreResult<u64> {
        let filter = cursor.filter_document();
        self.engine.delete_many(&self.name, &filter).await
    }

    // ==================
    // Single-document writes
    // ==================

    pub async fn find_one_where(&self, filter: Document) -> StoreResult<Option<Document>> {
        let spec = FindSpec::filter(filter);
        self.engine.find_one(&self.name, &spec).await
    }

    pub async fn find_where(&self, filter: Document) -> StoreResult<Vec<Document>> {
        let spec = FindSpec::filter(filter);
        self.engine.find(&self.name, &spec).await
    }

    pub async fn insert_one(&self, document: Document) -> StoreResult<ObjectId> {
        self.engine.insert_one(&self.name, document).await
    }

    pub async fn replace_one(&self, filter: &Document, replacement: Document) -> StoreResult<u64> {
        self.engine.replace_one(&self.name, filter, replacement).await
    }

    pub async fn update_one(
        &self,
        filter: &Document,
        update: &UpdateDescriptor,
    ) -> StoreResult<u64> {
        self.engine.update_one(&self.name, filter, update).await
    }

    pub async fn delete_one(&self, filter: &Document) -> StoreResult<u64> {
        self.engine.delete_one(&self.name, filter).await
    }

    /// Best-effort index creation. Failures are discarded.
    pub async fn ensure_index(&self, name: &str, keys: &Document) {
        match self.engine.create_index(&self.name, name, keys).await {
            Ok(()) => log_event_with_fields(
                Event::IndexCreated,
                &[("collection", self.name.as_str()), ("name", name)],
            ),
            Err(err) => {
                let message = err.to_string();
                log_event_with_fields(
                    Event::IndexCreateSkipped,
                    &[
                        ("collection", self.name.as_str()),
                        ("error", message.as_str()),
                        ("name", name),
                    ],
                );
            }
        }
    }
}
