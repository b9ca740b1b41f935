//! Storage engine seam
//!
//! The document engine is an external collaborator. Everything the store
//! needs from it goes through `StorageEngine`; bring-up goes through
//! `Connector`. Both are object safe and return boxed futures so the store
//! can hold `Arc<dyn StorageEngine>`.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::{json, Number, Value};

use super::matcher::Document;
use super::object_id::ObjectId;
use super::update::UpdateDescriptor;
use crate::config::StoreConfig;
use crate::errors::StoreResult;

/// Future returned by engine operations
pub type EngineFuture<'a, T> = BoxFuture<'a, StoreResult<T>>;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// Engine sort flag: 1 or -1
    pub fn as_i32(&self) -> i32 {
        match self {
            SortDirection::Asc => 1,
            SortDirection::Desc => -1,
        }
    }
}

/// Single-key ordering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    /// Field to sort by
    pub field: String,
    /// Sort direction
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }

    /// Engine sort document: `{field: 1|-1}`
    pub fn to_value(&self) -> Value {
        json!({ self.field.clone(): self.direction.as_i32() })
    }
}

/// A fully specified read: filter plus ordering and pagination
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindSpec {
    pub filter: Document,
    pub sort: Option<SortSpec>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

impl FindSpec {
    /// Read matching `filter` with no ordering or pagination
    pub fn filter(filter: Document) -> Self {
        Self {
            filter,
            ..Default::default()
        }
    }
}

/// Terminal operations of a document storage engine
pub trait StorageEngine: Send + Sync {
    /// Name of the database this engine serves
    fn database(&self) -> &str;

    /// All documents matching `spec`
    fn find<'a>(&'a self, collection: &'a str, spec: &'a FindSpec)
        -> EngineFuture<'a, Vec<Document>>;

    /// First document matching `spec`
    fn find_one<'a>(
        &'a self,
        collection: &'a str,
        spec: &'a FindSpec,
    ) -> EngineFuture<'a, Option<Document>>;

    /// Number of documents matching `spec`
    fn count<'a>(&'a self, collection: &'a str, spec: &'a FindSpec) -> EngineFuture<'a, u64>;

    /// Sum of the numeric values of `field` over documents matching `spec`.
    /// Integral inputs give an integral total.
    fn sum<'a>(
        &'a self,
        collection: &'a str,
        spec: &'a FindSpec,
        field: &'a str,
    ) -> EngineFuture<'a, Number>;

    /// Insert one document. A present `_id` is kept, otherwise one is generated.
    fn insert_one<'a>(&'a self, collection: &'a str, document: Document)
        -> EngineFuture<'a, ObjectId>;

    /// Overwrite the body of the first matching document, keeping its `_id`.
    /// Returns the number of matched documents.
    fn replace_one<'a>(
        &'a self,
        collection: &'a str,
        filter: &'a Document,
        replacement: Document,
    ) -> EngineFuture<'a, u64>;

    /// Apply set/unset instructions to the first matching document.
    /// Returns the number of matched documents.
    fn update_one<'a>(
        &'a self,
        collection: &'a str,
        filter: &'a Document,
        update: &'a UpdateDescriptor,
    ) -> EngineFuture<'a, u64>;

    /// Delete the first matching document. Returns the number deleted.
    fn delete_one<'a>(&'a self, collection: &'a str, filter: &'a Document)
        -> EngineFuture<'a, u64>;

    /// Delete every matching document. Returns the number deleted.
    fn delete_many<'a>(&'a self, collection: &'a str, filter: &'a Document)
        -> EngineFuture<'a, u64>;

    /// Create a named index over `keys` (`{field: 1|-1}`)
    fn create_index<'a>(
        &'a self,
        collection: &'a str,
        name: &'a str,
        keys: &'a Document,
    ) -> EngineFuture<'a, ()>;

    /// Names of the collections holding data or indexes
    fn collection_names(&self) -> EngineFuture<'_, Vec<String>>;
}

/// Brings up a storage engine. Called at most once per store.
pub trait Connector: Send + Sync {
    fn connect(
        &self,
        config: &StoreConfig,
    ) -> BoxFuture<'static, StoreResult<Arc<dyn StorageEngine>>>;
}
