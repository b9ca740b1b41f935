//! docquery - predicate compilation and CRUD over a document store
//!
//! A backend-agnostic predicate sequence is compiled into one lazy cursor,
//! executed against a storage engine, and the results normalized into
//! `{id, object}` records.
//!
//! ```no_run
//! use docquery::{Predicate, Store};
//! use serde_json::json;
//!
//! # async fn demo() -> docquery::StoreResult<()> {
//! let store = Store::in_memory("app");
//! let doc = json!({"email": "a@x.com"}).as_object().cloned().unwrap_or_default();
//! let id = store.insert("users", doc).await?;
//!
//! let filter = json!({"email": "a@x.com"}).as_object().cloned().unwrap_or_default();
//! let found = store.find("users", &[Predicate::filter(filter)]).await?;
//! assert_eq!(found[0].id, id);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod connection;
pub mod errors;
pub mod observability;
pub mod query;
pub mod storage;
pub mod store;

/// Field holding the storage identifier in every stored document
pub const ID_FIELD: &str = "_id";

pub use config::StoreConfig;
pub use connection::ConnectionGuard;
pub use errors::{StoreError, StoreResult};
pub use query::{Compiler, Cursor, Pattern, Predicate};
pub use storage::{Connector, Document, MemoryConnector, MemoryEngine, ObjectId, StorageEngine};
pub use store::{Collection, Record, Store};
