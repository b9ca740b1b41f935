//! Storage subsystem
//!
//! The engine seam (`StorageEngine`, `Connector`), the native identifier,
//! the filter evaluator and the in-memory engine built on it.
//!
//! # Invariants
//!
//! - Identifiers are unique per collection and never change once assigned
//! - Each single-document write is atomic; multi-document deletes are not

mod engine;
mod matcher;
mod memory;
mod object_id;
mod update;

pub use engine::{
    Connector, EngineFuture, FindSpec, SortDirection, SortSpec, StorageEngine,
};
pub use matcher::{compare_values, lookup, sort_order, Document, FilterMatcher};
pub use memory::{MemoryConnector, MemoryEngine, MEMORY_SCHEME};
pub use object_id::{ObjectId, OID_KEY};
pub use update::UpdateDescriptor;
