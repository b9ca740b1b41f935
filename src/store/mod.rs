//! # Store
//!
//! Collection handles, result normalization and the CRUD facade built on
//! the connection guard and the predicate compiler.

mod collection;
mod facade;
mod record;

pub use collection::Collection;
pub use facade::Store;
pub use record::Record;
