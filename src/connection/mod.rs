//! # Connection Bring-up
//!
//! One-time, single-flight connection to the storage engine. Every store
//! operation awaits the guard before touching storage.

mod guard;

pub use guard::{ConnectionGuard, ReadySignal};
