//! # Query Compilation
//!
//! Turns a backend-agnostic predicate sequence into one lazy `Cursor`.
//! Compilation is pure: no I/O happens until a terminal call on a
//! `Collection` executes the cursor.

mod compiler;
mod cursor;
mod pattern;
mod predicate;

pub use compiler::{Compiler, Effect, PendingNegation};
pub use cursor::{Constraint, Cursor, RangeOp};
pub use pattern::Pattern;
pub use predicate::Predicate;
