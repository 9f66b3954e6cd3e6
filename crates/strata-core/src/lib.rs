//! Core types for the Strata versioned table store.
//!
//! This crate is deliberately free of database dependencies. It holds the
//! identifier sanitizer, the abstract column-type system, the topology and
//! catalog record types, and the validation-error taxonomy. The PostgreSQL
//! backend lives in `strata-pg` and depends on this crate, never the other
//! way around.

pub mod column;
pub mod error;
pub mod ident;
pub mod mode;
pub mod permission;
pub mod relation;
pub mod row;
pub mod table;
pub mod version;

pub use error::{Error, Result};
