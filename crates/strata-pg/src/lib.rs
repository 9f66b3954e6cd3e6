//! PostgreSQL/PostGIS backend for the Strata versioned table store.
//!
//! Wraps [`tokio_postgres`] behind a [`Store`] handle. Mutation paths
//! (import, restore) run inside one explicit transaction each; read seams
//! accept any [`tokio_postgres::GenericClient`] so they work both inside
//! and outside a transaction.

mod catalog;
mod ddl;
mod encode;
mod import;
mod mutator;
mod store;
mod topology;
mod version;

pub mod error;

pub use catalog::AUDIT_SCHEMA;
pub use encode::Value;
pub use error::{Error, Result};
pub use import::Import;
pub use mutator::TableMutator;
pub use store::Store;
pub use version::{DiffAction, DiffRow};

#[cfg(test)]
mod tests;
