//! Error type for `strata-pg`.

use strata_core::{column::ColumnType, table::UserId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A validation error detected before any SQL executed.
  #[error(transparent)]
  Core(#[from] strata_core::Error),

  /// A database error with no statement context (connection setup,
  /// catalog bootstrap, topology introspection).
  #[error("database error: {0}")]
  Database(#[from] tokio_postgres::Error),

  /// A database error annotated with the statement that caused it.
  #[error("database error: {source}. SQL was: {statement}")]
  Sql {
    statement: String,
    source:    tokio_postgres::Error,
  },

  /// A row-level failure during an import, with the 1-based line number.
  #[error("tried to {operation} line {line} of the data: {source}")]
  Import {
    operation: &'static str,
    line:      usize,
    source:    Box<Error>,
  },

  /// A failure while clearing existing rows ahead of a replace import,
  /// before any uploaded row was touched.
  #[error("tried to delete all existing rows: {source}")]
  ReplaceClear { source: Box<Error> },

  #[error("{user} may not {action} on \"{schema}\".\"{table}\"")]
  PermissionDenied {
    user:   UserId,
    action: &'static str,
    schema: String,
    table:  String,
  },

  #[error("no table \"{schema}\".\"{name}\" is registered")]
  TableNotFound { schema: String, name: String },

  /// The version belongs to a different table than the one being diffed
  /// or restored.
  #[error("version {version_id} does not belong to table {table_id}")]
  VersionTableMismatch { version_id: i32, table_id: i32 },

  /// The target table has no primary key, so keyed deletes are impossible.
  #[error("table \"{schema}\".\"{table}\" has no primary key")]
  NoPrimaryKey { schema: String, table: String },

  /// A result cell could not be decoded as its column's type.
  #[error("cannot decode {value:?} as {ty:?}")]
  Decode { value: String, ty: ColumnType },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
