//! Error types for `strata-core`.
//!
//! These are the validation errors: all of them are detectable before any
//! SQL executes, and none of them opens a transaction.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A schema, table, or column name that does not survive sanitisation.
  #[error("invalid identifier: {0:?}")]
  InvalidIdentifier(String),

  /// The upload's column count does not match the target table's.
  #[error(
    "column count mismatch: table has {expected} columns, upload has {got}"
  )]
  ColumnCountMismatch { expected: usize, got: usize },

  /// A delete upload must carry exactly one column per primary key.
  #[error(
    "primary key count mismatch: table has {expected} primary key \
     columns, upload has {got}"
  )]
  PrimaryKeyCountMismatch { expected: usize, got: usize },

  /// Create mode requires at least one primary key column.
  #[error("at least one primary key column is required")]
  MissingPrimaryKey,

  /// The caller's name→index map has no entry for a table column.
  #[error("upload has no column named {0:?}")]
  UnknownColumn(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
