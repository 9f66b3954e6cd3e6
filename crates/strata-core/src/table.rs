//! The catalog record for a user-owned mutable table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ident::internal_sanitize;

/// Opaque identity of a user, attributed by the excluded auth layer.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub struct UserId(pub i32);

impl std::fmt::Display for UserId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "user {}", self.0)
  }
}

/// One user-owned mutable relation, as registered in the catalog.
///
/// `created_on` stays `None` until the table is materialised in the
/// database; listings exclude unmaterialised records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
  pub table_id:   i32,
  pub schema:     String,
  pub name:       String,
  pub created_on: Option<DateTime<Utc>>,
  pub owner:      UserId,
}

impl Table {
  /// The name of this table's audit relation inside the audit schema:
  /// `_<schema>_<table>`.
  pub fn audit_table_name(&self) -> String {
    internal_sanitize(&format!("_{}_{}", self.schema, self.name))
  }
}
