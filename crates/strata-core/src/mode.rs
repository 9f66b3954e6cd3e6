//! The import operation kind.

use serde::{Deserialize, Serialize};

/// How an upload mutates its target table. Modes are mutually exclusive
/// per upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportMode {
  /// Create a new table, then insert every row.
  Create,
  /// Insert every row into an existing table.
  Append,
  /// Per row: delete by primary key, then insert the full row.
  Upsert,
  /// Per row: delete by primary key only. The upload carries just the
  /// primary-key columns.
  Delete,
  /// Delete every existing row first, then insert every row.
  Replace,
}

impl ImportMode {
  /// Whether each uploaded row is inserted.
  pub fn inserts(self) -> bool {
    matches!(self, Self::Create | Self::Append | Self::Upsert | Self::Replace)
  }

  /// Whether each uploaded row triggers a keyed delete. Replace clears the
  /// table up front instead of deleting per row.
  pub fn deletes(self) -> bool {
    matches!(self, Self::Upsert | Self::Delete)
  }

  pub fn label(self) -> &'static str {
    match self {
      Self::Create => "create a new table",
      Self::Append => "append to an existing table",
      Self::Upsert => "append to or update an existing table",
      Self::Delete => "delete rows from an existing table",
      Self::Replace => "delete all existing rows and insert new ones",
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn dispatch_table() {
    use ImportMode::*;
    assert!(Create.inserts() && !Create.deletes());
    assert!(Append.inserts() && !Append.deletes());
    assert!(Upsert.inserts() && Upsert.deletes());
    assert!(!Delete.inserts() && Delete.deletes());
    assert!(Replace.inserts() && !Replace.deletes());
  }
}
