//! The import pipeline: one batch of uploaded rows becomes one version.
//!
//! Validation and permission checks run before any SQL touches the table.
//! The batch itself is a single transaction around a fresh version and a
//! [`TableMutator`] bound to it, so a failure at row 40,000 leaves no trace
//! of rows 1 through 39,999.

use strata_core::{
  Error as CoreError,
  column::Column,
  mode::ImportMode,
  permission::PermissionSet,
  row::{ColumnIndexMap, normalize},
  table::{Table, UserId},
  version::Version,
};
use tokio_postgres::{Client, GenericClient};

use crate::{Error, Result, catalog, mutator::TableMutator, topology};

/// A planned import of uploaded rows into an existing registered table.
/// `map` translates table column names to positions in the uploaded rows.
pub struct Import {
  pub mode:  ImportMode,
  pub table: Table,
  pub user:  UserId,
  pub map:   ColumnIndexMap,
}

/// The grants a mode requires, with the action name used in denials.
pub(crate) fn required_permissions(
  mode: ImportMode,
) -> Vec<(PermissionSet, &'static str)> {
  let mut needed = Vec::new();
  if mode.inserts() {
    needed.push((PermissionSet::INSERT, "insert"));
  }
  if mode == ImportMode::Upsert {
    needed.push((PermissionSet::UPDATE, "update"));
  }
  if matches!(mode, ImportMode::Delete | ImportMode::Replace) {
    needed.push((PermissionSet::DELETE, "delete"));
  }
  needed
}

/// Column-count validation: deletes upload only key columns, everything
/// else uploads the full width of the table.
pub(crate) fn validate_shape(
  mode: ImportMode,
  map: &ColumnIndexMap,
  columns: &[Column],
) -> Result<()> {
  let pk_count = columns.iter().filter(|c| c.is_pk).count();
  if mode == ImportMode::Delete {
    if map.len() != pk_count {
      return Err(
        CoreError::PrimaryKeyCountMismatch {
          expected: pk_count,
          got:      map.len(),
        }
        .into(),
      );
    }
  } else if map.len() != columns.len() {
    return Err(
      CoreError::ColumnCountMismatch {
        expected: columns.len(),
        got:      map.len(),
      }
      .into(),
    );
  }
  Ok(())
}

fn at_line(
  operation: &'static str,
  line: usize,
) -> impl FnOnce(Error) -> Error {
  move |source| Error::Import { operation, line, source: Box::new(source) }
}

impl Import {
  async fn check_permissions(
    &self,
    client: &impl GenericClient,
  ) -> Result<()> {
    for (bits, action) in required_permissions(self.mode) {
      if !catalog::can_do(client, &self.table, self.user, bits).await? {
        return Err(Error::PermissionDenied {
          user: self.user,
          action,
          schema: self.table.schema.clone(),
          table: self.table.name.clone(),
        });
      }
    }
    Ok(())
  }

  /// Run the import. Returns the version the batch was recorded under.
  pub async fn run(
    &self,
    client: &mut Client,
    rows: Vec<Vec<String>>,
    official_srid: i32,
  ) -> Result<Version> {
    self.check_permissions(client).await?;

    let columns = topology::columns_for_table(
      client,
      &self.table.schema,
      &self.table.name,
    )
    .await?;
    validate_shape(self.mode, &self.map, &columns)?;

    let column_names: Vec<&str> =
      columns.iter().map(|c| c.name.as_str()).collect();
    let pk_names: Vec<&str> = columns
      .iter()
      .filter(|c| c.is_pk)
      .map(|c| c.name.as_str())
      .collect();

    let row_count = rows.len();
    let tx = client.transaction().await?;
    let version =
      catalog::create_version(&tx, self.user, self.table.table_id).await?;
    let tm = TableMutator::new(
      &tx,
      &version,
      &self.table,
      Some(columns.clone()),
      official_srid,
    )
    .await?;

    if self.mode == ImportMode::Replace {
      tm.delete_all_rows()
        .await
        .map_err(|source| Error::ReplaceClear { source: Box::new(source) })?;
    }

    for (i, raw) in rows.into_iter().enumerate() {
      let line = i + 1;
      let row = normalize(raw);

      if self.mode.deletes() {
        let key = self
          .map
          .project(&row, pk_names.iter().copied())
          .map_err(Error::from)
          .map_err(at_line("delete", line))?;
        tm.delete_row(&key).await.map_err(at_line("delete", line))?;
      }
      if self.mode.inserts() {
        let full = self
          .map
          .project(&row, column_names.iter().copied())
          .map_err(Error::from)
          .map_err(at_line("insert", line))?;
        tm.insert_row(&full).await.map_err(at_line("insert", line))?;
      }
    }

    if self.mode == ImportMode::Create {
      catalog::mark_created(&tx, self.table.table_id).await?;
    }
    tx.commit().await?;

    tracing::info!(
      schema = %self.table.schema,
      table = %self.table.name,
      mode = self.mode.label(),
      version_id = version.version_id,
      rows = row_count,
      "import committed"
    );
    Ok(version)
  }
}
