//! Version arithmetic: diffing the live table against a historical
//! version, reconstructing snapshots, and restoring.
//!
//! Everything here is derived from the audit table alone. A row existed at
//! version `v` when the running sum of its `_inserted_or_deleted` column up
//! to `v` is positive; its cell values at `v` are those of its latest `+1`
//! audit row at or before `v`.

use strata_core::{
  column::{Column, ColumnType},
  row::Row,
  table::{Table, UserId},
  version::Version,
};
use tokio_postgres::{GenericClient, Transaction};

use crate::{
  Error, Result,
  catalog::{self, AUDIT_SCHEMA},
  mutator::TableMutator,
  topology,
};

/// What must be done to a live row to bring it back to the diffed version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffAction {
  Insert,
  Update,
  Delete,
}

impl DiffAction {
  fn parse(label: &str) -> Result<Self> {
    match label {
      "insert" => Ok(DiffAction::Insert),
      "update" => Ok(DiffAction::Update),
      "delete" => Ok(DiffAction::Delete),
      other => Err(Error::Decode {
        value: other.to_owned(),
        ty:    ColumnType::Char,
      }),
    }
  }
}

/// One row of a diff. `live` is absent for inserts (the row does not exist
/// yet), `restore_to` is absent for deletes (it must stop existing).
#[derive(Debug, Clone, PartialEq)]
pub struct DiffRow {
  pub live:       Option<Row>,
  pub restore_to: Option<Row>,
  pub pk_values:  Row,
  pub action:     DiffAction,
}

/// Versions are pinned to one table; operating on any other table's audit
/// log with them would silently produce garbage.
fn ensure_same_table(version: &Version, table: &Table) -> Result<()> {
  if version.table_id != table.table_id {
    return Err(Error::VersionTableMismatch {
      version_id: version.version_id,
      table_id:   table.table_id,
    });
  }
  Ok(())
}

fn quoted(name: &str) -> String { format!("\"{name}\"") }

fn qualified_text_expr(qualifier: &str, column: &Column) -> String {
  match column.ty {
    ColumnType::Geometry => {
      format!("ST_AsText({qualifier}.\"{}\")", column.name)
    }
    _ => format!("{qualifier}.\"{}\"::text", column.name),
  }
}

/// The reconstruction core shared by diff and snapshot: for each surviving
/// primary key, the latest `+1` audit row at or before the version.
fn restore_to_sql(table: &Table, columns: &[Column], pks: &str) -> String {
  let audit = format!("\"{AUDIT_SCHEMA}\".\"{}\"", table.audit_table_name());
  let audit_columns: Vec<String> = columns
    .iter()
    .map(|c| format!("{audit}.\"{}\"", c.name))
    .collect();

  format!(
    "SELECT {audit_columns} FROM
        (
            SELECT
                SUM(_inserted_or_deleted),
                MAX(_version_id) AS _version_id,
                {pks}
            FROM
                {audit}
            WHERE _version_id <= $1
            GROUP BY
                {pks}
            HAVING
                SUM(_inserted_or_deleted) >= 0
        ) pks
        INNER JOIN {audit} USING({pks}, _version_id)
        WHERE _inserted_or_deleted = 1",
    audit_columns = audit_columns.join(", "),
  )
}

pub(crate) fn diff_sql(table: &Table, columns: &[Column]) -> String {
  let live = format!("\"{}\".\"{}\"", table.schema, table.name);
  let pks: Vec<String> = columns
    .iter()
    .filter(|c| c.is_pk)
    .map(|c| quoted(&c.name))
    .collect();
  let pks = pks.join(", ");

  let live_columns: Vec<String> = columns
    .iter()
    .map(|c| qualified_text_expr(&live, c))
    .collect();
  let restore_columns: Vec<String> = columns
    .iter()
    .map(|c| qualified_text_expr("_restore_to", c))
    .collect();
  let pk_columns: Vec<String> = columns
    .iter()
    .filter(|c| c.is_pk)
    .map(|c| format!("\"{}\"::text", c.name))
    .collect();

  format!(
    "SELECT
        {live_columns},
        {restore_columns},
        {pk_columns},
        CASE WHEN _restore_to.* IS NULL THEN 'delete'
             WHEN {live}.* IS NULL THEN 'insert'
             ELSE 'update' END
    FROM
    (
        {restore_to}
    ) _restore_to
    FULL OUTER JOIN
    {live} USING({pks})
    WHERE COALESCE(_restore_to.* != {live}.*, true)",
    live_columns = live_columns.join(", "),
    restore_columns = restore_columns.join(", "),
    pk_columns = pk_columns.join(", "),
    restore_to = restore_to_sql(table, columns, &pks),
  )
}

pub(crate) fn rows_at_sql(table: &Table, columns: &[Column]) -> String {
  let pks: Vec<String> = columns
    .iter()
    .filter(|c| c.is_pk)
    .map(|c| quoted(&c.name))
    .collect();
  let pks = pks.join(", ");
  let audit = format!("\"{AUDIT_SCHEMA}\".\"{}\"", table.audit_table_name());

  let text_columns: Vec<String> = columns
    .iter()
    .map(|c| qualified_text_expr(&audit, c))
    .collect();

  format!(
    "SELECT {text_columns} FROM
        (
            SELECT
                SUM(_inserted_or_deleted),
                MAX(_version_id) AS _version_id,
                {pks}
            FROM
                {audit}
            WHERE _version_id <= $1
            GROUP BY
                {pks}
            HAVING
                SUM(_inserted_or_deleted) >= 0
        ) pks
        INNER JOIN {audit} USING({pks}, _version_id)
        WHERE _inserted_or_deleted = 1
        ORDER BY {pks}",
    text_columns = text_columns.join(", "),
  )
}

/// Compare `version` with the live table. Each returned row tells what to
/// do to the live table to make it match the version; rows that already
/// match are omitted.
pub async fn diff(
  client: &impl GenericClient,
  version: &Version,
  table: &Table,
  columns: &[Column],
) -> Result<Vec<DiffRow>> {
  ensure_same_table(version, table)?;
  let sql = diff_sql(table, columns);
  let rows = client
    .query(sql.as_str(), &[&version.version_id])
    .await
    .map_err(|source| Error::Sql { statement: sql.clone(), source })?;

  let n = columns.len();
  let n_pks = columns.iter().filter(|c| c.is_pk).count();
  let mut diff_rows = Vec::with_capacity(rows.len());
  for row in rows {
    let live: Row = (0..n).map(|i| row.get(i)).collect();
    let restore_to: Row = (n..2 * n).map(|i| row.get(i)).collect();
    let pk_values: Row = (2 * n..2 * n + n_pks).map(|i| row.get(i)).collect();
    let label: String = row.get(2 * n + n_pks);
    let action = DiffAction::parse(&label)?;

    diff_rows.push(DiffRow {
      live: (action != DiffAction::Insert).then_some(live),
      restore_to: (action != DiffAction::Delete).then_some(restore_to),
      pk_values,
      action,
    });
  }
  Ok(diff_rows)
}

/// The full contents of the table as of `version`, as text rows in
/// primary-key order.
pub async fn rows_at(
  client: &impl GenericClient,
  version: &Version,
  table: &Table,
  columns: &[Column],
) -> Result<Vec<Row>> {
  ensure_same_table(version, table)?;
  let sql = rows_at_sql(table, columns);
  let rows = client
    .query(sql.as_str(), &[&version.version_id])
    .await
    .map_err(|source| Error::Sql { statement: sql.clone(), source })?;

  Ok(
    rows
      .into_iter()
      .map(|row| (0..columns.len()).map(|i| row.get(i)).collect())
      .collect(),
  )
}

/// Rewrite the live table to match `version`, as a brand-new version. The
/// whole rewrite is one transaction; the new version records exactly the
/// rows that had to change.
pub async fn restore(
  tx: &Transaction<'_>,
  version: &Version,
  table: &Table,
  user: UserId,
  official_srid: i32,
) -> Result<Version> {
  ensure_same_table(version, table)?;
  let new_version = catalog::create_version(tx, user, table.table_id).await?;
  let columns =
    topology::columns_for_table(tx, &table.schema, &table.name).await?;
  let tm =
    TableMutator::new(tx, &new_version, table, Some(columns.clone()), official_srid)
      .await?;

  tracing::info!(
    schema = %table.schema,
    table = %table.name,
    from_version = version.version_id,
    new_version = new_version.version_id,
    "restoring table"
  );

  for row in diff(tx, version, table, &columns).await? {
    if matches!(row.action, DiffAction::Delete | DiffAction::Update) {
      tm.delete_row(&row.pk_values).await?;
    }
    if let Some(restore_to) = &row.restore_to {
      tm.insert_row(restore_to).await?;
    }
  }

  Ok(new_version)
}
