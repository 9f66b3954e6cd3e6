//! Paired live/audit row mutation.
//!
//! A [`TableMutator`] is scoped to one version and one transaction. It
//! prepares four statements up front and then replays them per row: every
//! insert lands in the live table and the audit table (`+1`), every delete
//! removes from the live table and leaves a keyed tombstone in the audit
//! table (`-1`). Committing the transaction makes the version and its audit
//! rows visible atomically.
//!
//! Parameters are always sent as text and cast server-side, so one codec
//! covers every column type, geometry included.

use strata_core::{
  column::{Column, ColumnType},
  row::Row,
  table::Table,
  version::Version,
};
use tokio_postgres::{
  Statement, Transaction,
  types::{ToSql, Type},
};

use crate::{Error, Result, catalog::AUDIT_SCHEMA, topology};

pub struct TableMutator<'a> {
  tx:      &'a Transaction<'a>,
  table:   Table,
  columns: Vec<Column>,

  insert:       Prepared,
  audit_insert: Prepared,
  // Absent when the table has no primary key; keyed deletes then fail
  // with `NoPrimaryKey` instead of deleting everything.
  delete:       Option<Prepared>,
  audit_delete: Option<Prepared>,
}

struct Prepared {
  sql:       String,
  statement: Statement,
}

impl Prepared {
  async fn new(tx: &Transaction<'_>, sql: String, params: usize) -> Result<Self> {
    let types = vec![Type::TEXT; params];
    let statement = tx
      .prepare_typed(&sql, &types)
      .await
      .map_err(|source| Error::Sql { statement: sql.clone(), source })?;
    Ok(Self { sql, statement })
  }

  async fn execute(
    &self,
    tx: &Transaction<'_>,
    row: &Row,
  ) -> Result<u64> {
    let params: Vec<&(dyn ToSql + Sync)> =
      row.iter().map(|cell| cell as &(dyn ToSql + Sync)).collect();
    tx.execute(&self.statement, &params).await.map_err(|source| Error::Sql {
      statement: self.sql.clone(),
      source,
    })
  }
}

/// The value expression for parameter `$n` of `column`. Geometry parses
/// the incoming WKT in its source projection, reprojects to the official
/// one, and promotes to the multi- variant so single and multi features
/// share a column.
pub(crate) fn value_expr(column: &Column, n: usize, official_srid: i32) -> String {
  match column.ty {
    ColumnType::Geometry => {
      let src_srid = column.srid.unwrap_or(official_srid);
      format!(
        "ST_Multi(ST_Transform(ST_GeomFromText(${n}, {src_srid}), {official_srid}))"
      )
    }
    _ => format!("${n}::{}", column.ty.pg_type()),
  }
}

fn quoted_names(columns: &[Column]) -> Vec<String> {
  columns.iter().map(|c| format!("\"{}\"", c.name)).collect()
}

fn pk_predicate(pks: &[&Column]) -> String {
  pks
    .iter()
    .enumerate()
    .map(|(i, c)| format!("\"{}\" = ${}::{}", c.name, i + 1, c.ty.pg_type()))
    .collect::<Vec<_>>()
    .join(" AND ")
}

pub(crate) fn insert_sql(
  table: &Table,
  columns: &[Column],
  official_srid: i32,
) -> String {
  let exprs: Vec<String> = columns
    .iter()
    .enumerate()
    .map(|(i, c)| value_expr(c, i + 1, official_srid))
    .collect();
  format!(
    "INSERT INTO \"{}\".\"{}\" ({}) VALUES ({})",
    table.schema,
    table.name,
    quoted_names(columns).join(", "),
    exprs.join(", "),
  )
}

pub(crate) fn audit_insert_sql(
  table: &Table,
  columns: &[Column],
  version_id: i32,
  official_srid: i32,
) -> String {
  let mut names = quoted_names(columns);
  names.push("\"_inserted_or_deleted\"".to_owned());
  names.push("\"_version_id\"".to_owned());

  let mut exprs: Vec<String> = columns
    .iter()
    .enumerate()
    .map(|(i, c)| value_expr(c, i + 1, official_srid))
    .collect();
  exprs.push("1".to_owned());
  exprs.push(version_id.to_string());

  format!(
    "INSERT INTO \"{AUDIT_SCHEMA}\".\"{}\" ({}) VALUES ({})",
    table.audit_table_name(),
    names.join(", "),
    exprs.join(", "),
  )
}

pub(crate) fn delete_sql(table: &Table, pks: &[&Column]) -> String {
  format!(
    "DELETE FROM \"{}\".\"{}\" WHERE {}",
    table.schema,
    table.name,
    pk_predicate(pks),
  )
}

/// Tombstone for a deleted row: only the key columns are recorded, the
/// rest stay NULL. The previous cell values live in the `+1` audit row of
/// whichever version inserted them.
pub(crate) fn audit_delete_sql(
  table: &Table,
  pks: &[&Column],
  version_id: i32,
) -> String {
  let mut names: Vec<String> =
    pks.iter().map(|c| format!("\"{}\"", c.name)).collect();
  names.push("\"_inserted_or_deleted\"".to_owned());
  names.push("\"_version_id\"".to_owned());

  let mut exprs: Vec<String> = pks
    .iter()
    .enumerate()
    .map(|(i, c)| format!("${}::{}", i + 1, c.ty.pg_type()))
    .collect();
  exprs.push("-1".to_owned());
  exprs.push(version_id.to_string());

  format!(
    "INSERT INTO \"{AUDIT_SCHEMA}\".\"{}\" ({}) VALUES ({})",
    table.audit_table_name(),
    names.join(", "),
    exprs.join(", "),
  )
}

impl<'a> TableMutator<'a> {
  /// Prepare all four statements for `table` under `version`. When
  /// `columns` is `None` the current live schema is introspected.
  pub async fn new(
    tx: &'a Transaction<'a>,
    version: &Version,
    table: &Table,
    columns: Option<Vec<Column>>,
    official_srid: i32,
  ) -> Result<TableMutator<'a>> {
    let columns = match columns {
      Some(columns) => columns,
      None => {
        topology::columns_for_table(tx, &table.schema, &table.name).await?
      }
    };
    let pks: Vec<&Column> = columns.iter().filter(|c| c.is_pk).collect();

    tracing::debug!(
      schema = %table.schema,
      table = %table.name,
      version_id = version.version_id,
      columns = columns.len(),
      "preparing table mutator"
    );

    let insert = Prepared::new(
      tx,
      insert_sql(table, &columns, official_srid),
      columns.len(),
    )
    .await?;
    let audit_insert = Prepared::new(
      tx,
      audit_insert_sql(table, &columns, version.version_id, official_srid),
      columns.len(),
    )
    .await?;

    let (delete, audit_delete) = if pks.is_empty() {
      (None, None)
    } else {
      let delete =
        Prepared::new(tx, delete_sql(table, &pks), pks.len()).await?;
      let audit_delete = Prepared::new(
        tx,
        audit_delete_sql(table, &pks, version.version_id),
        pks.len(),
      )
      .await?;
      (Some(delete), Some(audit_delete))
    };

    Ok(TableMutator {
      tx,
      table: table.clone(),
      columns,
      insert,
      audit_insert,
      delete,
      audit_delete,
    })
  }

  /// The columns this mutator writes, in statement order.
  pub fn columns(&self) -> &[Column] { &self.columns }

  /// Insert one row into the live table and its `+1` audit twin.
  pub async fn insert_row(&self, row: &Row) -> Result<()> {
    self.insert.execute(self.tx, row).await?;
    self.audit_insert.execute(self.tx, row).await?;
    Ok(())
  }

  fn keyed(&self) -> Result<(&Prepared, &Prepared)> {
    match (&self.delete, &self.audit_delete) {
      (Some(delete), Some(audit)) => Ok((delete, audit)),
      _ => Err(Error::NoPrimaryKey {
        schema: self.table.schema.clone(),
        table:  self.table.name.clone(),
      }),
    }
  }

  /// Delete the row keyed by `pk_values`. The tombstone is only recorded
  /// when a live row was actually removed, so deleting an absent row is a
  /// no-op in the audit trail too. Returns the number of live rows removed.
  pub async fn delete_row(&self, pk_values: &Row) -> Result<u64> {
    let (delete, audit) = self.keyed()?;
    let affected = delete.execute(self.tx, pk_values).await?;
    if affected > 0 {
      audit.execute(self.tx, pk_values).await?;
    }
    Ok(affected)
  }

  /// Delete every live row, one keyed delete per row so each lands in the
  /// audit table.
  pub async fn delete_all_rows(&self) -> Result<u64> {
    self.keyed()?;
    let pk_columns: Vec<Column> =
      self.columns.iter().filter(|c| c.is_pk).cloned().collect();
    let keys = topology::fetch_rows_for(
      self.tx,
      &self.table.schema,
      &self.table.name,
      &pk_columns,
    )
    .await?;

    let mut deleted = 0;
    for key in &keys {
      deleted += self.delete_row(key).await?;
    }
    Ok(deleted)
  }
}

#[cfg(test)]
mod sql_tests {
  use super::*;
  use strata_core::{column::GeometryKind, table::UserId};

  fn table() -> Table {
    Table {
      table_id:   7,
      schema:     "city".into(),
      name:       "parcels".into(),
      created_on: None,
      owner:      UserId(1),
    }
  }

  fn columns() -> Vec<Column> {
    vec![
      Column::new("gid", ColumnType::Integer, true),
      Column::new("addr", ColumnType::Char, false),
      Column::geometry("geom", 4326, GeometryKind::MultiPolygon),
    ]
  }

  #[test]
  fn insert_casts_params_and_reprojects_geometry() {
    let sql = insert_sql(&table(), &columns(), 2263);
    assert_eq!(
      sql,
      "INSERT INTO \"city\".\"parcels\" (\"gid\", \"addr\", \"geom\") VALUES \
       ($1::integer, $2::text, \
       ST_Multi(ST_Transform(ST_GeomFromText($3, 4326), 2263)))"
    );
  }

  #[test]
  fn audit_insert_appends_direction_and_version_literal() {
    let sql = audit_insert_sql(&table(), &columns(), 42, 2263);
    assert!(sql.starts_with("INSERT INTO \"_version\".\"_city_parcels\" ("));
    assert!(sql.contains("\"_inserted_or_deleted\", \"_version_id\""));
    assert!(sql.ends_with(", 1, 42)"));
  }

  #[test]
  fn delete_filters_on_typed_primary_keys() {
    let columns = columns();
    let pks: Vec<&Column> = columns.iter().filter(|c| c.is_pk).collect();
    assert_eq!(
      delete_sql(&table(), &pks),
      "DELETE FROM \"city\".\"parcels\" WHERE \"gid\" = $1::integer"
    );
  }

  #[test]
  fn audit_delete_records_a_keyed_tombstone() {
    let columns = columns();
    let pks: Vec<&Column> = columns.iter().filter(|c| c.is_pk).collect();
    let sql = audit_delete_sql(&table(), &pks, 42);
    assert_eq!(
      sql,
      "INSERT INTO \"_version\".\"_city_parcels\" \
       (\"gid\", \"_inserted_or_deleted\", \"_version_id\") \
       VALUES ($1::integer, -1, 42)"
    );
  }

  #[test]
  fn missing_srid_falls_back_to_the_official_one() {
    let mut geom = Column::geometry("geom", 0, GeometryKind::Point);
    geom.srid = None;
    assert_eq!(
      value_expr(&geom, 1, 2263),
      "ST_Multi(ST_Transform(ST_GeomFromText($1, 2263), 2263))"
    );
  }
}
