//! DDL synthesis for user tables and their audit twins.
//!
//! A created table always comes in pairs: the live table in the user's
//! schema and an audit table in [`AUDIT_SCHEMA`] carrying the same columns
//! plus `_version_id` and `_inserted_or_deleted`. Geometry columns are not
//! part of the CREATE TABLE; they are attached afterwards through
//! `AddGeometryColumn` so PostGIS registers them in `geometry_columns`.

use strata_core::{
  Error as CoreError,
  column::{Column, ColumnType},
  ident::{internal_sanitize, is_sane_name},
};
use tokio_postgres::GenericClient;

use crate::{Error, Result, catalog::AUDIT_SCHEMA};

pub async fn create_schema(
  client: &impl GenericClient,
  name: &str,
) -> Result<()> {
  if !is_sane_name(name) {
    return Err(CoreError::InvalidIdentifier(name.to_owned()).into());
  }
  client
    .execute(format!("CREATE SCHEMA \"{name}\"").as_str(), &[])
    .await?;
  Ok(())
}

fn check_names(schema: &str, table: &str, columns: &[Column]) -> Result<()> {
  for name in [schema, table].into_iter().chain(columns.iter().map(|c| c.name.as_str()))
  {
    if !is_sane_name(name) {
      return Err(CoreError::InvalidIdentifier(name.to_owned()).into());
    }
  }
  if !columns.iter().any(|c| c.is_pk) {
    return Err(CoreError::MissingPrimaryKey.into());
  }
  Ok(())
}

fn column_defs(columns: &[Column]) -> Vec<String> {
  columns
    .iter()
    .filter(|c| c.ty != ColumnType::Geometry)
    .map(|c| format!("\"{}\" {}", c.name, c.ty.pg_type()))
    .collect()
}

fn pk_names(columns: &[Column]) -> Vec<String> {
  columns
    .iter()
    .filter(|c| c.is_pk)
    .map(|c| format!("\"{}\"", c.name))
    .collect()
}

pub(crate) fn live_table_sql(
  schema: &str,
  table: &str,
  columns: &[Column],
) -> String {
  format!(
    "CREATE TABLE \"{schema}\".\"{table}\" ({})",
    column_defs(columns).join(", "),
  )
}

pub(crate) fn live_pk_sql(
  schema: &str,
  table: &str,
  columns: &[Column],
) -> String {
  format!(
    "ALTER TABLE \"{schema}\".\"{table}\" ADD PRIMARY KEY ({})",
    pk_names(columns).join(", "),
  )
}

/// The audit twin: same columns, plus the version linkage. The foreign key
/// is deferrable so audit rows can reference a version created in the same
/// transaction regardless of statement order.
pub(crate) fn audit_table_sql(audit_table: &str, columns: &[Column]) -> String {
  let mut defs = column_defs(columns);
  defs.push(
    "\"_version_id\" INTEGER NOT NULL REFERENCES version (version_id) \
     DEFERRABLE INITIALLY DEFERRED"
      .to_owned(),
  );
  defs.push("\"_inserted_or_deleted\" smallint".to_owned());

  format!(
    "CREATE TABLE \"{AUDIT_SCHEMA}\".\"{audit_table}\" ({})",
    defs.join(", "),
  )
}

/// The audit primary key widens the base key with the version linkage, so
/// one live row can appear once per version per direction.
pub(crate) fn audit_pk_sql(audit_table: &str, columns: &[Column]) -> String {
  let mut pks = pk_names(columns);
  pks.push("\"_version_id\"".to_owned());
  pks.push("\"_inserted_or_deleted\"".to_owned());

  format!(
    "ALTER TABLE \"{AUDIT_SCHEMA}\".\"{audit_table}\" ADD PRIMARY KEY ({})",
    pks.join(", "),
  )
}

async fn add_geometry_column(
  client: &impl GenericClient,
  schema: &str,
  table: &str,
  column: &Column,
  official_srid: i32,
) -> Result<()> {
  let kind = column
    .geom_kind
    .map(|k| k.pg_name())
    .unwrap_or("GEOMETRY");
  client
    .execute(
      "SELECT AddGeometryColumn($1, $2, $3, $4, $5, 2)",
      &[&schema, &table, &column.name.as_str(), &official_srid, &kind],
    )
    .await?;
  Ok(())
}

/// Create the live table and its audit twin. Runs inside the caller's
/// transaction; the catalog record is managed separately.
pub async fn create_table(
  client: &impl GenericClient,
  schema: &str,
  table: &str,
  columns: &[Column],
  official_srid: i32,
) -> Result<()> {
  check_names(schema, table, columns)?;
  let audit_table = internal_sanitize(&format!("_{schema}_{table}"));

  for statement in [
    live_table_sql(schema, table, columns),
    audit_table_sql(&audit_table, columns),
    live_pk_sql(schema, table, columns),
    audit_pk_sql(&audit_table, columns),
  ] {
    client
      .execute(statement.as_str(), &[])
      .await
      .map_err(|source| Error::Sql { statement, source })?;
  }

  // Geometry columns are stored in the official projection no matter what
  // SRID the rows arrive in.
  for column in columns.iter().filter(|c| c.ty == ColumnType::Geometry) {
    add_geometry_column(client, schema, table, column, official_srid).await?;
    add_geometry_column(client, AUDIT_SCHEMA, &audit_table, column, official_srid)
      .await?;
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use strata_core::column::GeometryKind;

  fn parcel_columns() -> Vec<Column> {
    vec![
      Column::new("gid", ColumnType::Integer, true),
      Column::new("addr", ColumnType::Char, false),
      Column::geometry("geom", 2263, GeometryKind::MultiPolygon),
    ]
  }

  #[test]
  fn live_table_omits_geometry_columns() {
    let sql = live_table_sql("city", "parcels", &parcel_columns());
    assert_eq!(
      sql,
      "CREATE TABLE \"city\".\"parcels\" (\"gid\" integer, \"addr\" text)"
    );
  }

  #[test]
  fn audit_table_appends_version_linkage() {
    let sql = audit_table_sql("_city_parcels", &parcel_columns());
    assert!(sql.starts_with("CREATE TABLE \"_version\".\"_city_parcels\" ("));
    assert!(sql.contains(
      "\"_version_id\" INTEGER NOT NULL REFERENCES version (version_id) \
       DEFERRABLE INITIALLY DEFERRED"
    ));
    assert!(sql.contains("\"_inserted_or_deleted\" smallint"));
  }

  #[test]
  fn audit_primary_key_widens_base_key() {
    let sql = audit_pk_sql("_city_parcels", &parcel_columns());
    assert_eq!(
      sql,
      "ALTER TABLE \"_version\".\"_city_parcels\" ADD PRIMARY KEY \
       (\"gid\", \"_version_id\", \"_inserted_or_deleted\")"
    );
  }

  #[test]
  fn names_are_validated_before_any_sql() {
    let mut columns = parcel_columns();
    columns[1].name = "bad name".into();
    assert!(check_names("city", "parcels", &columns).is_err());
    assert!(check_names("city", "Parcels", &parcel_columns()).is_err());
  }

  #[test]
  fn a_primary_key_is_required() {
    let columns = vec![Column::new("x", ColumnType::Integer, false)];
    assert!(matches!(
      check_names("city", "t", &columns),
      Err(Error::Core(CoreError::MissingPrimaryKey))
    ));
  }
}
