//! The connection-owning facade over the catalog, topology, DDL, import,
//! and version modules.

use strata_core::{
  column::Column,
  permission::PermissionSet,
  relation::Schema,
  row::Row,
  table::{Table, UserId},
  version::Version,
};
use tokio_postgres::{Client, NoTls};

use crate::{
  Error, Result, catalog, ddl,
  encode::{self, Value},
  import::Import,
  topology,
  version::{self, DiffRow},
};

/// One database connection plus the installation's official SRID, the
/// projection every stored geometry is transformed into.
pub struct Store {
  client:        Client,
  official_srid: i32,
}

impl Store {
  /// Connect and spawn the connection driver task.
  pub async fn connect(config: &str, official_srid: i32) -> Result<Store> {
    let (client, connection) = tokio_postgres::connect(config, NoTls).await?;
    tokio::spawn(async move {
      if let Err(error) = connection.await {
        tracing::error!(%error, "database connection closed");
      }
    });
    Ok(Store { client, official_srid })
  }

  /// Run the idempotent catalog bootstrap.
  pub async fn init(&self) -> Result<()> { catalog::init(&self.client).await }

  pub fn client(&self) -> &Client { &self.client }

  pub fn official_srid(&self) -> i32 { self.official_srid }

  // ─── Topology ──────────────────────────────────────────────────────────────

  pub async fn topology(&self, owner: Option<UserId>) -> Result<Vec<Schema>> {
    topology::get_topology(&self.client, owner).await
  }

  pub async fn columns_for_table(
    &self,
    schema: &str,
    table: &str,
  ) -> Result<Vec<Column>> {
    topology::columns_for_table(&self.client, schema, table).await
  }

  pub async fn primary_keys_for_table(
    &self,
    schema: &str,
    table: &str,
  ) -> Result<Vec<Column>> {
    topology::primary_keys_for_table(&self.client, schema, table).await
  }

  /// The current live rows, decoded to typed values.
  pub async fn rows(
    &self,
    schema: &str,
    table: &str,
  ) -> Result<Vec<Vec<Value>>> {
    let columns = self.columns_for_table(schema, table).await?;
    topology::fetch_rows_typed(&self.client, schema, table, &columns).await
  }

  // ─── DDL & catalog ─────────────────────────────────────────────────────────

  pub async fn create_schema(&self, name: &str) -> Result<()> {
    ddl::create_schema(&self.client, name).await
  }

  /// Register and materialise a table and its audit twin in one
  /// transaction. The catalog record stays unstamped until the first
  /// import succeeds.
  pub async fn create_table(
    &mut self,
    schema: &str,
    name: &str,
    columns: &[Column],
    owner: UserId,
  ) -> Result<Table> {
    let tx = self.client.transaction().await?;
    let table = catalog::register_table(&tx, schema, name, owner).await?;
    ddl::create_table(&tx, schema, name, columns, self.official_srid).await?;
    tx.commit().await?;
    Ok(table)
  }

  pub async fn get_table(&self, schema: &str, name: &str) -> Result<Table> {
    catalog::get_table(&self.client, schema, name).await
  }

  pub async fn versions(&self, table: &Table) -> Result<Vec<Version>> {
    catalog::versions_for_table(&self.client, table.table_id).await
  }

  // ─── Permissions ───────────────────────────────────────────────────────────

  pub async fn grant(
    &self,
    table: &Table,
    user: UserId,
    bits: PermissionSet,
  ) -> Result<()> {
    catalog::grant(&self.client, table.table_id, user, bits).await
  }

  pub async fn revoke(
    &self,
    table: &Table,
    user: UserId,
    bits: PermissionSet,
  ) -> Result<()> {
    catalog::revoke(&self.client, table.table_id, user, bits).await
  }

  pub async fn permission_for(
    &self,
    table: &Table,
    user: UserId,
  ) -> Result<PermissionSet> {
    catalog::permission_for(&self.client, table.table_id, user).await
  }

  pub async fn can_insert(
    &self,
    table: &Table,
    user: UserId,
  ) -> Result<bool> {
    catalog::can_insert(&self.client, table, user).await
  }

  pub async fn can_update(
    &self,
    table: &Table,
    user: UserId,
  ) -> Result<bool> {
    catalog::can_update(&self.client, table, user).await
  }

  pub async fn can_delete(
    &self,
    table: &Table,
    user: UserId,
  ) -> Result<bool> {
    catalog::can_delete(&self.client, table, user).await
  }

  pub async fn can_restore(
    &self,
    table: &Table,
    user: UserId,
  ) -> Result<bool> {
    catalog::can_restore(&self.client, table, user).await
  }

  // ─── Mutation ──────────────────────────────────────────────────────────────

  /// Run a planned import. See [`Import`].
  pub async fn import(
    &mut self,
    import: &Import,
    rows: Vec<Vec<String>>,
  ) -> Result<Version> {
    import.run(&mut self.client, rows, self.official_srid).await
  }

  /// Rewrite the live table to match `version`. Requires the full
  /// insert/update/delete conjunction.
  pub async fn restore(
    &mut self,
    table: &Table,
    version: &Version,
    user: UserId,
  ) -> Result<Version> {
    if !catalog::can_restore(&self.client, table, user).await? {
      return Err(Error::PermissionDenied {
        user,
        action: "restore",
        schema: table.schema.clone(),
        table: table.name.clone(),
      });
    }

    let tx = self.client.transaction().await?;
    let new_version =
      version::restore(&tx, version, table, user, self.official_srid).await?;
    tx.commit().await?;
    Ok(new_version)
  }

  // ─── History ───────────────────────────────────────────────────────────────

  pub async fn diff(
    &self,
    table: &Table,
    version: &Version,
  ) -> Result<Vec<DiffRow>> {
    let columns = self.columns_for_table(&table.schema, &table.name).await?;
    version::diff(&self.client, version, table, &columns).await
  }

  /// The table's contents as of `version`, decoded to typed values.
  pub async fn rows_at(
    &self,
    table: &Table,
    version: &Version,
  ) -> Result<Vec<Vec<Value>>> {
    let columns = self.columns_for_table(&table.schema, &table.name).await?;
    let rows: Vec<Row> =
      version::rows_at(&self.client, version, table, &columns).await?;
    rows
      .iter()
      .map(|row| encode::decode_row(row, &columns))
      .collect()
  }
}
