//! Catalog relations and operations: registered tables, versions, and
//! per-table permission grants.
//!
//! The catalog lives in the connection's default schema; user data lives in
//! its own schemas and audit rows in [`AUDIT_SCHEMA`]. Bootstrap DDL is
//! idempotent so it can run at every startup.

use strata_core::{
  permission::PermissionSet,
  table::{Table, UserId},
  version::Version,
};
use tokio_postgres::{Client, GenericClient};

use crate::{Error, Result};

/// The schema holding every audit table.
pub const AUDIT_SCHEMA: &str = "_version";

/// Catalog DDL; idempotent thanks to `IF NOT EXISTS`.
pub const CATALOG_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS "table" (
    table_id    SERIAL PRIMARY KEY,
    schema      VARCHAR(255) NOT NULL,
    name        VARCHAR(255) NOT NULL,
    created_on  TIMESTAMP WITH TIME ZONE,  -- NULL until materialised
    owner_id    INTEGER NOT NULL,
    UNIQUE (schema, name)
);

-- Versions are strictly append-only. No UPDATE or DELETE is ever issued
-- against this table.
CREATE TABLE IF NOT EXISTS version (
    version_id  SERIAL PRIMARY KEY,
    created_on  TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT now(),
    user_id     INTEGER NOT NULL,
    table_id    INTEGER NOT NULL REFERENCES "table" (table_id)
);

CREATE TABLE IF NOT EXISTS tablepermission (
    table_permission_id SERIAL PRIMARY KEY,
    table_id    INTEGER NOT NULL REFERENCES "table" (table_id),
    user_id     INTEGER NOT NULL,
    permission  INTEGER NOT NULL,
    UNIQUE (table_id, user_id)
);

CREATE SCHEMA IF NOT EXISTS _version;
"#;

pub async fn init(client: &Client) -> Result<()> {
  client.batch_execute(CATALOG_SCHEMA).await?;
  Ok(())
}

// ─── Tables ──────────────────────────────────────────────────────────────────

/// Register a table record. `created_on` stays NULL until the table is
/// materialised by DDL + import.
pub async fn register_table(
  client: &impl GenericClient,
  schema: &str,
  name: &str,
  owner: UserId,
) -> Result<Table> {
  let row = client
    .query_one(
      r#"INSERT INTO "table" (schema, name, owner_id)
         VALUES ($1, $2, $3) RETURNING table_id"#,
      &[&schema, &name, &owner.0],
    )
    .await?;

  Ok(Table {
    table_id: row.get(0),
    schema: schema.to_owned(),
    name: name.to_owned(),
    created_on: None,
    owner,
  })
}

pub async fn get_table(
  client: &impl GenericClient,
  schema: &str,
  name: &str,
) -> Result<Table> {
  let row = client
    .query_opt(
      r#"SELECT table_id, schema, name, created_on, owner_id
         FROM "table" WHERE schema = $1 AND name = $2"#,
      &[&schema, &name],
    )
    .await?
    .ok_or_else(|| Error::TableNotFound {
      schema: schema.to_owned(),
      name:   name.to_owned(),
    })?;

  Ok(Table {
    table_id:   row.get(0),
    schema:     row.get(1),
    name:       row.get(2),
    created_on: row.get(3),
    owner:      UserId(row.get(4)),
  })
}

/// Stamp the record as materialised. Returns the new timestamp.
pub async fn mark_created(
  client: &impl GenericClient,
  table_id: i32,
) -> Result<chrono::DateTime<chrono::Utc>> {
  let row = client
    .query_one(
      r#"UPDATE "table" SET created_on = now()
         WHERE table_id = $1 RETURNING created_on"#,
      &[&table_id],
    )
    .await?;
  Ok(row.get(0))
}

// ─── Versions ────────────────────────────────────────────────────────────────

/// Append a new version for `table_id`. Runs inside the caller's mutation
/// transaction so a failed batch never leaves a dangling version.
pub async fn create_version(
  client: &impl GenericClient,
  user: UserId,
  table_id: i32,
) -> Result<Version> {
  let row = client
    .query_one(
      "INSERT INTO version (user_id, table_id) VALUES ($1, $2)
       RETURNING version_id, created_on",
      &[&user.0, &table_id],
    )
    .await?;

  Ok(Version {
    version_id: row.get(0),
    created_on: row.get(1),
    user,
    table_id,
  })
}

/// The table's full version history, oldest first.
pub async fn versions_for_table(
  client: &impl GenericClient,
  table_id: i32,
) -> Result<Vec<Version>> {
  let rows = client
    .query(
      "SELECT version_id, created_on, user_id FROM version
       WHERE table_id = $1 ORDER BY created_on, version_id",
      &[&table_id],
    )
    .await?;

  Ok(
    rows
      .into_iter()
      .map(|row| Version {
        version_id: row.get(0),
        created_on: row.get(1),
        user:       UserId(row.get(2)),
        table_id,
      })
      .collect(),
  )
}

// ─── Permissions ─────────────────────────────────────────────────────────────

/// The grants `user` holds on `table_id`; absent row = none.
pub async fn permission_for(
  client: &impl GenericClient,
  table_id: i32,
  user: UserId,
) -> Result<PermissionSet> {
  let row = client
    .query_opt(
      "SELECT permission FROM tablepermission
       WHERE table_id = $1 AND user_id = $2",
      &[&table_id, &user.0],
    )
    .await?;

  Ok(match row {
    Some(row) => PermissionSet::from_bits(row.get(0)),
    None => PermissionSet::NONE,
  })
}

/// Owner always passes; everyone else needs every bit of `needed`.
pub async fn can_do(
  client: &impl GenericClient,
  table: &Table,
  user: UserId,
  needed: PermissionSet,
) -> Result<bool> {
  if table.owner == user {
    return Ok(true);
  }
  let held = permission_for(client, table.table_id, user).await?;
  Ok(held.contains(needed))
}

pub async fn can_insert(
  client: &impl GenericClient,
  table: &Table,
  user: UserId,
) -> Result<bool> {
  can_do(client, table, user, PermissionSet::INSERT).await
}

pub async fn can_update(
  client: &impl GenericClient,
  table: &Table,
  user: UserId,
) -> Result<bool> {
  can_do(client, table, user, PermissionSet::UPDATE).await
}

pub async fn can_delete(
  client: &impl GenericClient,
  table: &Table,
  user: UserId,
) -> Result<bool> {
  can_do(client, table, user, PermissionSet::DELETE).await
}

/// Restore is the conjunction of the insert, update, and delete grants,
/// not a separate one.
pub async fn can_restore(
  client: &impl GenericClient,
  table: &Table,
  user: UserId,
) -> Result<bool> {
  can_do(client, table, user, PermissionSet::ALL).await
}

/// Add `bits` to the user's grants, creating the row if needed.
pub async fn grant(
  client: &impl GenericClient,
  table_id: i32,
  user: UserId,
  bits: PermissionSet,
) -> Result<()> {
  client
    .execute(
      "INSERT INTO tablepermission (table_id, user_id, permission)
       VALUES ($1, $2, $3)
       ON CONFLICT (table_id, user_id)
       DO UPDATE SET permission = tablepermission.permission | EXCLUDED.permission",
      &[&table_id, &user.0, &bits.bits()],
    )
    .await?;
  Ok(())
}

/// Remove `bits` from the user's grants; a fully-revoked row is deleted.
pub async fn revoke(
  client: &impl GenericClient,
  table_id: i32,
  user: UserId,
  bits: PermissionSet,
) -> Result<()> {
  client
    .execute(
      "UPDATE tablepermission SET permission = permission & ~$3
       WHERE table_id = $1 AND user_id = $2",
      &[&table_id, &user.0, &bits.bits()],
    )
    .await?;
  client
    .execute(
      "DELETE FROM tablepermission
       WHERE table_id = $1 AND user_id = $2 AND permission = 0",
      &[&table_id, &user.0],
    )
    .await?;
  Ok(())
}
