//! Integration tests against a live database.
//!
//! These need `STRATA_TEST_DATABASE_URL` pointing at a database the test
//! role may create tables in; they return early when it is unset so the
//! suite still passes without one. Table names are unique per process and
//! test so runs do not collide.

use std::sync::atomic::{AtomicUsize, Ordering};

use strata_core::{
  column::{Column, ColumnType},
  mode::ImportMode,
  permission::PermissionSet,
  row::ColumnIndexMap,
  table::{Table, UserId},
};

use crate::{DiffAction, Import, Store, Value};

const OWNER: UserId = UserId(1);

static COUNTER: AtomicUsize = AtomicUsize::new(0);

fn unique_name(prefix: &str) -> String {
  format!(
    "{prefix}_{}_{}",
    std::process::id(),
    COUNTER.fetch_add(1, Ordering::Relaxed)
  )
}

async fn test_store() -> Option<Store> {
  let url = std::env::var("STRATA_TEST_DATABASE_URL").ok()?;
  // One subscriber for the whole test binary; later inits are no-ops.
  let _ = tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .with_test_writer()
    .try_init();
  let store = Store::connect(&url, 4326).await.expect("connect");
  store.init().await.expect("catalog bootstrap");
  Some(store)
}

fn scalar_columns() -> Vec<Column> {
  vec![
    Column::new("id", ColumnType::Integer, true),
    Column::new("name", ColumnType::Char, false),
    Column::new("score", ColumnType::Numeric, false),
  ]
}

fn plan(mode: ImportMode, table: &Table, columns: &[Column]) -> Import {
  Import {
    mode,
    table: table.clone(),
    user: table.owner,
    map: ColumnIndexMap::identity(columns),
  }
}

fn row(cells: &[&str]) -> Vec<String> {
  cells.iter().map(|c| (*c).to_string()).collect()
}

/// Create a fresh table in `public` and run a CREATE import of `rows`.
async fn create_and_fill(
  store: &mut Store,
  rows: Vec<Vec<String>>,
) -> Table {
  let columns = scalar_columns();
  let name = unique_name("strata_test");
  let table = store
    .create_table("public", &name, &columns, OWNER)
    .await
    .expect("create table");
  store
    .import(&plan(ImportMode::Create, &table, &columns), rows)
    .await
    .expect("create import");
  table
}

async fn audit_row_count(store: &Store, table: &Table) -> i64 {
  let sql = format!(
    "SELECT COUNT(*) FROM \"_version\".\"{}\"",
    table.audit_table_name()
  );
  store
    .client()
    .query_one(sql.as_str(), &[])
    .await
    .expect("count audit rows")
    .get(0)
}

#[tokio::test]
async fn create_import_and_introspect() {
  let Some(mut store) = test_store().await else { return };

  let table = create_and_fill(
    &mut store,
    vec![row(&["1", "alice", "9.5"]), row(&["2", "bob", ""])],
  )
  .await;

  // The catalog record is stamped once the first import lands.
  let fetched = store.get_table("public", &table.name).await.unwrap();
  assert!(fetched.created_on.is_some());

  // Introspection sees the table with its primary key.
  let columns = store.columns_for_table("public", &table.name).await.unwrap();
  assert_eq!(columns.len(), 3);
  assert!(columns[0].is_pk);
  assert_eq!(columns[0].ty, ColumnType::Integer);
  assert_eq!(columns[2].ty, ColumnType::Numeric);

  // Empty cells landed as NULL, typed decoding works.
  let rows = store.rows("public", &table.name).await.unwrap();
  assert_eq!(rows.len(), 2);
  assert_eq!(rows[0][0], Value::Integer(1));
  assert_eq!(rows[0][2], Value::Numeric("9.5".parse().unwrap()));
  assert_eq!(rows[1][2], Value::Null);
}

#[tokio::test]
async fn upsert_rewrites_matching_rows_and_appends_new_ones() {
  let Some(mut store) = test_store().await else { return };

  let table = create_and_fill(
    &mut store,
    vec![row(&["1", "alice", "1"]), row(&["2", "bob", "2"])],
  )
  .await;

  let columns = scalar_columns();
  store
    .import(
      &plan(ImportMode::Upsert, &table, &columns),
      vec![row(&["2", "bob", "20"]), row(&["3", "carol", "3"])],
    )
    .await
    .unwrap();

  let rows = store.rows("public", &table.name).await.unwrap();
  assert_eq!(rows.len(), 3);
  assert_eq!(rows[1][2], Value::Numeric("20".parse().unwrap()));
  assert_eq!(rows[2][1], Value::Text("carol".into()));

  let versions = store.versions(&table).await.unwrap();
  assert_eq!(versions.len(), 2);
}

#[tokio::test]
async fn replace_clears_the_table_first() {
  let Some(mut store) = test_store().await else { return };

  let table = create_and_fill(
    &mut store,
    vec![row(&["1", "alice", "1"]), row(&["2", "bob", "2"])],
  )
  .await;

  let columns = scalar_columns();
  store
    .import(
      &plan(ImportMode::Replace, &table, &columns),
      vec![row(&["9", "zoe", "9"])],
    )
    .await
    .unwrap();

  let rows = store.rows("public", &table.name).await.unwrap();
  assert_eq!(rows.len(), 1);
  assert_eq!(rows[0][0], Value::Integer(9));
}

#[tokio::test]
async fn deleting_an_absent_row_leaves_no_audit_trace() {
  let Some(mut store) = test_store().await else { return };

  let table =
    create_and_fill(&mut store, vec![row(&["1", "alice", "1"])]).await;
  let before = audit_row_count(&store, &table).await;

  let pk_only = vec![Column::new("id", ColumnType::Integer, true)];
  store
    .import(
      &plan(ImportMode::Delete, &table, &pk_only),
      vec![row(&["404"])],
    )
    .await
    .unwrap();

  assert_eq!(audit_row_count(&store, &table).await, before);
  assert_eq!(store.rows("public", &table.name).await.unwrap().len(), 1);
}

#[tokio::test]
async fn audit_records_every_insert_and_delete() {
  let Some(mut store) = test_store().await else { return };

  let table = create_and_fill(
    &mut store,
    vec![
      row(&["1", "a", "1"]),
      row(&["2", "b", "2"]),
      row(&["3", "c", "3"]),
    ],
  )
  .await;

  let pk_only = vec![Column::new("id", ColumnType::Integer, true)];
  store
    .import(
      &plan(ImportMode::Delete, &table, &pk_only),
      vec![row(&["1"]), row(&["3"])],
    )
    .await
    .unwrap();

  // 3 inserts and 2 tombstones.
  assert_eq!(audit_row_count(&store, &table).await, 5);
}

#[tokio::test]
async fn diff_classifies_inserts_updates_and_deletes() {
  let Some(mut store) = test_store().await else { return };

  let table = create_and_fill(
    &mut store,
    vec![row(&["1", "a", "1"]), row(&["2", "b", "2"])],
  )
  .await;

  let columns = scalar_columns();
  store
    .import(
      &plan(ImportMode::Upsert, &table, &columns),
      vec![row(&["2", "b", "22"]), row(&["3", "c", "3"])],
    )
    .await
    .unwrap();
  let pk_only = vec![Column::new("id", ColumnType::Integer, true)];
  store
    .import(
      &plan(ImportMode::Delete, &table, &pk_only),
      vec![row(&["1"])],
    )
    .await
    .unwrap();

  // Live now: {2 -> 22, 3}. At version 1: {1 -> 1, 2 -> 2}.
  let v1 = store.versions(&table).await.unwrap()[0].clone();
  let mut diff = store.diff(&table, &v1).await.unwrap();
  diff.sort_by(|a, b| a.pk_values.cmp(&b.pk_values));

  assert_eq!(diff.len(), 3);
  assert_eq!(diff[0].action, DiffAction::Insert);
  assert_eq!(diff[0].restore_to.as_ref().unwrap()[1], Some("a".into()));
  assert_eq!(diff[1].action, DiffAction::Update);
  assert_eq!(diff[1].restore_to.as_ref().unwrap()[2], Some("2".into()));
  assert_eq!(diff[1].live.as_ref().unwrap()[2], Some("22".into()));
  assert_eq!(diff[2].action, DiffAction::Delete);
  assert_eq!(diff[2].pk_values[0], Some("3".into()));
}

#[tokio::test]
async fn diff_rejects_a_version_from_another_table() {
  let Some(mut store) = test_store().await else { return };

  let table_a =
    create_and_fill(&mut store, vec![row(&["1", "a", "1"])]).await;
  let table_b =
    create_and_fill(&mut store, vec![row(&["1", "b", "2"])]).await;

  let foreign = store.versions(&table_b).await.unwrap()[0].clone();
  let err = store.diff(&table_a, &foreign).await.unwrap_err();
  assert!(matches!(err, crate::Error::VersionTableMismatch { .. }));
  assert!(store.restore(&table_a, &foreign, OWNER).await.is_err());
  assert!(store.rows_at(&table_a, &foreign).await.is_err());
}

#[tokio::test]
async fn restore_round_trips_to_the_old_contents() {
  let Some(mut store) = test_store().await else { return };

  let table = create_and_fill(
    &mut store,
    vec![row(&["1", "a", "1"]), row(&["2", "b", "2"])],
  )
  .await;

  let columns = scalar_columns();
  store
    .import(
      &plan(ImportMode::Replace, &table, &columns),
      vec![row(&["7", "x", "7"])],
    )
    .await
    .unwrap();

  let v1 = store.versions(&table).await.unwrap()[0].clone();
  let snapshot = store.rows_at(&table, &v1).await.unwrap();
  store.restore(&table, &v1, OWNER).await.unwrap();

  assert_eq!(store.rows("public", &table.name).await.unwrap(), snapshot);
  // The restore is itself a new version.
  assert_eq!(store.versions(&table).await.unwrap().len(), 3);
}

#[tokio::test]
async fn restore_requires_the_full_permission_conjunction() {
  let Some(mut store) = test_store().await else { return };

  let table =
    create_and_fill(&mut store, vec![row(&["1", "a", "1"])]).await;
  let v1 = store.versions(&table).await.unwrap()[0].clone();
  let other = UserId(OWNER.0 + 1000);

  assert!(store.restore(&table, &v1, other).await.is_err());

  store
    .grant(&table, other, PermissionSet::INSERT.grant(PermissionSet::UPDATE))
    .await
    .unwrap();
  assert!(!store.can_restore(&table, other).await.unwrap());
  assert!(store.restore(&table, &v1, other).await.is_err());

  store.grant(&table, other, PermissionSet::DELETE).await.unwrap();
  assert!(store.can_restore(&table, other).await.unwrap());
  store.restore(&table, &v1, other).await.unwrap();

  store.revoke(&table, other, PermissionSet::ALL).await.unwrap();
  assert_eq!(
    store.permission_for(&table, other).await.unwrap(),
    PermissionSet::NONE
  );
}

#[tokio::test]
async fn permission_denied_blocks_imports_for_strangers() {
  let Some(mut store) = test_store().await else { return };

  let table =
    create_and_fill(&mut store, vec![row(&["1", "a", "1"])]).await;
  let columns = scalar_columns();

  let mut import = plan(ImportMode::Append, &table, &columns);
  import.user = UserId(OWNER.0 + 2000);
  let err = store
    .import(&import, vec![row(&["2", "b", "2"])])
    .await
    .unwrap_err();
  assert!(matches!(err, crate::Error::PermissionDenied { .. }));
}

#[tokio::test]
async fn topology_lists_the_created_table() {
  let Some(mut store) = test_store().await else { return };

  let table =
    create_and_fill(&mut store, vec![row(&["1", "a", "1"])]).await;

  let topology = store.topology(Some(OWNER)).await.unwrap();
  let public = topology
    .iter()
    .find(|s| s.name == "public")
    .expect("public schema present");
  let found = public.find_table(&table.name).expect("table introspected");
  assert_eq!(found.columns.len(), 3);
  assert_eq!(found.primary_keys().count(), 1);
  assert_eq!(found.owner, Some(OWNER));

  // The audit schema never shows up in the topology.
  assert!(topology.iter().all(|s| s.name != "_version"));
}
