//! Live-database introspection: schemas → tables/views → columns.
//!
//! One ordered query feeds a single linear scan that builds the nested
//! topology, grouped by schema, then table, then column ordinal, with no
//! backtracking and no per-table follow-up queries. Nothing is cached
//! across operations; callers always see the current schema.

use std::collections::HashSet;

use strata_core::{
  column::{Column, ColumnType},
  ident::sanitize,
  relation::{Relation, RelationMeta, Schema},
  row::Row,
  table::UserId,
};
use tokio_postgres::GenericClient;

use crate::{Result, catalog::AUDIT_SCHEMA, encode::Value};

/// System-owned namespaces are excluded by owner oid; the audit schema by
/// name. `Find_SRID` only runs for geometry columns of non-views, where a
/// `geometry_columns` entry is guaranteed to exist.
const TOPOLOGY_SQL: &str = "
    SELECT
        nspname::text,
        t.table_name::text,
        t.table_type::text,
        c.column_name::text,
        CASE WHEN c.data_type = 'USER-DEFINED' THEN 'geometry'
             ELSE c.data_type END::text AS data_type,
        pks.constraint_type::text,
        CASE WHEN c.data_type = 'USER-DEFINED' AND t.table_type != 'VIEW'
             THEN Find_SRID(nspname::varchar, t.table_name::varchar, c.column_name::varchar)
             ELSE NULL END AS srid
    FROM
        pg_namespace
    LEFT JOIN
        information_schema.tables t ON t.table_schema = nspname::text
    LEFT JOIN
        information_schema.columns c
        ON c.table_schema = nspname::text AND t.table_name = c.table_name
    LEFT JOIN (
        SELECT
            tc.table_schema,
            tc.table_name,
            column_name,
            tc.constraint_type
        FROM
            information_schema.table_constraints AS tc
        INNER JOIN
            information_schema.key_column_usage AS kcu
        ON
            tc.constraint_name = kcu.constraint_name
            AND tc.table_schema = kcu.table_schema
            AND tc.table_name = kcu.table_name
        WHERE
            tc.constraint_type = 'PRIMARY KEY'
    ) pks ON pks.table_schema = nspname::text
         AND pks.table_name = t.table_name
         AND pks.column_name = c.column_name
    WHERE
        pg_namespace.nspowner != 10 AND
        nspname::text != $1
    ORDER BY
        nspname, table_name, c.ordinal_position
";

/// Introspect the whole database. When `owner` is given, relations
/// registered to that owner in the catalog are tagged with their owner.
pub async fn get_topology(
  client: &impl GenericClient,
  owner: Option<UserId>,
) -> Result<Vec<Schema>> {
  let rows = client.query(TOPOLOGY_SQL, &[&AUDIT_SCHEMA]).await?;

  let mut topology: Vec<Schema> = Vec::new();
  for row in rows {
    let schema_name: String = row.get(0);
    let table_name: Option<String> = row.get(1);
    let table_type: Option<String> = row.get(2);
    let column_name: Option<String> = row.get(3);
    let data_type: Option<String> = row.get(4);
    let constraint_type: Option<String> = row.get(5);
    let srid: Option<i32> = row.get(6);

    // Rows arrive grouped; a new schema name starts a new schema.
    if topology.last().map(|s| s.name.as_str()) != Some(&schema_name) {
      topology.push(Schema::new(schema_name));
    }
    let Some(schema) = topology.last_mut() else { continue };

    // An empty schema joins to all-NULL table columns.
    let Some(table_name) = table_name else { continue };

    let is_view = table_type.as_deref() == Some("VIEW");
    let starts_new_relation = match schema.relations.last() {
      Some(last) => last.name() != table_name || last.is_view() != is_view,
      None => true,
    };
    if starts_new_relation {
      let meta = RelationMeta::new(table_name);
      schema.relations.push(if is_view {
        Relation::View(meta)
      } else {
        Relation::Table(meta)
      });
    }
    let Some(relation) = schema.relations.last_mut() else { continue };

    // A table with no columns joins to a NULL column name.
    let Some(column_name) = column_name else { continue };

    let ty = data_type
      .as_deref()
      .map(ColumnType::from_pg_type_name)
      .unwrap_or(ColumnType::Char);
    relation.meta_mut().columns.push(Column {
      name: column_name,
      ty,
      is_pk: constraint_type.is_some(),
      srid,
      geom_kind: None,
    });
  }

  if let Some(owner) = owner {
    tag_owned_relations(client, &mut topology, owner).await?;
  }

  Ok(topology)
}

async fn tag_owned_relations(
  client: &impl GenericClient,
  topology: &mut [Schema],
  owner: UserId,
) -> Result<()> {
  let rows = client
    .query(
      r#"SELECT schema, name FROM "table" WHERE owner_id = $1"#,
      &[&owner.0],
    )
    .await?;
  let owned: HashSet<(String, String)> = rows
    .into_iter()
    .map(|row| (row.get(0), row.get(1)))
    .collect();

  for schema in topology {
    for relation in &mut schema.relations {
      let key = (schema.name.clone(), relation.name().to_owned());
      if owned.contains(&key) {
        relation.meta_mut().owner = Some(owner);
      }
    }
  }
  Ok(())
}

/// The columns of `schema.table`, in ordinal order. Empty when the table
/// does not exist.
pub async fn columns_for_table(
  client: &impl GenericClient,
  schema: &str,
  table: &str,
) -> Result<Vec<Column>> {
  let topology = get_topology(client, None).await?;
  Ok(
    topology
      .iter()
      .find(|s| s.name == schema)
      .and_then(|s| s.find_table(table))
      .map(|t| t.columns.clone())
      .unwrap_or_default(),
  )
}

/// The primary-key columns of `schema.table`.
pub async fn primary_keys_for_table(
  client: &impl GenericClient,
  schema: &str,
  table: &str,
) -> Result<Vec<Column>> {
  let mut columns = columns_for_table(client, schema, table).await?;
  columns.retain(|c| c.is_pk);
  Ok(columns)
}

/// Render one select-list expression for `column`, yielding text. Geometry
/// goes through `ST_AsText` so the value can be re-fed to the mutator's
/// `ST_GeomFromText` path.
pub(crate) fn text_expr(column: &Column) -> String {
  let name = sanitize(&column.name);
  match column.ty {
    ColumnType::Geometry => format!("ST_AsText(\"{name}\")"),
    _ => format!("\"{name}\"::text"),
  }
}

fn select_rows_sql(schema: &str, table: &str, columns: &[Column]) -> String {
  let select_list: Vec<String> = columns.iter().map(text_expr).collect();
  let pk_list: Vec<String> = columns
    .iter()
    .filter(|c| c.is_pk)
    .map(|c| format!("\"{}\"", sanitize(&c.name)))
    .collect();

  let mut sql = format!(
    "SELECT {} FROM \"{}\".\"{}\"",
    select_list.join(", "),
    sanitize(schema),
    sanitize(table),
  );
  if !pk_list.is_empty() {
    sql.push_str(" ORDER BY ");
    sql.push_str(&pk_list.join(", "));
  }
  sql
}

/// Fetch the current rows of `schema.table` projected onto `columns`, as
/// text cells in primary-key order.
pub async fn fetch_rows_for(
  client: &impl GenericClient,
  schema: &str,
  table: &str,
  columns: &[Column],
) -> Result<Vec<Row>> {
  let sql = select_rows_sql(schema, table, columns);
  let rows = client.query(sql.as_str(), &[]).await?;

  Ok(
    rows
      .into_iter()
      .map(|row| (0..columns.len()).map(|i| row.get(i)).collect())
      .collect(),
  )
}

/// Like [`fetch_rows_for`], decoded to typed values via the column types.
pub async fn fetch_rows_typed(
  client: &impl GenericClient,
  schema: &str,
  table: &str,
  columns: &[Column],
) -> Result<Vec<Vec<Value>>> {
  let rows = fetch_rows_for(client, schema, table, columns).await?;
  rows
    .into_iter()
    .map(|row| crate::encode::decode_row(&row, columns))
    .collect()
}
