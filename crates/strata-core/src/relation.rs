//! The introspected database topology: schemas → tables/views → columns.
//!
//! A [`Relation`] is either a table or a view over the same metadata. The
//! serialized form keeps the `{name, columns, is_view}` shape the UI layer
//! expects.

use serde::{Serialize, ser::SerializeStruct};

use crate::{column::Column, table::UserId};

// ─── RelationMeta ────────────────────────────────────────────────────────────

/// Metadata shared by tables and views.
#[derive(Debug, Clone, Serialize)]
pub struct RelationMeta {
  pub name:    String,
  pub columns: Vec<Column>,
  /// Set when the topology was fetched for a specific owner and this
  /// relation is registered to them.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub owner:   Option<UserId>,
}

impl RelationMeta {
  pub fn new(name: impl Into<String>) -> Self {
    Self { name: name.into(), columns: Vec::new(), owner: None }
  }

  pub fn primary_keys(&self) -> impl Iterator<Item = &Column> {
    self.columns.iter().filter(|c| c.is_pk)
  }
}

// ─── Relation ────────────────────────────────────────────────────────────────

/// A relation inside a schema, discriminated by whether it is a view.
#[derive(Debug, Clone)]
pub enum Relation {
  Table(RelationMeta),
  View(RelationMeta),
}

impl Relation {
  pub fn meta(&self) -> &RelationMeta {
    match self {
      Self::Table(m) | Self::View(m) => m,
    }
  }

  pub fn meta_mut(&mut self) -> &mut RelationMeta {
    match self {
      Self::Table(m) | Self::View(m) => m,
    }
  }

  pub fn is_view(&self) -> bool { matches!(self, Self::View(_)) }

  pub fn name(&self) -> &str { &self.meta().name }

  pub fn columns(&self) -> &[Column] { &self.meta().columns }
}

impl Serialize for Relation {
  fn serialize<S: serde::Serializer>(
    &self,
    serializer: S,
  ) -> Result<S::Ok, S::Error> {
    let mut s = serializer.serialize_struct("Relation", 3)?;
    s.serialize_field("name", &self.meta().name)?;
    s.serialize_field("columns", &self.meta().columns)?;
    s.serialize_field("is_view", &self.is_view())?;
    s.end()
  }
}

// ─── Schema ──────────────────────────────────────────────────────────────────

/// A namespace grouping tables and views.
#[derive(Debug, Clone, Serialize)]
pub struct Schema {
  pub name:      String,
  pub relations: Vec<Relation>,
}

impl Schema {
  pub fn new(name: impl Into<String>) -> Self {
    Self { name: name.into(), relations: Vec::new() }
  }

  pub fn tables(&self) -> impl Iterator<Item = &RelationMeta> {
    self.relations.iter().filter_map(|r| match r {
      Relation::Table(m) => Some(m),
      Relation::View(_) => None,
    })
  }

  pub fn views(&self) -> impl Iterator<Item = &RelationMeta> {
    self.relations.iter().filter_map(|r| match r {
      Relation::View(m) => Some(m),
      Relation::Table(_) => None,
    })
  }

  pub fn find_table(&self, name: &str) -> Option<&RelationMeta> {
    self.tables().find(|t| t.name == name)
  }
}
