//! Row values and the column-order permutation map.
//!
//! Cell values travel as text all the way to the database, where `$n::type`
//! casts coerce them, the same semantics the upload layer's CSV cells have.
//! `None` is SQL NULL.

use std::collections::HashMap;

use crate::{Error, Result, column::Column};

/// A row of cell values in table-column order.
pub type Row = Vec<Option<String>>;

/// Normalise a parsed row: empty cells become NULL.
pub fn normalize(raw: Vec<String>) -> Row {
  raw
    .into_iter()
    .map(|cell| if cell.is_empty() { None } else { Some(cell) })
    .collect()
}

/// Caller-supplied mapping from table column name to index in the uploaded
/// rows. Column order in an upload need not match table column order; this
/// map permutes values into table order before each insert/delete.
#[derive(Debug, Clone, Default)]
pub struct ColumnIndexMap {
  by_name: HashMap<String, usize>,
}

impl ColumnIndexMap {
  pub fn new() -> Self { Self::default() }

  /// Identity mapping for uploads already in table-column order.
  pub fn identity(columns: &[Column]) -> Self {
    Self {
      by_name: columns
        .iter()
        .enumerate()
        .map(|(i, c)| (c.name.clone(), i))
        .collect(),
    }
  }

  pub fn insert(&mut self, name: impl Into<String>, index: usize) {
    self.by_name.insert(name.into(), index);
  }

  pub fn get(&self, name: &str) -> Option<usize> {
    self.by_name.get(name).copied()
  }

  /// How many uploaded columns are mapped.
  pub fn len(&self) -> usize { self.by_name.len() }

  pub fn is_empty(&self) -> bool { self.by_name.is_empty() }

  /// Project `row` onto `names`, in order. Errors on a name with no entry;
  /// a mapped index beyond the row's length reads as NULL (short rows are
  /// ragged-CSV artifacts, not validation failures).
  pub fn project<'a>(
    &self,
    row: &Row,
    names: impl IntoIterator<Item = &'a str>,
  ) -> Result<Row> {
    names
      .into_iter()
      .map(|name| {
        let index = self
          .get(name)
          .ok_or_else(|| Error::UnknownColumn(name.to_owned()))?;
        Ok(row.get(index).cloned().flatten())
      })
      .collect()
  }
}

impl FromIterator<(String, usize)> for ColumnIndexMap {
  fn from_iter<I: IntoIterator<Item = (String, usize)>>(iter: I) -> Self {
    Self { by_name: iter.into_iter().collect() }
  }
}
