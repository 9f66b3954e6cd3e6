//! Decoding of text result cells into typed values.
//!
//! Every cell travels the wire as text (see the select-list casts in the
//! topology and version modules); this module parses that text back into
//! native values for callers that want typed rows.

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use strata_core::{
  column::{Column, ColumnType},
  row::Row,
};

use crate::{Error, Result};

/// A decoded cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
  Null,
  Integer(i64),
  Numeric(Decimal),
  Timestamp(NaiveDateTime),
  TimestampTz(DateTime<Utc>),
  Text(String),
  /// Geometry as WKT, exactly as `ST_AsText` produced it.
  Geometry(String),
}

impl Value {
  pub fn is_null(&self) -> bool { matches!(self, Value::Null) }
}

/// Timestamp layouts Postgres emits when casting to text. Fractional
/// seconds are optional in both.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
const TIMESTAMP_TZ_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f%#z";

fn decode_error(value: &str, ty: ColumnType) -> Error {
  Error::Decode { value: value.to_owned(), ty }
}

/// Parse one text cell according to its column type. `None` is NULL for
/// every type.
pub fn decode_cell(cell: Option<&str>, ty: ColumnType) -> Result<Value> {
  let Some(text) = cell else { return Ok(Value::Null) };

  Ok(match ty {
    ColumnType::Integer => Value::Integer(
      text.parse().map_err(|_| decode_error(text, ty))?,
    ),
    ColumnType::Numeric => Value::Numeric(
      text.parse().map_err(|_| decode_error(text, ty))?,
    ),
    ColumnType::Timestamp => Value::Timestamp(
      NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
        .map_err(|_| decode_error(text, ty))?,
    ),
    ColumnType::TimestampWithZone => Value::TimestampTz(
      DateTime::parse_from_str(text, TIMESTAMP_TZ_FORMAT)
        .map_err(|_| decode_error(text, ty))?
        .with_timezone(&Utc),
    ),
    ColumnType::Char => Value::Text(text.to_owned()),
    ColumnType::Geometry => Value::Geometry(text.to_owned()),
  })
}

/// Decode a whole text row against its column schema.
pub fn decode_row(row: &Row, columns: &[Column]) -> Result<Vec<Value>> {
  columns
    .iter()
    .enumerate()
    .map(|(i, column)| {
      let cell = row.get(i).and_then(|c| c.as_deref());
      decode_cell(cell, column.ty)
    })
    .collect()
}
