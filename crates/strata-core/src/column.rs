//! Column descriptions and the abstract column-type system.
//!
//! Every SQL string the backend assembles leans on this mapping: `CREATE
//! TABLE` column literals, the `$n::<type>` parameter casts on the mutation
//! path, and the text→typed decoding of query results.

use serde::{Deserialize, Serialize, ser::SerializeStruct};

// ─── ColumnType ──────────────────────────────────────────────────────────────

/// The abstract column types supported for user tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
  Integer,
  Numeric,
  Timestamp,
  TimestampWithZone,
  Char,
  Geometry,
}

impl ColumnType {
  pub const ALL: [ColumnType; 6] = [
    Self::Integer,
    Self::Numeric,
    Self::Timestamp,
    Self::TimestampWithZone,
    Self::Char,
    Self::Geometry,
  ];

  /// Human-readable label, shown in upload previews.
  pub fn label(self) -> &'static str {
    match self {
      Self::Integer => "Integer",
      Self::Numeric => "Decimal",
      Self::Timestamp => "Timestamp",
      Self::TimestampWithZone => "Timestamp w/timezone",
      Self::Char => "Text",
      Self::Geometry => "Geometry",
    }
  }

  /// The PostgreSQL type literal used in `CREATE TABLE` and parameter casts.
  pub fn pg_type(self) -> &'static str {
    match self {
      Self::Integer => "integer",
      Self::Numeric => "numeric",
      Self::Timestamp => "timestamp without time zone",
      Self::TimestampWithZone => "timestamp with time zone",
      Self::Char => "text",
      Self::Geometry => "geometry",
    }
  }

  /// Map an `information_schema` data-type name back to a variant.
  ///
  /// PostGIS geometry columns are reported as `USER-DEFINED`. Unknown names
  /// fall back to [`ColumnType::Char`] so exotic columns in read paths still
  /// render as text instead of failing the whole topology scan.
  pub fn from_pg_type_name(name: &str) -> Self {
    match name {
      "USER-DEFINED" | "geometry" => Self::Geometry,
      "integer" => Self::Integer,
      "numeric" => Self::Numeric,
      "timestamp without time zone" => Self::Timestamp,
      "timestamp with time zone" => Self::TimestampWithZone,
      "text" => Self::Char,
      _ => Self::Char,
    }
  }

  /// Map a result-set type OID to a variant, falling back to
  /// [`ColumnType::Char`].
  ///
  /// PostGIS assigns the geometry type a per-install OID, so geometry
  /// columns are resolved from topology metadata on read paths rather than
  /// from the OID.
  pub fn from_pg_oid(oid: u32) -> Self {
    match oid {
      23 => Self::Integer,
      1700 => Self::Numeric,
      1114 => Self::Timestamp,
      1184 => Self::TimestampWithZone,
      25 => Self::Char,
      _ => Self::Char,
    }
  }
}

// ─── GeometryKind ────────────────────────────────────────────────────────────

/// The declared subtype of a geometry column, as understood by
/// `AddGeometryColumn`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeometryKind {
  Point,
  LineString,
  Polygon,
  MultiPoint,
  MultiLineString,
  MultiPolygon,
  GeometryCollection,
}

impl GeometryKind {
  /// The name Postgres/PostGIS uses for this subtype.
  pub fn pg_name(self) -> &'static str {
    match self {
      Self::Point => "POINT",
      Self::LineString => "LINESTRING",
      Self::Polygon => "POLYGON",
      Self::MultiPoint => "MULTIPOINT",
      Self::MultiLineString => "MULTILINESTRING",
      Self::MultiPolygon => "MULTIPOLYGON",
      Self::GeometryCollection => "GEOMETRYCOLLECTION",
    }
  }
}

// ─── Column ──────────────────────────────────────────────────────────────────

/// One column of a user table or view.
///
/// Columns never change type in place; schema evolution is out of scope.
#[derive(Debug, Clone, Deserialize)]
pub struct Column {
  pub name:  String,
  #[serde(rename = "type")]
  pub ty:    ColumnType,
  pub is_pk: bool,
  /// SRID of the source data; only meaningful for geometry columns.
  #[serde(default)]
  pub srid:      Option<i32>,
  #[serde(default)]
  pub geom_kind: Option<GeometryKind>,
}

impl Column {
  pub fn new(name: impl Into<String>, ty: ColumnType, is_pk: bool) -> Self {
    Self { name: name.into(), ty, is_pk, srid: None, geom_kind: None }
  }

  pub fn geometry(
    name: impl Into<String>,
    srid: i32,
    kind: GeometryKind,
  ) -> Self {
    Self {
      name:      name.into(),
      ty:        ColumnType::Geometry,
      is_pk:     false,
      srid:      Some(srid),
      geom_kind: Some(kind),
    }
  }

  /// Human label of this column's type.
  pub fn type_label(&self) -> &'static str { self.ty.label() }
}

/// The serialized shape carries `type_label` alongside the machine name so
/// the UI layer never needs the mapping.
impl Serialize for Column {
  fn serialize<S: serde::Serializer>(
    &self,
    serializer: S,
  ) -> Result<S::Ok, S::Error> {
    let mut s = serializer.serialize_struct("Column", 6)?;
    s.serialize_field("name", &self.name)?;
    s.serialize_field("type", &self.ty)?;
    s.serialize_field("type_label", self.type_label())?;
    s.serialize_field("is_pk", &self.is_pk)?;
    s.serialize_field("srid", &self.srid)?;
    s.serialize_field("geom_kind", &self.geom_kind)?;
    s.end()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn pg_type_round_trips_for_every_variant() {
    for ty in ColumnType::ALL {
      assert_eq!(ColumnType::from_pg_type_name(ty.pg_type()), ty);
    }
  }

  #[test]
  fn user_defined_means_geometry() {
    assert_eq!(
      ColumnType::from_pg_type_name("USER-DEFINED"),
      ColumnType::Geometry
    );
  }

  #[test]
  fn unknown_type_name_falls_back_to_char() {
    assert_eq!(
      ColumnType::from_pg_type_name("character varying"),
      ColumnType::Char
    );
    assert_eq!(ColumnType::from_pg_type_name("bytea"), ColumnType::Char);
  }

  #[test]
  fn oid_mapping_and_fallback() {
    assert_eq!(ColumnType::from_pg_oid(23), ColumnType::Integer);
    assert_eq!(ColumnType::from_pg_oid(1700), ColumnType::Numeric);
    assert_eq!(ColumnType::from_pg_oid(1114), ColumnType::Timestamp);
    assert_eq!(ColumnType::from_pg_oid(1184), ColumnType::TimestampWithZone);
    assert_eq!(ColumnType::from_pg_oid(25), ColumnType::Char);
    // jsonb: unsupported, degrades to text
    assert_eq!(ColumnType::from_pg_oid(3802), ColumnType::Char);
  }

  #[test]
  fn serialized_columns_carry_the_type_label() {
    let column = Column::new("id", ColumnType::Integer, true);
    let json = serde_json::to_value(&column).unwrap();
    assert_eq!(json["type"], "integer");
    assert_eq!(json["type_label"], "Integer");
    assert_eq!(json["is_pk"], true);

    let geom =
      Column::geometry("geom", 4326, GeometryKind::MultiPolygon);
    let json = serde_json::to_value(&geom).unwrap();
    assert_eq!(json["type_label"], "Geometry");
    assert_eq!(json["srid"], 4326);
  }

  #[test]
  fn labels_are_distinct() {
    let labels: std::collections::HashSet<_> =
      ColumnType::ALL.iter().map(|t| t.label()).collect();
    assert_eq!(labels.len(), ColumnType::ALL.len());
  }
}
