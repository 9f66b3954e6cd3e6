//! Version: an immutable checkpoint marking the end of one mutation batch.
//!
//! Versions are strictly append-only: every audit row references exactly one
//! version, and a table's state as of any version is reconstructible by
//! scanning audit rows with `_version_id <= V`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::table::UserId;

/// One mutation-batch checkpoint. Monotonically increasing ids are assigned
/// by the catalog; the record never changes after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Version {
  pub version_id: i32,
  pub created_on: DateTime<Utc>,
  pub user:       UserId,
  pub table_id:   i32,
}
