//! Per-table permission grants.
//!
//! Non-owners get access through a bitmask of grants stored in the catalog;
//! an absent row means no access. The owner always has implicit full
//! access. Bits are powers of two so grants compose with bitwise ops.

use serde::{Deserialize, Serialize};

/// A set of INSERT/UPDATE/DELETE grants on one table for one user.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
)]
pub struct PermissionSet(i32);

impl PermissionSet {
  pub const NONE: Self = Self(0);
  pub const INSERT: Self = Self(1);
  pub const UPDATE: Self = Self(2);
  pub const DELETE: Self = Self(4);
  /// The conjunction restore requires.
  pub const ALL: Self = Self(1 | 2 | 4);

  pub fn from_bits(bits: i32) -> Self { Self(bits & Self::ALL.0) }

  pub fn bits(self) -> i32 { self.0 }

  pub fn is_empty(self) -> bool { self.0 == 0 }

  /// True when every bit of `other` is present in `self`.
  pub fn contains(self, other: Self) -> bool {
    self.0 & other.0 == other.0
  }

  #[must_use]
  pub fn grant(self, other: Self) -> Self { Self(self.0 | other.0) }

  #[must_use]
  pub fn revoke(self, other: Self) -> Self { Self(self.0 & !other.0) }
}
