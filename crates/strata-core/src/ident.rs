//! Identifier sanitisation.
//!
//! Every schema, table, and column name passes through [`sanitize`] before
//! it is interpolated into SQL text. Values always travel as bound
//! parameters; identifiers cannot, so this module is the sole injection
//! defence for them.

/// Lower-case `value`, trim it, collapse each run of whitespace to a single
/// `_`, strip every character outside `[a-z_0-9]`, then trim leading and
/// trailing underscores.
///
/// Never errors: fully-invalid input degrades to the empty string, so
/// callers that need a usable identifier must also check [`is_sane_name`].
/// The output is a fixed point: `sanitize(sanitize(s)) == sanitize(s)`.
pub fn sanitize(value: &str) -> String {
  let lowered = value.to_lowercase();

  let mut out = String::with_capacity(lowered.len());
  let mut pending_gap = false;
  for ch in lowered.trim().chars() {
    if ch.is_whitespace() {
      pending_gap = true;
      continue;
    }
    if pending_gap {
      out.push('_');
      pending_gap = false;
    }
    if matches!(ch, 'a'..='z' | '0'..='9' | '_') {
      out.push(ch);
    }
  }

  out.trim_matches('_').to_owned()
}

/// Like [`sanitize`] but without the whitespace collapse or underscore trim.
///
/// Audit-table names begin with `_` and would be mangled by [`sanitize`];
/// they are derived internally and only need the charset strip.
pub fn internal_sanitize(value: &str) -> String {
  value
    .to_lowercase()
    .trim()
    .chars()
    .filter(|c| matches!(c, 'a'..='z' | '0'..='9' | '_'))
    .collect()
}

/// A name is sane when it is already sanitised, 1–63 bytes long, and starts
/// with a lowercase ASCII letter. 63 is the Postgres identifier limit.
pub fn is_sane_name(value: &str) -> bool {
  value == sanitize(value)
    && (1..=63).contains(&value.len())
    && value.starts_with(|c: char| c.is_ascii_lowercase())
}
