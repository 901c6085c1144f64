//! Deterministic cache key derivation
//!
//! A cache key identifies a (query text, parameter set, role) triple. The role
//! tag keeps collection and scalar lookups for the same query text from
//! colliding; it is mixed into the hashed input, not appended to the output.

use serde_json::Value;

use crate::cache::murmur3;

/// Which kind of lookup a key is derived for.
///
/// Collection reads and scalar reads of the same query text must never share
/// a cache entry, so each role contributes a distinct tag to the hash input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheRole {
    /// A query returning an ordered sequence of rows.
    Collection,
    /// A query returning a single value.
    Scalar,
}

impl CacheRole {
    /// The stable tag mixed into the hash input for this role.
    pub fn tag(self) -> &'static str {
        match self {
            CacheRole::Collection => "Query",
            CacheRole::Scalar => "Scalar",
        }
    }
}

/// Derive the cache key for a (query, role, parameters) triple.
///
/// The parameters are rendered through `serde_json`, whose map representation
/// is ordered by key, so the same logical parameter set always encodes to the
/// same text. `Value::Null` means "no parameters" and contributes nothing to
/// the hash input. The result is a 32-character lowercase hex digest.
pub fn derive_key(query: &str, role: CacheRole, params: &Value) -> String {
    let mut input = String::with_capacity(query.len() + 16);
    input.push_str(query);
    input.push_str(role.tag());
    if !params.is_null() {
        input.push_str(&params.to_string());
    }
    murmur3::hash128_hex(input.as_bytes())
}
