//! Cache layer capability
//!
//! A cache layer is one backing store in the cascade: an in-process table, a
//! remote key-value server, anything that can hold a named value with an
//! expiration. Implementations differ only in backing store and failure
//! tolerance; the cascade never sees a concrete backend type.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

/// Contract every cache backing store must implement.
///
/// Values cross this boundary as JSON so that heterogeneous stores (memory,
/// Redis, ...) share one shape. Implementations must convert their own
/// timeout or unavailability conditions into a `None` read or a silently
/// dropped write: an unavailable layer is a miss, never an error.
#[async_trait]
pub trait CacheLayer: Send + Sync {
    /// Look up an ordered collection stored under `key`.
    async fn get_collection(&self, key: &str) -> Option<Vec<Value>>;

    /// Look up a scalar value stored under `key`.
    async fn get_scalar(&self, key: &str) -> Option<Value>;

    /// Store an ordered collection under `key`, expiring after `ttl`.
    async fn set_collection(&self, key: &str, values: &[Value], ttl: Duration);

    /// Store a scalar value under `key`, expiring after `ttl`.
    async fn set_scalar(&self, key: &str, value: &Value, ttl: Duration);

    /// Remove all entries. Advisory: layers that cannot support clearing
    /// may treat this as a no-op.
    async fn clear(&self);
}
