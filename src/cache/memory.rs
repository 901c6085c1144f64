//! In-process cache layer backed by a concurrent hash table
//!
//! Entries carry an absolute expiry deadline; expired entries read as misses
//! and are removed lazily on the access that observes them.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use crate::cache::layer::CacheLayer;

/// What a single cache slot holds. Collection and scalar entries never
/// satisfy each other's reads even under the same key.
#[derive(Debug, Clone)]
enum Slot {
    Collection(Vec<Value>),
    Scalar(Value),
}

#[derive(Debug, Clone)]
struct Entry {
    slot: Slot,
    expires_at: Instant,
}

/// An in-memory [`CacheLayer`] with per-entry TTL.
#[derive(Default)]
pub struct MemoryCacheLayer {
    entries: DashMap<String, Entry>,
}

impl MemoryCacheLayer {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Fetch a live entry, evicting it if its deadline has passed.
    fn live_entry(&self, key: &str) -> Option<Entry> {
        {
            let entry = self.entries.get(key)?;
            if entry.expires_at > Instant::now() {
                return Some(entry.clone());
            }
        }
        // The read guard is dropped before removal to avoid deadlocking the shard.
        self.entries.remove(key);
        None
    }

    fn store(&self, key: &str, slot: Slot, ttl: Duration) {
        self.entries.insert(
            key.to_string(),
            Entry {
                slot,
                expires_at: Instant::now() + ttl,
            },
        );
    }
}

#[async_trait]
impl CacheLayer for MemoryCacheLayer {
    async fn get_collection(&self, key: &str) -> Option<Vec<Value>> {
        match self.live_entry(key)?.slot {
            Slot::Collection(values) => Some(values),
            Slot::Scalar(_) => None,
        }
    }

    async fn get_scalar(&self, key: &str) -> Option<Value> {
        match self.live_entry(key)?.slot {
            Slot::Scalar(value) => Some(value),
            Slot::Collection(_) => None,
        }
    }

    async fn set_collection(&self, key: &str, values: &[Value], ttl: Duration) {
        self.store(key, Slot::Collection(values.to_vec()), ttl);
    }

    async fn set_scalar(&self, key: &str, value: &Value, ttl: Duration) {
        self.store(key, Slot::Scalar(value.clone()), ttl);
    }

    async fn clear(&self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_then_get_scalar() {
        let layer = MemoryCacheLayer::new();
        layer.set_scalar("k1", &json!(42), Duration::from_secs(60)).await;
        assert_eq!(layer.get_scalar("k1").await, Some(json!(42)));
    }

    #[tokio::test]
    async fn test_missing_key_is_miss() {
        let layer = MemoryCacheLayer::new();
        assert_eq!(layer.get_scalar("absent").await, None);
        assert_eq!(layer.get_collection("absent").await, None);
    }

    #[tokio::test]
    async fn test_expired_entry_reads_as_miss() {
        let layer = MemoryCacheLayer::new();
        layer.set_scalar("k1", &json!("v"), Duration::from_millis(10)).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(layer.get_scalar("k1").await, None);
    }

    #[tokio::test]
    async fn test_kind_mismatch_is_miss() {
        let layer = MemoryCacheLayer::new();
        layer.set_scalar("k1", &json!(1), Duration::from_secs(60)).await;
        assert_eq!(layer.get_collection("k1").await, None);

        layer
            .set_collection("k2", &[json!(1), json!(2)], Duration::from_secs(60))
            .await;
        assert_eq!(layer.get_scalar("k2").await, None);
    }

    #[tokio::test]
    async fn test_clear_removes_everything() {
        let layer = MemoryCacheLayer::new();
        layer.set_scalar("k1", &json!(1), Duration::from_secs(60)).await;
        layer
            .set_collection("k2", &[json!(2)], Duration::from_secs(60))
            .await;
        layer.clear().await;
        assert_eq!(layer.get_scalar("k1").await, None);
        assert_eq!(layer.get_collection("k2").await, None);
    }

    #[tokio::test]
    async fn test_overwrite_replaces_value_and_ttl() {
        let layer = MemoryCacheLayer::new();
        layer.set_scalar("k1", &json!("old"), Duration::from_millis(10)).await;
        layer.set_scalar("k1", &json!("new"), Duration::from_secs(60)).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(layer.get_scalar("k1").await, Some(json!("new")));
    }
}
