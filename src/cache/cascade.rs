//! Cache cascade: ordered layers, first-hit-wins reads, write-to-all
//!
//! The cascade is the failure-tolerance boundary of the caching subsystem.
//! A layer that is slow, unavailable, or holding an undecodable payload is
//! treated as a miss (read) or a dropped write (populate); nothing a layer
//! does can turn into an error for the query caller.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::time::timeout;

use crate::cache::layer::CacheLayer;

/// Default bound on any single layer read or write.
pub const DEFAULT_LAYER_TIMEOUT: Duration = Duration::from_millis(250);

/// An ordered stack of cache layers.
///
/// Reads consult layers in registration order and return the first hit; there
/// is no merging and no promotion of a lower layer's hit into the layers above
/// it. A value stale in an earlier layer therefore shadows a fresher value in
/// a later one; this is a deliberate policy choice, pinned by test. Writes go
/// to every layer unconditionally.
pub struct CacheCascade {
    layers: Vec<Arc<dyn CacheLayer>>,
    layer_timeout: Duration,
}

impl CacheCascade {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_LAYER_TIMEOUT)
    }

    /// Create a cascade whose individual layer calls are bounded by `layer_timeout`.
    pub fn with_timeout(layer_timeout: Duration) -> Self {
        Self {
            layers: Vec::new(),
            layer_timeout,
        }
    }

    /// Append a layer. Registration order is consultation order.
    pub fn register(&mut self, layer: Arc<dyn CacheLayer>) {
        self.layers.push(layer);
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Look up a collection. First layer with a decodable hit wins.
    pub async fn try_get_collection<T: DeserializeOwned>(&self, key: &str) -> Option<Vec<T>> {
        for layer in &self.layers {
            let hit = match timeout(self.layer_timeout, layer.get_collection(key)).await {
                Ok(hit) => hit,
                // A timed-out read is indistinguishable from a clean miss.
                Err(_) => None,
            };
            if let Some(values) = hit {
                let decoded: Result<Vec<T>, _> =
                    values.into_iter().map(serde_json::from_value).collect();
                match decoded {
                    Ok(values) => return Some(values),
                    Err(err) => {
                        tracing::warn!(key, error = %err, "cached collection failed to decode, treating as miss");
                    }
                }
            }
        }
        None
    }

    /// Look up a scalar. First layer with a decodable hit wins.
    pub async fn try_get_scalar<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        for layer in &self.layers {
            let hit = match timeout(self.layer_timeout, layer.get_scalar(key)).await {
                Ok(hit) => hit,
                Err(_) => None,
            };
            if let Some(value) = hit {
                match serde_json::from_value(value) {
                    Ok(value) => return Some(value),
                    Err(err) => {
                        tracing::warn!(key, error = %err, "cached scalar failed to decode, treating as miss");
                    }
                }
            }
        }
        None
    }

    /// Store a collection in every registered layer.
    pub async fn set_collection<T: Serialize>(&self, key: &str, values: &[T], ttl: Duration) {
        let encoded: Result<Vec<Value>, _> =
            values.iter().map(serde_json::to_value).collect();
        let encoded = match encoded {
            Ok(encoded) => encoded,
            Err(err) => {
                tracing::warn!(key, error = %err, "collection not cacheable, skipping population");
                return;
            }
        };
        for layer in &self.layers {
            // A timed-out write is a dropped write, not retried inline.
            if timeout(self.layer_timeout, layer.set_collection(key, &encoded, ttl))
                .await
                .is_err()
            {
                tracing::debug!(key, "cache layer write timed out, dropped");
            }
        }
    }

    /// Store a scalar in every registered layer.
    pub async fn set_scalar<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let encoded = match serde_json::to_value(value) {
            Ok(encoded) => encoded,
            Err(err) => {
                tracing::warn!(key, error = %err, "scalar not cacheable, skipping population");
                return;
            }
        };
        for layer in &self.layers {
            if timeout(self.layer_timeout, layer.set_scalar(key, &encoded, ttl))
                .await
                .is_err()
            {
                tracing::debug!(key, "cache layer write timed out, dropped");
            }
        }
    }

    /// Advisory clear of every layer.
    pub async fn clear(&self) {
        for layer in &self.layers {
            let _ = timeout(self.layer_timeout, layer.clear()).await;
        }
    }
}

impl Default for CacheCascade {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// A layer scripted with a fixed scalar hit, counting consultations.
    #[derive(Default)]
    struct ScriptedLayer {
        scalar: Option<Value>,
        reads: AtomicUsize,
        writes: AtomicUsize,
    }

    impl ScriptedLayer {
        fn hit(value: Value) -> Self {
            Self {
                scalar: Some(value),
                ..Default::default()
            }
        }

        fn miss() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl CacheLayer for ScriptedLayer {
        async fn get_collection(&self, _key: &str) -> Option<Vec<Value>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            None
        }

        async fn get_scalar(&self, _key: &str) -> Option<Value> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.scalar.clone()
        }

        async fn set_collection(&self, _key: &str, _values: &[Value], _ttl: Duration) {
            self.writes.fetch_add(1, Ordering::SeqCst);
        }

        async fn set_scalar(&self, _key: &str, _value: &Value, _ttl: Duration) {
            self.writes.fetch_add(1, Ordering::SeqCst);
        }

        async fn clear(&self) {}
    }

    /// A layer that hangs longer than the cascade's per-call bound.
    struct StalledLayer;

    #[async_trait]
    impl CacheLayer for StalledLayer {
        async fn get_collection(&self, _key: &str) -> Option<Vec<Value>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            None
        }

        async fn get_scalar(&self, _key: &str) -> Option<Value> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            None
        }

        async fn set_collection(&self, _key: &str, _values: &[Value], _ttl: Duration) {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }

        async fn set_scalar(&self, _key: &str, _value: &Value, _ttl: Duration) {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }

        async fn clear(&self) {}
    }

    #[tokio::test]
    async fn test_first_hit_wins_and_no_promotion() {
        let l1 = Arc::new(ScriptedLayer::miss());
        let l2 = Arc::new(ScriptedLayer::hit(json!("from-l2")));
        let l3 = Arc::new(ScriptedLayer::hit(json!("from-l3")));

        let mut cascade = CacheCascade::new();
        cascade.register(l1.clone());
        cascade.register(l2.clone());
        cascade.register(l3.clone());

        let got: Option<String> = cascade.try_get_scalar("k").await;
        assert_eq!(got.as_deref(), Some("from-l2"));

        // L3 was never consulted once L2 hit.
        assert_eq!(l3.reads.load(Ordering::SeqCst), 0);
        // L1's miss was not backfilled from L2.
        assert_eq!(l1.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_all_layers_miss_returns_none() {
        let mut cascade = CacheCascade::new();
        cascade.register(Arc::new(ScriptedLayer::miss()));
        cascade.register(Arc::new(ScriptedLayer::miss()));
        let got: Option<i64> = cascade.try_get_scalar("k").await;
        assert_eq!(got, None);
    }

    #[tokio::test]
    async fn test_write_fans_out_to_every_layer() {
        let l1 = Arc::new(ScriptedLayer::miss());
        let l2 = Arc::new(ScriptedLayer::miss());
        let mut cascade = CacheCascade::new();
        cascade.register(l1.clone());
        cascade.register(l2.clone());

        cascade.set_scalar("k", &7i64, Duration::from_secs(60)).await;
        assert_eq!(l1.writes.load(Ordering::SeqCst), 1);
        assert_eq!(l2.writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stalled_layer_degrades_to_miss_and_dropped_write() {
        let healthy = Arc::new(ScriptedLayer::hit(json!(99)));
        let mut cascade = CacheCascade::with_timeout(Duration::from_millis(20));
        cascade.register(Arc::new(StalledLayer));
        cascade.register(healthy.clone());

        // The stalled first layer reads as a miss and the second still wins.
        let got: Option<i64> = cascade.try_get_scalar("k").await;
        assert_eq!(got, Some(99));

        // The stalled layer's write is dropped, the healthy one still lands.
        cascade.set_scalar("k", &1i64, Duration::from_secs(60)).await;
        assert_eq!(healthy.writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_undecodable_hit_falls_through() {
        let mut cascade = CacheCascade::new();
        cascade.register(Arc::new(ScriptedLayer::hit(json!("not-a-number"))));
        cascade.register(Arc::new(ScriptedLayer::hit(json!(5))));
        let got: Option<i64> = cascade.try_get_scalar("k").await;
        assert_eq!(got, Some(5));
    }

    #[tokio::test]
    async fn test_collection_roundtrip() {
        let layer = Arc::new(crate::cache::memory::MemoryCacheLayer::new());
        let mut cascade = CacheCascade::new();
        cascade.register(layer);

        cascade
            .set_collection("rows", &["a", "b", "c"], Duration::from_secs(60))
            .await;
        let got: Option<Vec<String>> = cascade.try_get_collection("rows").await;
        assert_eq!(got, Some(vec!["a".into(), "b".into(), "c".into()]));
    }
}
