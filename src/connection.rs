//! Tracked connection: the cached query orchestration
//!
//! `TrackedConnection` ties the subsystems together: a logical query derives a
//! cache key, consults the cascade, and on a miss runs against the underlying
//! [`QueryExecutor`] and populates every layer. Every path (hit, miss, or
//! failure) emits exactly one trail into the observer registry.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::cache::{derive_key, CacheCascade, CacheLayer, CacheRole};
use crate::error::{Error, Result};
use crate::tracking::{
    ObserverRegistry, SubscriptionToken, Trail, TrailAggregator, TrailObserver,
};

/// The underlying database boundary.
///
/// Implementations wrap a concrete client (a SQL driver, an HTTP data API,
/// ...). Rows and scalars cross the boundary as JSON so results can be cached
/// without the connection knowing concrete row types.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Execute `sql` and return the ordered result rows.
    async fn fetch_collection(&self, sql: &str, params: &Value) -> anyhow::Result<Vec<Value>>;

    /// Execute `sql` and return a single value.
    async fn fetch_scalar(&self, sql: &str, params: &Value) -> anyhow::Result<Value>;
}

/// Per-query overrides for the cached query methods.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Explicit cache key, replacing derivation. Must be non-empty.
    pub key: Option<String>,
    /// Entry lifetime, replacing the connection default.
    pub ttl: Option<Duration>,
}

/// Caching, trail-emitting front for a [`QueryExecutor`].
pub struct TrackedConnection {
    executor: Arc<dyn QueryExecutor>,
    cascade: CacheCascade,
    registry: ObserverRegistry,
    trackers: Mutex<Vec<Arc<TrailAggregator>>>,
    default_ttl: Duration,
    closed: AtomicBool,
}

impl TrackedConnection {
    /// Default cache entry lifetime when neither the connection nor the query
    /// specifies one.
    pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self::with_ttl(executor, Self::DEFAULT_TTL)
    }

    pub fn with_ttl(executor: Arc<dyn QueryExecutor>, default_ttl: Duration) -> Self {
        Self {
            executor,
            cascade: CacheCascade::new(),
            registry: ObserverRegistry::new(),
            trackers: Mutex::new(Vec::new()),
            default_ttl,
            closed: AtomicBool::new(false),
        }
    }

    /// Append a cache layer to the cascade. Registration order is read order.
    pub fn register_cache(&mut self, layer: Arc<dyn CacheLayer>) {
        self.cascade.register(layer);
    }

    /// Subscribe an observer to every trail this connection produces.
    pub fn subscribe(&self, observer: Arc<dyn TrailObserver>) -> SubscriptionToken {
        self.registry.subscribe(observer)
    }

    /// Subscribe an aggregator and remember it, so [`close`](Self::close) can
    /// run its terminal flush.
    pub fn attach_tracker(&self, tracker: Arc<TrailAggregator>) -> SubscriptionToken {
        let token = self.registry.subscribe(tracker.clone());
        self.trackers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(tracker);
        token
    }

    pub fn cache_layer_count(&self) -> usize {
        self.cascade.layer_count()
    }

    /// Run a collection query through the cache cascade.
    ///
    /// On a hit a synthetic cache-hit trail is emitted and the cached rows
    /// are returned. On a miss the executor runs (timed), the result is
    /// written to every layer, and a miss trail is emitted, also when the
    /// execution fails, in which case the failure propagates after the trail.
    pub async fn query_cached<T>(
        &self,
        sql: &str,
        params: Value,
        opts: QueryOptions,
    ) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let key = resolve_key(sql, CacheRole::Collection, &params, opts.key)?;
        let ttl = opts.ttl.unwrap_or(self.default_ttl);

        if let Some(rows) = self.cascade.try_get_collection::<T>(&key).await {
            self.registry.dispatch(Trail::cache_hit(sql, params));
            return Ok(rows);
        }

        let start = Utc::now();
        let clock = Instant::now();
        let outcome = self.executor.fetch_collection(sql, &params).await;
        let runtime = clock.elapsed();

        match outcome {
            Ok(rows) => {
                self.cascade.set_collection(&key, &rows, ttl).await;
                self.registry
                    .dispatch(Trail::executed(sql, params, start, runtime, None));
                rows.into_iter()
                    .map(|row| serde_json::from_value(row).map_err(Error::from))
                    .collect()
            }
            Err(err) => {
                self.registry.dispatch(Trail::executed(
                    sql,
                    params,
                    start,
                    runtime,
                    Some(err.to_string()),
                ));
                Err(Error::Executor(err))
            }
        }
    }

    /// Run a scalar query through the cache cascade. Same shape as
    /// [`query_cached`](Self::query_cached), under the scalar role tag.
    pub async fn query_scalar_cached<T>(
        &self,
        sql: &str,
        params: Value,
        opts: QueryOptions,
    ) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let key = resolve_key(sql, CacheRole::Scalar, &params, opts.key)?;
        let ttl = opts.ttl.unwrap_or(self.default_ttl);

        if let Some(value) = self.cascade.try_get_scalar::<T>(&key).await {
            self.registry.dispatch(Trail::cache_hit(sql, params));
            return Ok(value);
        }

        let start = Utc::now();
        let clock = Instant::now();
        let outcome = self.executor.fetch_scalar(sql, &params).await;
        let runtime = clock.elapsed();

        match outcome {
            Ok(value) => {
                self.cascade.set_scalar(&key, &value, ttl).await;
                self.registry
                    .dispatch(Trail::executed(sql, params, start, runtime, None));
                Ok(serde_json::from_value(value)?)
            }
            Err(err) => {
                self.registry.dispatch(Trail::executed(
                    sql,
                    params,
                    start,
                    runtime,
                    Some(err.to_string()),
                ));
                Err(Error::Executor(err))
            }
        }
    }

    /// Advisory clear of every registered cache layer.
    pub async fn clear_caches(&self) {
        self.cascade.clear().await;
    }

    /// Tear the connection down: drain in-flight trail dispatch, dispose
    /// every subscription, then shut down attached aggregators (terminal
    /// flush).
    ///
    /// The drain runs before disposal so trails already queued still reach
    /// their subscribers; nothing dispatched afterward is delivered.
    /// Idempotent; the second and later calls return immediately.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.registry.close().await;
        self.registry.dispose_all();

        let trackers: Vec<Arc<TrailAggregator>> = {
            let mut guard = self.trackers.lock().unwrap_or_else(|e| e.into_inner());
            guard.drain(..).collect()
        };
        for tracker in trackers {
            tracker.shutdown().await;
        }
    }
}

fn resolve_key(
    sql: &str,
    role: CacheRole,
    params: &Value,
    explicit: Option<String>,
) -> Result<String> {
    match explicit {
        Some(key) if key.is_empty() => Err(Error::InvalidKey),
        Some(key) => Ok(key),
        None => Ok(derive_key(sql, role, params)),
    }
}
