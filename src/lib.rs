//! dbtrail: transparent caching and query-trail tracking for database access
//!
//! Queries executed through a [`TrackedConnection`] first consult an ordered
//! stack of cache layers under a deterministic content-derived key; misses run
//! against the underlying executor and populate every layer. Every command,
//! cached or not, emits an immutable [`Trail`] fanned out to subscribed
//! observers, and the first-party [`TrailAggregator`] rolls buffered trails
//! into per-query summaries flushed to a durable sink.
//!
//! The support layers are invisible on failure: a slow or unavailable cache
//! layer reads as a miss, a failed summary flush drops that batch, and neither
//! ever surfaces as a query error.

pub mod cache;
pub mod config;
pub mod connection;
pub mod error;
pub mod tracking;

pub use cache::{derive_key, CacheCascade, CacheLayer, CacheRole, MemoryCacheLayer};
pub use config::{load_config, Config};
pub use connection::{QueryExecutor, QueryOptions, TrackedConnection};
pub use error::{Error, Result};
pub use tracking::{
    ObserverRegistry, QuerySummary, SqliteSummarySink, SubscriptionToken, SummarySink, Trail,
    TrailAggregator, TrailObserver,
};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing/logging.
///
/// Note: this can only be called once per process. Embedding applications
/// that install their own subscriber should skip it.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .init();
}
