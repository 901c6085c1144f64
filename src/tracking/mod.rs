//! Trail collection and aggregation pipeline
//!
//! Every executed command produces a [`Trail`](trail::Trail) that is fanned
//! out to subscribed observers without blocking the caller. The
//! [`TrailAggregator`](aggregator::TrailAggregator) is the first-party
//! observer: it buffers trails, periodically rolls them up into per-query
//! summaries, and flushes the summaries to a durable sink.

pub mod aggregator;
pub mod observer;
pub mod sink;
pub mod sqlite;
pub mod summary;
pub mod trail;

pub use aggregator::TrailAggregator;
pub use observer::{FnObserver, ObserverRegistry, SubscriptionToken, TrailObserver};
pub use sink::SummarySink;
pub use sqlite::SqliteSummarySink;
pub use summary::{summarize, QuerySummary};
pub use trail::Trail;
