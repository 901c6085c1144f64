//! Durable sink capability consumed by the trail aggregator

use async_trait::async_trait;

use crate::tracking::summary::QuerySummary;

/// Persists batches of query summaries.
///
/// The aggregator writes each flush cycle as one batch. Sinks must tolerate
/// duplicate summaries (a retried flush is acceptable and need not be
/// deduplicated). A failed write loses that cycle's batch by design.
#[async_trait]
pub trait SummarySink: Send + Sync {
    async fn write_summaries(&self, summaries: &[QuerySummary]) -> anyhow::Result<()>;
}
