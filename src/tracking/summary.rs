//! Per-query-text statistical rollup of a batch of trails

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::tracking::trail::Trail;

/// Aggregate over all trails sharing one query text within a flushed batch.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySummary {
    pub query_text: String,
    /// Mean runtime in whole milliseconds.
    pub avg_time_ms: i64,
    pub max_time_ms: i64,
    pub min_time_ms: i64,
    /// When this summary was flushed.
    pub flushed_at: DateTime<Utc>,
    /// Fraction of runs served from cache, in [0, 1].
    pub cache_hit_ratio: f64,
    pub runs: i64,
}

/// Group `batch` by query text and summarize each group.
///
/// The batch is expected to have been atomically drained from the aggregator
/// buffer, so no trail is ever summarized twice. Group order is unspecified.
pub fn summarize(batch: &[Trail]) -> Vec<QuerySummary> {
    let mut groups: HashMap<&str, Vec<&Trail>> = HashMap::new();
    for trail in batch {
        groups.entry(trail.query.as_str()).or_default().push(trail);
    }

    let flushed_at = Utc::now();
    groups
        .into_iter()
        .map(|(query, trails)| {
            let runs = trails.len() as i64;
            let total_ms: f64 = trails.iter().map(|t| t.runtime_ms() as f64).sum();
            let hits = trails.iter().filter(|t| t.is_cache_hit).count() as f64;
            QuerySummary {
                query_text: query.to_string(),
                avg_time_ms: (total_ms / runs as f64) as i64,
                max_time_ms: trails.iter().map(|t| t.runtime_ms() as i64).max().unwrap_or(0),
                min_time_ms: trails.iter().map(|t| t.runtime_ms() as i64).min().unwrap_or(0),
                flushed_at,
                cache_hit_ratio: hits / runs as f64,
                runs,
            }
        })
        .collect()
}
