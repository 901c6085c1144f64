//! SQLite summary sink
//!
//! Persists flushed query summaries to a local SQLite file using WAL mode for
//! concurrent reads while the aggregator writes. Each batch is inserted inside
//! a single transaction.

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::tracking::sink::SummarySink;
use crate::tracking::summary::QuerySummary;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS queries (
    id              INTEGER  PRIMARY KEY AUTOINCREMENT NOT NULL,
    query_text      TEXT     NOT NULL,
    avg_time_ms     INTEGER  NOT NULL,
    max_time_ms     INTEGER  NOT NULL,
    min_time_ms     INTEGER  NOT NULL,
    flushed_at      DATETIME NOT NULL,
    cache_hit_ratio REAL     NOT NULL,
    runs            INTEGER  NOT NULL
)";

/// [`SummarySink`] backed by a local SQLite database.
pub struct SqliteSummarySink {
    pool: SqlitePool,
}

impl SqliteSummarySink {
    /// Open (creating if missing) the database at `database_url` and ensure
    /// the summary table exists.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let sink = SqliteSummarySink::new("sqlite:./dbtrail.sqlite").await?;
    /// ```
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(30));

        // One connection: SQLite allows a single writer, and it keeps
        // `sqlite::memory:` databases coherent across pool checkouts.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await
            .context("failed to open summary database")?;

        sqlx::query(SCHEMA)
            .execute(&pool)
            .await
            .context("failed to create summary table")?;

        Ok(Self { pool })
    }

    /// Count of persisted summary rows, for inspection and tests.
    pub async fn summary_count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM queries")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl SummarySink for SqliteSummarySink {
    async fn write_summaries(&self, summaries: &[QuerySummary]) -> Result<()> {
        if summaries.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for summary in summaries {
            sqlx::query(
                "INSERT INTO queries
                 (query_text, avg_time_ms, max_time_ms, min_time_ms, flushed_at, cache_hit_ratio, runs)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&summary.query_text)
            .bind(summary.avg_time_ms)
            .bind(summary.max_time_ms)
            .bind(summary.min_time_ms)
            .bind(summary.flushed_at)
            .bind(summary.cache_hit_ratio)
            .bind(summary.runs)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await.context("failed to commit summary batch")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn summary(query: &str, runs: i64) -> QuerySummary {
        QuerySummary {
            query_text: query.to_string(),
            avg_time_ms: 12,
            max_time_ms: 20,
            min_time_ms: 4,
            flushed_at: Utc::now(),
            cache_hit_ratio: 0.5,
            runs,
        }
    }

    #[tokio::test]
    async fn test_write_batch_persists_rows() {
        let sink = SqliteSummarySink::new("sqlite::memory:").await.unwrap();
        sink.write_summaries(&[summary("Q1", 3), summary("Q2", 1)])
            .await
            .unwrap();
        assert_eq!(sink.summary_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_empty_batch_writes_nothing() {
        let sink = SqliteSummarySink::new("sqlite::memory:").await.unwrap();
        sink.write_summaries(&[]).await.unwrap();
        assert_eq!(sink.summary_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_summaries_are_tolerated() {
        let sink = SqliteSummarySink::new("sqlite::memory:").await.unwrap();
        let batch = [summary("Q1", 2)];
        sink.write_summaries(&batch).await.unwrap();
        sink.write_summaries(&batch).await.unwrap();
        assert_eq!(sink.summary_count().await.unwrap(), 2);
    }
}
