//! Trail aggregator: buffered collection with timer-driven exclusive flush
//!
//! The aggregator is a first-party observer. Inbound trails are appended to a
//! mutex-guarded buffer in O(1); a dedicated background task drains the buffer
//! on an interval, groups and summarizes the batch, and writes the summaries
//! to the durable sink. Because one task owns the timer and performs the flush
//! inline, two flushes can never overlap; a flush that outruns the interval
//! simply delays the next tick.

use std::mem;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};

use crate::tracking::observer::TrailObserver;
use crate::tracking::sink::SummarySink;
use crate::tracking::summary::summarize;
use crate::tracking::trail::Trail;

/// Default bound on a single sink write.
pub const DEFAULT_SINK_TIMEOUT: Duration = Duration::from_secs(10);

struct AggregatorInner {
    buffer: Mutex<Vec<Trail>>,
    sink: Arc<dyn SummarySink>,
    sink_timeout: Duration,
}

impl AggregatorInner {
    /// O(1) append; never blocks on I/O.
    fn append(&self, trail: Trail) {
        self.buffer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(trail);
    }

    /// Drain, summarize, and persist the current buffer contents.
    ///
    /// The buffer lock is held only for the swap, so trails keep accumulating
    /// in the fresh buffer while the captured batch is grouped and written.
    /// A sink failure drops the cycle's summaries; the next cycle proceeds.
    async fn flush(&self) {
        let batch = {
            let mut buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
            mem::take(&mut *buffer)
        };
        if batch.is_empty() {
            return;
        }

        let summaries = summarize(&batch);
        match timeout(self.sink_timeout, self.sink.write_summaries(&summaries)).await {
            Ok(Ok(())) => {
                tracing::debug!(
                    trails = batch.len(),
                    summaries = summaries.len(),
                    "flushed query summaries"
                );
            }
            Ok(Err(err)) => {
                tracing::error!(
                    error = %err,
                    dropped = summaries.len(),
                    "summary sink write failed, batch dropped"
                );
            }
            Err(_) => {
                tracing::error!(
                    dropped = summaries.len(),
                    "summary sink write timed out, batch dropped"
                );
            }
        }
    }
}

/// Buffers trails and periodically flushes per-query summaries to a sink.
///
/// The sink handle is acquired at construction and used one last time by the
/// terminal flush in [`TrailAggregator::shutdown`], so pending trails are not
/// lost when the process winds down.
pub struct TrailAggregator {
    inner: Arc<AggregatorInner>,
    shutdown_tx: mpsc::Sender<()>,
    flush_task: Mutex<Option<JoinHandle<()>>>,
}

impl TrailAggregator {
    /// Spawn an aggregator flushing to `sink` every `flush_interval`.
    pub fn spawn(sink: Arc<dyn SummarySink>, flush_interval: Duration) -> Self {
        Self::spawn_with_sink_timeout(sink, flush_interval, DEFAULT_SINK_TIMEOUT)
    }

    pub fn spawn_with_sink_timeout(
        sink: Arc<dyn SummarySink>,
        flush_interval: Duration,
        sink_timeout: Duration,
    ) -> Self {
        let inner = Arc::new(AggregatorInner {
            buffer: Mutex::new(Vec::new()),
            sink,
            sink_timeout,
        });

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let flusher = inner.clone();
        let flush_task = tokio::spawn(async move {
            let mut ticker = interval(flush_interval);
            // If a flush overruns the interval, skip the missed ticks instead
            // of firing them back-to-back.
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick of a tokio interval fires immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => flusher.flush().await,
                    _ = shutdown_rx.recv() => break,
                }
            }
        });

        Self {
            inner,
            shutdown_tx,
            flush_task: Mutex::new(Some(flush_task)),
        }
    }

    /// Number of trails currently buffered.
    pub fn pending_count(&self) -> usize {
        self.inner
            .buffer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Run one flush cycle now, outside the timer.
    pub async fn flush_now(&self) {
        self.inner.flush().await;
    }

    /// Stop the timer task and run a terminal flush of whatever is buffered.
    ///
    /// Idempotent; later calls only re-run an (empty) flush.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
        let task = {
            let mut guard = self.flush_task.lock().unwrap_or_else(|e| e.into_inner());
            guard.take()
        };
        if let Some(task) = task {
            let _ = task.await;
        }
        self.inner.flush().await;
    }
}

#[async_trait]
impl TrailObserver for TrailAggregator {
    async fn observe(&self, trail: Trail) -> anyhow::Result<()> {
        self.inner.append(trail);
        Ok(())
    }
}
