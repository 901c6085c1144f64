//! Observer registry: subscription tokens and fire-and-forget trail fanout
//!
//! Trails are pushed into an unbounded channel and fanned out by a dedicated
//! dispatch task, so the call path that produced a trail never waits for
//! observer delivery. A single consumer task also preserves completion order:
//! every observer sees its trails in the order the originating commands
//! finished.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::tracking::trail::Trail;

/// A subscriber to the trail stream.
///
/// Returning an error from `observe` is isolated to this subscriber: the
/// registry logs it and continues delivering to the rest.
#[async_trait]
pub trait TrailObserver: Send + Sync {
    async fn observe(&self, trail: Trail) -> anyhow::Result<()>;
}

/// Adapter wrapping an async closure as a [`TrailObserver`].
pub struct FnObserver<F>(pub F);

#[async_trait]
impl<F, Fut> TrailObserver for FnObserver<F>
where
    F: Fn(Trail) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = anyhow::Result<()>> + Send,
{
    async fn observe(&self, trail: Trail) -> anyhow::Result<()> {
        (self.0)(trail).await
    }
}

type SubscriberMap = DashMap<u64, Arc<dyn TrailObserver>>;

/// Tracks active subscriptions and fans trails out to them.
pub struct ObserverRegistry {
    subscribers: Arc<SubscriberMap>,
    sender: Mutex<Option<mpsc::UnboundedSender<Trail>>>,
    dispatch_task: Mutex<Option<JoinHandle<()>>>,
    next_id: AtomicU64,
}

impl ObserverRegistry {
    /// Create a registry and spawn its dispatch task.
    pub fn new() -> Self {
        let subscribers: Arc<SubscriberMap> = Arc::new(DashMap::new());
        let (tx, mut rx) = mpsc::unbounded_channel::<Trail>();

        let fanout = subscribers.clone();
        let dispatch_task = tokio::spawn(async move {
            while let Some(trail) = rx.recv().await {
                // Snapshot the live subscribers so a dispose during delivery
                // cannot invalidate the iteration.
                let targets: Vec<Arc<dyn TrailObserver>> =
                    fanout.iter().map(|entry| entry.value().clone()).collect();
                for observer in targets {
                    // Each observer gets its own independent copy.
                    if let Err(err) = observer.observe(trail.clone()).await {
                        tracing::warn!(
                            query = %trail.query,
                            error = %err,
                            "trail observer failed, continuing fanout"
                        );
                    }
                }
            }
        });

        Self {
            subscribers,
            sender: Mutex::new(Some(tx)),
            dispatch_task: Mutex::new(Some(dispatch_task)),
            next_id: AtomicU64::new(0),
        }
    }

    /// Register an observer and return the token controlling its membership.
    pub fn subscribe(&self, observer: Arc<dyn TrailObserver>) -> SubscriptionToken {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.insert(id, observer);
        SubscriptionToken {
            id,
            subscribers: Arc::downgrade(&self.subscribers),
            disposed: AtomicBool::new(false),
        }
    }

    /// Register an async closure as an observer.
    pub fn subscribe_fn<F, Fut>(&self, callback: F) -> SubscriptionToken
    where
        F: Fn(Trail) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.subscribe(Arc::new(FnObserver(callback)))
    }

    /// Queue a trail for delivery to every live subscriber.
    ///
    /// Never blocks; if the registry is already closed the trail is dropped.
    pub fn dispatch(&self, trail: Trail) {
        let sender = self.sender.lock().unwrap_or_else(|e| e.into_inner());
        match sender.as_ref() {
            Some(tx) => {
                // Send only fails if the dispatch task is gone.
                let _ = tx.send(trail);
            }
            None => {
                tracing::trace!(query = %trail.query, "registry closed, trail dropped");
            }
        }
    }

    /// Dispose every subscription at once. Used by connection teardown.
    pub fn dispose_all(&self) {
        self.subscribers.clear();
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Close the dispatch channel and wait for in-flight deliveries to drain.
    ///
    /// Best-effort: trails dispatched after close are dropped.
    pub async fn close(&self) {
        let sender = {
            let mut guard = self.sender.lock().unwrap_or_else(|e| e.into_inner());
            guard.take()
        };
        drop(sender);
        let task = {
            let mut guard = self.dispatch_task.lock().unwrap_or_else(|e| e.into_inner());
            guard.take()
        };
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}

impl Default for ObserverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle controlling one observer's membership in fanout dispatch.
///
/// Two states, active and disposed; the transition is one-way and idempotent.
/// Disposal removes the registry's reference to the observer; deliveries
/// already in flight complete, no future trail is delivered. A token also
/// reads as disposed when the registry itself discarded the subscription
/// ([`ObserverRegistry::dispose_all`], connection teardown), so the token
/// never claims a membership the registry no longer holds.
pub struct SubscriptionToken {
    id: u64,
    subscribers: Weak<SubscriberMap>,
    disposed: AtomicBool,
}

impl SubscriptionToken {
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(subscribers) = self.subscribers.upgrade() {
            subscribers.remove(&self.id);
        }
    }

    pub fn is_disposed(&self) -> bool {
        if self.disposed.load(Ordering::SeqCst) {
            return true;
        }
        match self.subscribers.upgrade() {
            Some(subscribers) => !subscribers.contains_key(&self.id),
            None => true,
        }
    }
}
