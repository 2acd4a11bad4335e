//! Push delivery of status snapshots to observers keyed by podcast id.
//!
//! The registry map is only write-locked to add or remove a topic. Publishing
//! takes the read lock long enough to clone the topic handle, then delivers under
//! that topic's own lock, so broadcasts for unrelated podcasts never serialize on
//! each other.

use crate::error::{PodgenError, Result};
use crate::status::StatusUpdate;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

/// Receives status updates for one podcast.
///
/// Delivery must not block: it runs inline with the publishing transition, while
/// that run's state is locked. Reading status from `deliver` is fine. Cancelling
/// the same podcast or subscribing to it from there deadlocks.
pub trait StatusObserver: Send + Sync {
    /// Returns `PodgenError::ObserverClosed` once the observer can never accept
    /// another update; it is then dropped from the registry.
    fn deliver(&self, update: &StatusUpdate) -> Result<()>;
}

/// Identifies one registration, returned by `subscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
struct Topic {
    observers: Mutex<Vec<(SubscriptionId, Arc<dyn StatusObserver>)>>,
}

#[derive(Default)]
struct Registry {
    topics: RwLock<HashMap<String, Arc<Topic>>>,
    next_id: AtomicU64,
}

/// Shared, cloneable handle to the observer registry.
#[derive(Clone, Default)]
pub struct StatusBroadcaster {
    registry: Arc<Registry>,
}

impl StatusBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, podcast_id: &str, observer: Arc<dyn StatusObserver>) -> SubscriptionId {
        let id = SubscriptionId(self.registry.next_id.fetch_add(1, Ordering::Relaxed));
        let mut topics = self.registry.topics.write();
        let topic = topics.entry(podcast_id.to_string()).or_default();
        topic.observers.lock().push((id, observer));
        tracing::debug!(podcast_id, subscription = id.0, "Observer subscribed");
        id
    }

    /// Returns false when `id` was not registered for `podcast_id`.
    pub fn unsubscribe(&self, podcast_id: &str, id: SubscriptionId) -> bool {
        let mut topics = self.registry.topics.write();
        let Some(topic) = topics.get(podcast_id) else {
            return false;
        };
        let (removed, now_empty) = {
            let mut observers = topic.observers.lock();
            let before = observers.len();
            observers.retain(|(sid, _)| *sid != id);
            (observers.len() != before, observers.is_empty())
        };
        if now_empty {
            topics.remove(podcast_id);
        }
        if removed {
            tracing::debug!(podcast_id, subscription = id.0, "Observer unsubscribed");
        }
        removed
    }

    /// Deliver `update` to every current observer of `podcast_id`, best-effort.
    ///
    /// Returns how many observers accepted the update.
    pub fn publish(&self, podcast_id: &str, update: &StatusUpdate) -> usize {
        let topic = {
            let topics = self.registry.topics.read();
            match topics.get(podcast_id) {
                Some(topic) => Arc::clone(topic),
                None => return 0,
            }
        };

        let mut delivered = 0;
        let mut closed = Vec::new();
        {
            let observers = topic.observers.lock();
            for (id, observer) in observers.iter() {
                match observer.deliver(update) {
                    Ok(()) => delivered += 1,
                    Err(PodgenError::ObserverClosed) => closed.push(*id),
                    Err(e) => {
                        tracing::warn!(
                            podcast_id,
                            subscription = id.0,
                            stage = %update.stage,
                            "Status delivery failed: {}",
                            e
                        );
                    }
                }
            }
        }

        for id in closed {
            tracing::debug!(podcast_id, subscription = id.0, "Pruning closed observer");
            self.unsubscribe(podcast_id, id);
        }
        delivered
    }

    /// Subscribe a channel-backed observer and return the receiving end.
    pub fn channel(&self, podcast_id: &str) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.subscribe(podcast_id, Arc::new(ChannelObserver::new(tx)));
        Subscription {
            broadcaster: self.clone(),
            podcast_id: podcast_id.to_string(),
            id,
            rx,
        }
    }

    pub fn subscriber_count(&self, podcast_id: &str) -> usize {
        self.registry
            .topics
            .read()
            .get(podcast_id)
            .map_or(0, |topic| topic.observers.lock().len())
    }
}

/// Observer that forwards updates into an unbounded tokio channel.
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<StatusUpdate>,
}

impl ChannelObserver {
    pub fn new(tx: mpsc::UnboundedSender<StatusUpdate>) -> Self {
        Self { tx }
    }
}

impl StatusObserver for ChannelObserver {
    fn deliver(&self, update: &StatusUpdate) -> Result<()> {
        self.tx
            .send(update.clone())
            .map_err(|_| PodgenError::ObserverClosed)
    }
}

/// Live registration that yields updates; unsubscribes when dropped.
pub struct Subscription {
    broadcaster: StatusBroadcaster,
    podcast_id: String,
    id: SubscriptionId,
    rx: mpsc::UnboundedReceiver<StatusUpdate>,
}

impl Subscription {
    pub fn podcast_id(&self) -> &str {
        &self.podcast_id
    }

    /// Wait for the next update. `None` once unsubscribed from the registry.
    pub async fn recv(&mut self) -> Option<StatusUpdate> {
        self.rx.recv().await
    }

    /// Next update if one is already queued.
    pub fn try_recv(&mut self) -> Option<StatusUpdate> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.broadcaster.unsubscribe(&self.podcast_id, self.id);
    }
}
