//! In-memory signal storage and pub/sub fan-out (C3).
//!
//! Grounded on `lumehaven/state/store.py`'s `SignalStore`: a single-writer
//! map of the latest `Signal` per id, plus bounded per-subscriber queues
//! fed by `publish`. Where the original relies on `asyncio.Queue.put_nowait`
//! raising `QueueFull`, this uses `mpsc::Sender::try_send`; where it relies
//! on `try/finally` to unregister a subscriber generator, this uses `Drop`.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use futures::Stream;
use serde::Serialize;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use crate::signal::Signal;

struct DropStats {
    count: u32,
    last_logged: Instant,
}

/// Snapshot of store state for `/metrics`. Field shape matches the
/// upstream's `MetricsResponse` exactly.
#[derive(Debug, Serialize)]
pub struct StoreMetrics {
    pub subscribers: SubscriberMetrics,
    pub signals: SignalMetrics,
}

#[derive(Debug, Serialize)]
pub struct SubscriberMetrics {
    pub total: usize,
    pub slow: usize,
}

#[derive(Debug, Serialize)]
pub struct SignalMetrics {
    pub stored: usize,
}

pub struct SignalStore {
    signals: Mutex<HashMap<String, Signal>>,
    subscribers: Mutex<HashMap<u64, mpsc::Sender<Signal>>>,
    drop_stats: Mutex<HashMap<u64, DropStats>>,
    next_subscriber_id: AtomicU64,
    subscriber_queue_size: usize,
    drop_log_interval: Duration,
}

impl SignalStore {
    pub fn new(subscriber_queue_size: usize, drop_log_interval: Duration) -> Self {
        SignalStore {
            signals: Mutex::new(HashMap::new()),
            subscribers: Mutex::new(HashMap::new()),
            drop_stats: Mutex::new(HashMap::new()),
            next_subscriber_id: AtomicU64::new(0),
            subscriber_queue_size,
            drop_log_interval,
        }
    }

    pub async fn get_all(&self) -> HashMap<String, Signal> {
        self.signals.lock().await.clone()
    }

    pub async fn get(&self, signal_id: &str) -> Option<Signal> {
        self.signals.lock().await.get(signal_id).cloned()
    }

    pub async fn set(&self, signal: Signal) {
        self.signals.lock().await.insert(signal.id.clone(), signal);
    }

    pub async fn set_many(&self, signals: impl IntoIterator<Item = Signal>) {
        let mut guard = self.signals.lock().await;
        let mut count = 0;
        for signal in signals {
            guard.insert(signal.id.clone(), signal);
            count += 1;
        }
        drop(guard);
        debug!(count, "stored signals");
    }

    /// Register a new subscriber and return a `Stream<Item = Signal>` that
    /// yields every subsequently published signal. Dropping the returned
    /// `Subscription` unregisters it, even if the caller never polls it to
    /// completion.
    pub async fn subscribe(self: &Arc<Self>) -> Subscription {
        let id = self.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.subscriber_queue_size);
        let mut subs = self.subscribers.lock().await;
        subs.insert(id, tx);
        debug!(total = subs.len(), "registered subscriber");
        Subscription {
            id,
            store: self.clone(),
            receiver: rx,
        }
    }

    async fn unregister_subscriber(&self, id: u64) {
        let mut subs = self.subscribers.lock().await;
        subs.remove(&id);
        let total = subs.len();
        drop(subs);
        self.drop_stats.lock().await.remove(&id);
        debug!(total, "unregistered subscriber");
    }

    /// Store `signal` and fan it out to every subscriber. A subscriber
    /// whose queue is full has the update dropped, not blocked on; see
    /// `log_drop_throttled` for the rate-limited warning.
    pub async fn publish(&self, signal: Signal) {
        self.set(signal.clone()).await;

        let targets: Vec<(u64, mpsc::Sender<Signal>)> = self
            .subscribers
            .lock()
            .await
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();

        for (id, tx) in targets {
            match tx.try_send(signal.clone()) {
                Ok(()) => {
                    self.drop_stats.lock().await.remove(&id);
                }
                Err(TrySendError::Full(_)) => {
                    self.log_drop_throttled(id, &signal.id).await;
                }
                Err(TrySendError::Closed(_)) => {
                    // The subscription was dropped; its own Drop impl will
                    // unregister it momentarily.
                }
            }
        }
    }

    /// Log a full-queue drop immediately on the first occurrence for a
    /// subscriber, then at most once per `drop_log_interval`, summarizing
    /// how many updates were dropped in between.
    async fn log_drop_throttled(&self, id: u64, signal_id: &str) {
        let now = Instant::now();
        let mut stats = self.drop_stats.lock().await;
        match stats.get_mut(&id) {
            None => {
                warn!(signal_id, "subscriber queue full, dropping update");
                stats.insert(
                    id,
                    DropStats {
                        count: 0,
                        last_logged: now,
                    },
                );
            }
            Some(entry) => {
                entry.count += 1;
                if now.duration_since(entry.last_logged) >= self.drop_log_interval {
                    warn!(
                        dropped = entry.count,
                        interval_secs = self.drop_log_interval.as_secs(),
                        signal_id,
                        "subscriber queue full, dropped updates"
                    );
                    entry.count = 0;
                    entry.last_logged = now;
                } else {
                    // suppressed; counter already incremented above
                }
            }
        }
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.lock().await.len()
    }

    pub async fn metrics(&self) -> StoreMetrics {
        let total = self.subscribers.lock().await.len();
        let slow = self.drop_stats.lock().await.len();
        let stored = self.signals.lock().await.len();
        StoreMetrics {
            subscribers: SubscriberMetrics { total, slow },
            signals: SignalMetrics { stored },
        }
    }
}

/// A live subscription to the store's publish stream. Yields `Signal`s via
/// `Stream`; unregisters itself from the store on drop.
pub struct Subscription {
    id: u64,
    store: Arc<SignalStore>,
    receiver: mpsc::Receiver<Signal>,
}

impl Stream for Subscription {
    type Item = Signal;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Signal>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let store = self.store.clone();
        let id = self.id;
        tokio::spawn(async move {
            store.unregister_subscriber(id).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::{SignalType, SignalValue};
    use futures::StreamExt;

    fn test_store() -> Arc<SignalStore> {
        Arc::new(SignalStore::new(4, Duration::from_secs(60)))
    }

    fn sample(id: &str, n: i64) -> Signal {
        Signal::new(id, SignalValue::Integer(n), SignalType::Number)
    }

    #[tokio::test]
    async fn set_and_get_round_trips() {
        let store = test_store();
        store.set(sample("a", 1)).await;
        let got = store.get("a").await.unwrap();
        assert_eq!(got.value, SignalValue::Integer(1));
        assert!(store.get("missing").await.is_none());
    }

    #[tokio::test]
    async fn set_many_stores_all() {
        let store = test_store();
        store.set_many(vec![sample("a", 1), sample("b", 2)]).await;
        let all = store.get_all().await;
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn publish_delivers_to_subscribers_and_updates_store() {
        let store = test_store();
        let mut sub = store.subscribe().await;
        store.publish(sample("a", 1)).await;

        let received = sub.next().await.unwrap();
        assert_eq!(received.id, "a");
        assert_eq!(store.get("a").await.unwrap().value, SignalValue::Integer(1));
    }

    #[tokio::test]
    async fn dropping_subscription_unregisters_it() {
        let store = test_store();
        let sub = store.subscribe().await;
        assert_eq!(store.subscriber_count().await, 1);
        drop(sub);

        // unregistration happens on a spawned task; give it a tick.
        tokio::task::yield_now().await;
        for _ in 0..50 {
            if store.subscriber_count().await == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert_eq!(store.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn full_queue_drops_update_without_blocking_publish() {
        let store = SignalStore::new(1, Duration::from_secs(60));
        let store = Arc::new(store);
        let mut sub = store.subscribe().await;

        // Fill the bounded queue, then overflow it.
        store.publish(sample("a", 1)).await;
        store.publish(sample("a", 2)).await;

        let metrics = store.metrics().await;
        assert_eq!(metrics.subscribers.slow, 1);

        // The queued item is still the first one; the second was dropped.
        let received = sub.next().await.unwrap();
        assert_eq!(received.value, SignalValue::Integer(1));
    }

    #[tokio::test]
    async fn successful_delivery_clears_drop_stats() {
        let store = Arc::new(SignalStore::new(1, Duration::from_secs(60)));
        let mut sub = store.subscribe().await;

        store.publish(sample("a", 1)).await;
        store.publish(sample("a", 2)).await; // dropped, queue full
        assert_eq!(store.metrics().await.subscribers.slow, 1);

        sub.next().await.unwrap(); // drains the queue
        store.publish(sample("a", 3)).await; // delivers cleanly
        assert_eq!(store.metrics().await.subscribers.slow, 0);
    }
}
