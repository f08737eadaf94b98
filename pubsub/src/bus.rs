//! In-memory event bus.
//!
//! The bus keeps a registry of `subscriber -> query -> outbox`. Publishing
//! matches every registered query against the event's tags and delivers to
//! each matching outbox:
//!
//! - unbuffered outboxes: the publisher waits until the consumer takes the
//!   message;
//! - buffered outboxes: delivery never blocks; a subscriber whose buffer is
//!   full is evicted with [`CancelReason::OutOfCapacity`].
//!
//! The registry lock is never held across an `.await`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tessel_types::{EventData, EventDataTx};
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::subscriber::{deliver_unbuffered, CancelReason, EventSubscriber, Message, Subscription};
use crate::{BusError, Query};

struct Outbox {
    query: Query,
    unbuffered: bool,
    tx: mpsc::Sender<Message>,
    cancel: watch::Sender<Option<CancelReason>>,
}

impl Outbox {
    /// Record the reason before the sender is dropped so receivers that see
    /// the channel close can always read it.
    fn cancel(self, reason: CancelReason) {
        self.cancel.send_replace(Some(reason));
    }
}

#[derive(Default)]
struct Registry {
    clients: HashMap<String, HashMap<Query, Outbox>>,
    stopped: bool,
}

impl Registry {
    fn remove(&mut self, subscriber: &str, query: &Query) -> Option<Outbox> {
        let subs = self.clients.get_mut(subscriber)?;
        let outbox = subs.remove(query);
        if subs.is_empty() {
            self.clients.remove(subscriber);
        }
        outbox
    }
}

struct Target {
    subscriber: String,
    query: Query,
    unbuffered: bool,
    tx: mpsc::Sender<Message>,
}

/// Process-wide publish/subscribe bus.
#[derive(Default)]
pub struct EventBus {
    registry: Mutex<Registry>,
    published: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_running(&self) -> bool {
        !self.registry().stopped
    }

    /// Total number of events published since creation.
    pub fn events_published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    fn register(
        &self,
        subscriber: &str,
        query: Query,
        capacity: usize,
    ) -> Result<Subscription, BusError> {
        let mut registry = self.registry();
        if registry.stopped {
            return Err(BusError::Stopped);
        }
        let subs = registry.clients.entry(subscriber.to_string()).or_default();
        if subs.contains_key(&query) {
            return Err(BusError::AlreadySubscribed);
        }

        // Unbuffered delivery is a capacity-1 channel drained before the
        // publisher moves on.
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (cancel_tx, cancel_rx) = watch::channel(None);
        subs.insert(
            query.clone(),
            Outbox {
                query: query.clone(),
                unbuffered: capacity == 0,
                tx,
                cancel: cancel_tx,
            },
        );
        debug!(subscriber, query = %query, capacity, "subscription registered");
        Ok(Subscription::new(query, capacity, rx, cancel_rx))
    }

    /// Forcefully cancel one subscription with the given reason.
    pub fn cancel(
        &self,
        subscriber: &str,
        query: &Query,
        reason: CancelReason,
    ) -> Result<(), BusError> {
        let outbox = self
            .registry()
            .remove(subscriber, query)
            .ok_or(BusError::SubscriptionNotFound)?;
        debug!(subscriber, query = %query, reason = %reason, "subscription cancelled");
        outbox.cancel(reason);
        Ok(())
    }

    /// Publish an event to every subscription whose query matches its tags.
    ///
    /// Returns the number of subscriptions the event was handed to.
    pub async fn publish(&self, data: EventData) -> usize {
        self.published.fetch_add(1, Ordering::Relaxed);
        let events = data.tags();

        let targets: Vec<Target> = {
            let registry = self.registry();
            if registry.stopped {
                return 0;
            }
            registry
                .clients
                .iter()
                .flat_map(|(subscriber, subs)| {
                    subs.values()
                        .filter(|outbox| outbox.query.matches(&events))
                        .map(move |outbox| Target {
                            subscriber: subscriber.clone(),
                            query: outbox.query.clone(),
                            unbuffered: outbox.unbuffered,
                            tx: outbox.tx.clone(),
                        })
                })
                .collect()
        };

        let mut delivered = 0;
        for target in targets {
            let msg = Message {
                query: target.query.to_string(),
                data: data.clone(),
                events: events.clone(),
            };
            if target.unbuffered {
                if deliver_unbuffered(&target.tx, msg).await.is_ok() {
                    delivered += 1;
                }
                continue;
            }
            match target.tx.try_send(msg) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(
                        subscriber = %target.subscriber,
                        query = %target.query,
                        "subscriber buffer full, evicting"
                    );
                    self.evict(&target);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(subscriber = %target.subscriber, "subscriber receiver dropped");
                }
            }
        }
        delivered
    }

    /// Publish a transaction inclusion event.
    pub async fn publish_tx(&self, data: EventDataTx) -> usize {
        self.publish(EventData::Tx(data)).await
    }

    fn evict(&self, target: &Target) {
        let mut registry = self.registry();
        // Only evict the outbox we tried to deliver to; the subscriber may
        // already have resubscribed under the same query.
        let same = registry
            .clients
            .get(&target.subscriber)
            .and_then(|subs| subs.get(&target.query))
            .is_some_and(|outbox| outbox.tx.same_channel(&target.tx));
        if same {
            if let Some(outbox) = registry.remove(&target.subscriber, &target.query) {
                outbox.cancel(CancelReason::OutOfCapacity);
            }
        }
    }

    /// Stop the bus. Every subscription is cancelled with
    /// [`CancelReason::Shutdown`] and further subscribes are refused.
    pub fn stop(&self) {
        let drained: Vec<Outbox> = {
            let mut registry = self.registry();
            registry.stopped = true;
            registry
                .clients
                .drain()
                .flat_map(|(_, subs)| subs.into_values())
                .collect()
        };
        debug!(subscriptions = drained.len(), "event bus stopped");
        for outbox in drained {
            outbox.cancel(CancelReason::Shutdown);
        }
    }
}

#[async_trait]
impl EventSubscriber for EventBus {
    async fn subscribe(
        &self,
        subscriber: &str,
        query: Query,
        capacity: usize,
    ) -> Result<Subscription, BusError> {
        self.register(subscriber, query, capacity)
    }

    fn unsubscribe(&self, subscriber: &str, query: &Query) -> Result<(), BusError> {
        self.cancel(subscriber, query, CancelReason::Unsubscribed)
    }

    fn unsubscribe_all(&self, subscriber: &str) -> Result<(), BusError> {
        let subs = self
            .registry()
            .clients
            .remove(subscriber)
            .ok_or(BusError::ClientNotFound)?;
        debug!(subscriber, count = subs.len(), "all subscriptions removed");
        for outbox in subs.into_values() {
            outbox.cancel(CancelReason::Unsubscribed);
        }
        Ok(())
    }

    fn num_clients(&self) -> usize {
        self.registry().clients.len()
    }

    fn num_client_subscriptions(&self, subscriber: &str) -> usize {
        self.registry()
            .clients
            .get(subscriber)
            .map_or(0, HashMap::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tessel_types::{ResponseDeliverTx, Tx};

    fn tx_event(payload: &[u8], height: u64) -> EventDataTx {
        EventDataTx {
            height,
            index: 0,
            tx: Tx::new(payload.to_vec()),
            result: ResponseDeliverTx::default(),
        }
    }

    fn all_txs() -> Query {
        Query::parse("tm.event = 'Tx'").unwrap()
    }

    #[tokio::test]
    async fn delivers_only_matching_events() {
        let bus = EventBus::new();
        let target = Tx::new(b"mine".to_vec());
        let mut sub = bus
            .subscribe("alice", Query::tx_for(&target.hash()), 4)
            .await
            .unwrap();

        assert_eq!(bus.publish_tx(tx_event(b"other", 1)).await, 0);
        assert_eq!(bus.publish_tx(tx_event(b"mine", 2)).await, 1);

        let msg = sub.next().await.unwrap();
        match msg.data {
            EventData::Tx(data) => assert_eq!(data.height, 2),
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(msg.query, Query::tx_for(&target.hash()).to_string());
        assert_eq!(bus.events_published(), 2);
    }

    #[tokio::test]
    async fn counts_clients_and_subscriptions() {
        let bus = EventBus::new();
        let _a1 = bus.subscribe("alice", all_txs(), 1).await.unwrap();
        let _a2 = bus
            .subscribe("alice", Query::parse("tx.height > 3").unwrap(), 1)
            .await
            .unwrap();
        let _b1 = bus.subscribe("bob", all_txs(), 1).await.unwrap();

        assert_eq!(bus.num_clients(), 2);
        assert_eq!(bus.num_client_subscriptions("alice"), 2);
        assert_eq!(bus.num_client_subscriptions("carol"), 0);
    }

    #[tokio::test]
    async fn duplicate_subscription_rejected() {
        let bus = EventBus::new();
        let _sub = bus.subscribe("alice", all_txs(), 1).await.unwrap();
        assert_eq!(
            bus.subscribe("alice", all_txs(), 1).await.unwrap_err(),
            BusError::AlreadySubscribed
        );
    }

    #[tokio::test]
    async fn unsubscribe_cancels_with_reason() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe("alice", all_txs(), 1).await.unwrap();
        bus.unsubscribe("alice", &all_txs()).unwrap();

        assert!(sub.next().await.is_none());
        assert_eq!(sub.err(), Some(CancelReason::Unsubscribed));
        assert_eq!(bus.num_clients(), 0);
        assert_eq!(
            bus.unsubscribe("alice", &all_txs()),
            Err(BusError::SubscriptionNotFound)
        );
    }

    #[tokio::test]
    async fn unsubscribe_all_removes_every_query() {
        let bus = EventBus::new();
        let s1 = bus.subscribe("alice", all_txs(), 1).await.unwrap();
        let s2 = bus
            .subscribe("alice", Query::parse("tx.height > 3").unwrap(), 1)
            .await
            .unwrap();
        bus.unsubscribe_all("alice").unwrap();

        assert_eq!(s1.err(), Some(CancelReason::Unsubscribed));
        assert_eq!(s2.err(), Some(CancelReason::Unsubscribed));
        assert_eq!(bus.unsubscribe_all("alice"), Err(BusError::ClientNotFound));
    }

    #[tokio::test]
    async fn full_buffer_evicts_subscriber() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe("slow", all_txs(), 1).await.unwrap();

        assert_eq!(bus.publish_tx(tx_event(b"a", 1)).await, 1);
        assert_eq!(bus.publish_tx(tx_event(b"b", 2)).await, 0);

        assert_eq!(sub.err(), Some(CancelReason::OutOfCapacity));
        assert_eq!(bus.num_client_subscriptions("slow"), 0);
        // The message buffered before eviction is still readable.
        assert!(sub.next().await.is_some());
        assert!(sub.next().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn unbuffered_publish_waits_for_reader() {
        let bus = std::sync::Arc::new(EventBus::new());
        let mut sub = bus.subscribe("sync", all_txs(), 0).await.unwrap();

        let publisher = {
            let bus = bus.clone();
            tokio::spawn(async move { bus.publish_tx(tx_event(b"a", 1)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!publisher.is_finished());

        assert!(sub.next().await.is_some());
        assert_eq!(publisher.await.unwrap(), 1);
        assert_eq!(sub.err(), None);
    }

    #[tokio::test]
    async fn stop_cancels_everything_and_refuses_new_subscribers() {
        let bus = EventBus::new();
        let sub = bus.subscribe("alice", all_txs(), 1).await.unwrap();
        let mut signal = sub.cancel_signal();

        bus.stop();

        assert_eq!(signal.cancelled().await, CancelReason::Shutdown);
        assert!(!bus.is_running());
        assert_eq!(
            bus.subscribe("bob", all_txs(), 1).await.unwrap_err(),
            BusError::Stopped
        );
        assert_eq!(bus.publish_tx(tx_event(b"late", 9)).await, 0);
    }
}
