//! Event subscriptions on behalf of RPC consumers.
//!
//! [`SubscriptionManager::subscribe`] registers a query on the event bus and
//! spawns one forwarder task per subscription. The forwarder converts bus
//! messages into [`ResultEvent`]s on the consumer's channel and keeps the
//! subscription alive across transient cancellations:
//!
//! - [`CancelReason::OutOfCapacity`]: resubscribe with exponential backoff
//!   (10 ms, 20 ms, 40 ms, ... capped by `resubscribe_max_backoff_ms`),
//!   retrying until success or process shutdown;
//! - [`CancelReason::Unsubscribed`] / [`CancelReason::Shutdown`]: stop.
//!
//! Backoff sleeps are interruptible by the shutdown signal.
//!
//! Admission is checked and the bus registration made under one lock, so
//! concurrent subscribes cannot overshoot the configured limits.

use std::sync::Arc;
use std::time::Duration;

use tessel_pubsub::{
    deliver_unbuffered, BusError, CancelReason, EventSubscriber, Message, Query, Subscription,
    DEFAULT_OUT_CAPACITY,
};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn, Instrument};

use crate::config::RpcConfig;
use crate::error::{AdmissionLimit, RpcError};
use crate::metrics::RpcMetrics;
use crate::responses::ResultEvent;
use crate::shutdown::ShutdownSignal;
use crate::tracing_spans::subscription_span;

/// Subscriber identity reserved for subscriptions made by the node itself.
pub const LOCAL_SUBSCRIBER: &str = "";

/// Delay before the first resubscription attempt.
pub const RESUBSCRIBE_BASE_DELAY: Duration = Duration::from_millis(10);

/// Delay before resubscription attempt `attempt` (1-based): the base delay
/// doubled per attempt and capped at `max`.
pub fn backoff_delay(attempt: u32, max: Duration) -> Duration {
    let shift = attempt.saturating_sub(1).min(31);
    RESUBSCRIBE_BASE_DELAY.saturating_mul(1u32 << shift).min(max)
}

pub struct SubscriptionManager {
    bus: Arc<dyn EventSubscriber>,
    max_clients: usize,
    max_subscriptions_per_client: usize,
    max_backoff: Duration,
    shutdown: ShutdownSignal,
    metrics: Arc<RpcMetrics>,
    admission: Mutex<()>,
}

impl SubscriptionManager {
    pub fn new(
        bus: Arc<dyn EventSubscriber>,
        config: &RpcConfig,
        shutdown: ShutdownSignal,
        metrics: Arc<RpcMetrics>,
    ) -> Self {
        Self {
            bus,
            max_clients: config.max_subscription_clients,
            max_subscriptions_per_client: config.max_subscriptions_per_client,
            max_backoff: config.resubscribe_max_backoff(),
            shutdown,
            metrics,
            admission: Mutex::new(()),
        }
    }

    /// Reject the request if the bus is already at either admission limit.
    fn check_admission(&self, subscriber: &str) -> Result<(), RpcError> {
        if self.bus.num_clients() >= self.max_clients {
            return Err(AdmissionLimit::Clients {
                max: self.max_clients,
            }
            .into());
        }
        if self.bus.num_client_subscriptions(subscriber) >= self.max_subscriptions_per_client {
            return Err(AdmissionLimit::SubscriptionsPerClient {
                max: self.max_subscriptions_per_client,
            }
            .into());
        }
        Ok(())
    }

    /// Check admission and register on the bus as one step.
    async fn admit(
        &self,
        subscriber: &str,
        query: Query,
        capacity: usize,
    ) -> Result<Subscription, RpcError> {
        let _admission = self.admission.lock().await;
        self.check_admission(subscriber)?;
        self.bus
            .subscribe(subscriber, query, capacity)
            .await
            .map_err(|e| RpcError::SubscriptionSetupFailed(e.to_string()))
    }

    /// Subscribe `subscriber` to events matching `query`.
    ///
    /// `capacity` sizes the consumer's channel; `None` uses the bus default
    /// and `Some(0)` makes delivery unbuffered. Events arrive on the returned
    /// receiver until the subscription is terminally cancelled, at which
    /// point the channel closes.
    pub async fn subscribe(
        &self,
        subscriber: &str,
        query: &str,
        capacity: Option<usize>,
    ) -> Result<mpsc::Receiver<ResultEvent>, RpcError> {
        reject_reserved(subscriber)?;
        let query =
            Query::parse(query).map_err(|e| RpcError::SubscriptionSetupFailed(e.to_string()))?;
        let capacity = capacity.unwrap_or(DEFAULT_OUT_CAPACITY);

        info!(subscriber, query = %query, "subscribe to query");
        let sub = self.admit(subscriber, query.clone(), capacity).await?;

        let (out_tx, out_rx) = mpsc::channel(capacity.max(1));
        let forwarder = Forwarder {
            bus: self.bus.clone(),
            subscriber: subscriber.to_string(),
            query,
            capacity,
            out: out_tx,
            shutdown: self.shutdown.clone(),
            max_backoff: self.max_backoff,
            metrics: self.metrics.clone(),
        };
        let span = subscription_span(subscriber, forwarder.query.as_str());
        self.metrics.active_subscriptions.inc();
        tokio::spawn(forwarder.run(sub).instrument(span));
        Ok(out_rx)
    }

    /// Register a subscription directly, without a forwarder, bounded by
    /// `timeout`. Subject to the same admission limits as
    /// [`subscribe`](Self::subscribe).
    ///
    /// The returned guard unsubscribes when dropped.
    pub async fn subscribe_bounded(
        &self,
        subscriber: &str,
        query: Query,
        capacity: usize,
        timeout: Duration,
    ) -> Result<SubscriptionGuard, RpcError> {
        let sub = tokio::time::timeout(timeout, self.admit(subscriber, query, capacity))
            .await
            .map_err(|_| {
                RpcError::SubscriptionSetupFailed(format!("timed out after {timeout:?}"))
            })??;
        Ok(SubscriptionGuard {
            bus: self.bus.clone(),
            subscriber: subscriber.to_string(),
            sub,
        })
    }

    pub fn unsubscribe(&self, subscriber: &str, query: &str) -> Result<(), RpcError> {
        reject_reserved(subscriber)?;
        let query = Query::parse(query)?;
        info!(subscriber, query = %query, "unsubscribe from query");
        self.bus.unsubscribe(subscriber, &query)?;
        Ok(())
    }

    pub fn unsubscribe_all(&self, subscriber: &str) -> Result<(), RpcError> {
        reject_reserved(subscriber)?;
        info!(subscriber, "unsubscribe from all queries");
        self.bus.unsubscribe_all(subscriber)?;
        Ok(())
    }

    pub fn num_clients(&self) -> usize {
        self.bus.num_clients()
    }
}

fn reject_reserved(subscriber: &str) -> Result<(), RpcError> {
    if subscriber == LOCAL_SUBSCRIBER {
        return Err(RpcError::InvalidRequest(
            "subscriber id must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// A bus subscription that is released when dropped.
pub struct SubscriptionGuard {
    bus: Arc<dyn EventSubscriber>,
    subscriber: String,
    sub: Subscription,
}

impl SubscriptionGuard {
    pub fn subscription(&mut self) -> &mut Subscription {
        &mut self.sub
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        match self.bus.unsubscribe(&self.subscriber, self.sub.query()) {
            Ok(()) => {}
            // Already gone: cancelled by the bus or stopped with it.
            Err(BusError::SubscriptionNotFound) | Err(BusError::Stopped) => {
                debug!(subscriber = %self.subscriber, "subscription already released");
            }
            Err(err) => {
                error!(subscriber = %self.subscriber, %err, "error unsubscribing from event bus");
            }
        }
    }
}

enum Step {
    Deliver(Message),
    Closed,
    Cancelled(CancelReason),
    Stop,
}

struct Forwarder {
    bus: Arc<dyn EventSubscriber>,
    subscriber: String,
    query: Query,
    capacity: usize,
    out: mpsc::Sender<ResultEvent>,
    shutdown: ShutdownSignal,
    max_backoff: Duration,
    metrics: Arc<RpcMetrics>,
}

impl Forwarder {
    async fn run(self, mut sub: Subscription) {
        loop {
            let mut cancel = sub.cancel_signal();
            let step = tokio::select! {
                biased;
                _ = self.shutdown.wait() => Step::Stop,
                msg = sub.next() => msg.map_or(Step::Closed, Step::Deliver),
                reason = cancel.cancelled() => Step::Cancelled(reason),
            };

            let reason = match step {
                Step::Deliver(msg) => {
                    if !self.forward(msg).await {
                        debug!("consumer went away");
                        self.release();
                        break;
                    }
                    continue;
                }
                Step::Stop => {
                    self.release();
                    break;
                }
                Step::Closed => cancel.current().unwrap_or(CancelReason::Shutdown),
                Step::Cancelled(reason) => reason,
            };

            if reason != CancelReason::OutOfCapacity {
                debug!(%reason, "subscription ended");
                break;
            }
            error!(%reason, "subscription was cancelled, resubscribing");
            match self.resubscribe().await {
                Some(next) => sub = next,
                None => break,
            }
        }
        self.metrics.active_subscriptions.dec();
    }

    /// Hand one message to the consumer. Returns false once the consumer
    /// has dropped its receiver or the process is stopping.
    async fn forward(&self, msg: Message) -> bool {
        let event = ResultEvent {
            query: msg.query,
            data: msg.data,
            events: msg.events,
        };
        if self.capacity == 0 {
            return tokio::select! {
                res = deliver_unbuffered(&self.out, event) => res.is_ok(),
                _ = self.shutdown.wait() => false,
            };
        }
        match self.out.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(query = %event.query, "wanted to publish ResultEvent, but out channel is full");
                self.metrics.events_dropped.inc();
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    fn release(&self) {
        if let Err(err) = self.bus.unsubscribe(&self.subscriber, &self.query) {
            debug!(%err, "failed to release subscription");
        }
    }

    /// Re-register the query until it succeeds, the bus is stopped, or the
    /// process shuts down.
    async fn resubscribe(&self) -> Option<Subscription> {
        let mut attempt: u32 = 0;
        loop {
            if self.shutdown.is_shutdown() {
                return None;
            }
            match self
                .bus
                .subscribe(&self.subscriber, self.query.clone(), self.capacity)
                .await
            {
                Ok(sub) => {
                    info!(attempts = attempt + 1, "resubscribed");
                    return Some(sub);
                }
                Err(BusError::Stopped) => {
                    debug!("event bus stopped, giving up on resubscription");
                    return None;
                }
                Err(err) => {
                    attempt = attempt.saturating_add(1);
                    let delay = backoff_delay(attempt, self.max_backoff);
                    self.metrics.resubscribe_attempts.inc();
                    warn!(%err, attempt, delay_ms = delay.as_millis() as u64, "failed to resubscribe");
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = self.shutdown.wait() => return None,
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tessel_pubsub::EventBus;
    use tessel_types::{EventDataTx, ResponseDeliverTx, Tx};
    use tokio::time::Instant;

    use crate::shutdown::ShutdownController;

    /// Wraps a real bus and fails every subscribe after the first, until
    /// `failures` runs out. Records when each attempt was made.
    struct FlakyBus {
        inner: Arc<EventBus>,
        failures: Mutex<u32>,
        attempts: Mutex<Vec<Instant>>,
    }

    impl FlakyBus {
        fn new(inner: Arc<EventBus>, failures: u32) -> Self {
            Self {
                inner,
                failures: Mutex::new(failures),
                attempts: Mutex::new(Vec::new()),
            }
        }

        fn attempts(&self) -> Vec<Instant> {
            self.attempts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EventSubscriber for FlakyBus {
        async fn subscribe(
            &self,
            subscriber: &str,
            query: Query,
            capacity: usize,
        ) -> Result<Subscription, BusError> {
            let first = {
                let mut attempts = self.attempts.lock().unwrap();
                attempts.push(Instant::now());
                attempts.len() == 1
            };
            if !first {
                let mut failures = self.failures.lock().unwrap();
                if *failures > 0 {
                    *failures -= 1;
                    return Err(BusError::AlreadySubscribed);
                }
            }
            self.inner.subscribe(subscriber, query, capacity).await
        }

        fn unsubscribe(&self, subscriber: &str, query: &Query) -> Result<(), BusError> {
            self.inner.unsubscribe(subscriber, query)
        }

        fn unsubscribe_all(&self, subscriber: &str) -> Result<(), BusError> {
            self.inner.unsubscribe_all(subscriber)
        }

        fn num_clients(&self) -> usize {
            self.inner.num_clients()
        }

        fn num_client_subscriptions(&self, subscriber: &str) -> usize {
            self.inner.num_client_subscriptions(subscriber)
        }
    }

    /// Wraps a real bus and suspends once inside every subscribe, so
    /// concurrent callers interleave between admission and registration.
    struct YieldingBus {
        inner: Arc<EventBus>,
    }

    #[async_trait]
    impl EventSubscriber for YieldingBus {
        async fn subscribe(
            &self,
            subscriber: &str,
            query: Query,
            capacity: usize,
        ) -> Result<Subscription, BusError> {
            tokio::task::yield_now().await;
            self.inner.subscribe(subscriber, query, capacity).await
        }

        fn unsubscribe(&self, subscriber: &str, query: &Query) -> Result<(), BusError> {
            self.inner.unsubscribe(subscriber, query)
        }

        fn unsubscribe_all(&self, subscriber: &str) -> Result<(), BusError> {
            self.inner.unsubscribe_all(subscriber)
        }

        fn num_clients(&self) -> usize {
            self.inner.num_clients()
        }

        fn num_client_subscriptions(&self, subscriber: &str) -> usize {
            self.inner.num_client_subscriptions(subscriber)
        }
    }

    const QUERY: &str = "tm.event = 'Tx'";

    fn tx_event(height: u64) -> EventDataTx {
        EventDataTx {
            height,
            index: 0,
            tx: Tx::new(height.to_be_bytes().to_vec()),
            result: ResponseDeliverTx::default(),
        }
    }

    fn manager(
        bus: Arc<dyn EventSubscriber>,
        config: &RpcConfig,
    ) -> (SubscriptionManager, ShutdownController) {
        let shutdown = ShutdownController::new();
        let manager =
            SubscriptionManager::new(bus, config, shutdown.signal(), Arc::new(RpcMetrics::new()));
        (manager, shutdown)
    }

    #[test]
    fn backoff_doubles_and_saturates() {
        let max = Duration::from_millis(100);
        assert_eq!(backoff_delay(1, max), Duration::from_millis(10));
        assert_eq!(backoff_delay(2, max), Duration::from_millis(20));
        assert_eq!(backoff_delay(3, max), Duration::from_millis(40));
        assert_eq!(backoff_delay(4, max), Duration::from_millis(80));
        assert_eq!(backoff_delay(5, max), max);
        assert_eq!(backoff_delay(u32::MAX, max), max);
    }

    #[tokio::test]
    async fn events_are_forwarded_in_order() {
        let bus = Arc::new(EventBus::new());
        let (manager, _shutdown) = manager(bus.clone(), &RpcConfig::default());
        let mut rx = manager.subscribe("client", QUERY, Some(10)).await.unwrap();

        bus.publish_tx(tx_event(1)).await;
        bus.publish_tx(tx_event(2)).await;

        for height in [1, 2] {
            let event = rx.recv().await.unwrap();
            assert_eq!(event.query, QUERY);
            assert_eq!(event.events["tx.height"], vec![height.to_string()]);
        }
    }

    #[tokio::test]
    async fn invalid_query_fails_setup() {
        let bus = Arc::new(EventBus::new());
        let (manager, _shutdown) = manager(bus.clone(), &RpcConfig::default());
        let err = manager.subscribe("client", "tm.event =", None).await.unwrap_err();
        assert!(matches!(err, RpcError::SubscriptionSetupFailed(_)));
        assert_eq!(bus.num_clients(), 0);
    }

    #[tokio::test]
    async fn admission_limits_reject_before_touching_the_bus() {
        let bus = Arc::new(EventBus::new());
        let flaky = Arc::new(FlakyBus::new(bus.clone(), 0));
        let config = RpcConfig {
            max_subscription_clients: 1,
            max_subscriptions_per_client: 1,
            ..RpcConfig::default()
        };
        let (manager, _shutdown) = manager(flaky.clone(), &config);
        let _rx = manager.subscribe("a", QUERY, None).await.unwrap();

        let err = manager.subscribe("b", QUERY, None).await.unwrap_err();
        assert!(matches!(
            err,
            RpcError::AdmissionLimitExceeded(AdmissionLimit::Clients { max: 1 })
        ));
        assert_eq!(bus.num_clients(), 1);
        assert_eq!(flaky.attempts().len(), 1);
    }

    #[tokio::test]
    async fn per_client_limit() {
        let bus = Arc::new(EventBus::new());
        let config = RpcConfig {
            max_subscriptions_per_client: 1,
            ..RpcConfig::default()
        };
        let (manager, _shutdown) = manager(bus.clone(), &config);
        let _rx = manager.subscribe("a", QUERY, None).await.unwrap();
        let err = manager
            .subscribe("a", "tm.event = 'NewBlockHeader'", None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RpcError::AdmissionLimitExceeded(AdmissionLimit::SubscriptionsPerClient { max: 1 })
        ));
        assert_eq!(bus.num_client_subscriptions("a"), 1);
    }

    #[tokio::test]
    async fn concurrent_subscribes_respect_client_limit() {
        let bus = Arc::new(EventBus::new());
        let yielding = Arc::new(YieldingBus { inner: bus.clone() });
        let config = RpcConfig {
            max_subscription_clients: 1,
            ..RpcConfig::default()
        };
        let (manager, _shutdown) = manager(yielding, &config);

        let (a, b, c) = tokio::join!(
            manager.subscribe("a", QUERY, None),
            manager.subscribe("b", QUERY, None),
            manager.subscribe("c", QUERY, None),
        );
        let admitted = [a.is_ok(), b.is_ok(), c.is_ok()];
        assert_eq!(admitted.iter().filter(|ok| **ok).count(), 1);
        assert!([a, b, c].into_iter().filter_map(Result::err).all(|err| matches!(
            err,
            RpcError::AdmissionLimitExceeded(AdmissionLimit::Clients { max: 1 })
        )));
        assert_eq!(bus.num_clients(), 1);
    }

    #[tokio::test]
    async fn concurrent_subscribes_respect_per_client_limit() {
        let bus = Arc::new(EventBus::new());
        let yielding = Arc::new(YieldingBus { inner: bus.clone() });
        let config = RpcConfig {
            max_subscriptions_per_client: 2,
            ..RpcConfig::default()
        };
        let (manager, _shutdown) = manager(yielding, &config);

        let results = futures_util::future::join_all(
            ["tm.event = 'Tx'", "tx.height > 1", "tx.height > 2", "tx.height > 3"]
                .into_iter()
                .map(|q| manager.subscribe("a", q, None)),
        )
        .await;
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 2);
        assert_eq!(bus.num_client_subscriptions("a"), 2);
    }

    #[tokio::test]
    async fn reserved_subscriber_is_rejected() {
        let bus = Arc::new(EventBus::new());
        let (manager, _shutdown) = manager(bus.clone(), &RpcConfig::default());
        assert!(matches!(
            manager.subscribe(LOCAL_SUBSCRIBER, QUERY, None).await,
            Err(RpcError::InvalidRequest(_))
        ));
        assert!(matches!(
            manager.unsubscribe(LOCAL_SUBSCRIBER, QUERY),
            Err(RpcError::InvalidRequest(_))
        ));
        assert!(matches!(
            manager.unsubscribe_all(LOCAL_SUBSCRIBER),
            Err(RpcError::InvalidRequest(_))
        ));
        assert_eq!(bus.num_clients(), 0);
    }

    #[tokio::test]
    async fn bounded_subscribe_is_admission_checked() {
        let bus = Arc::new(EventBus::new());
        let config = RpcConfig {
            max_subscription_clients: 1,
            ..RpcConfig::default()
        };
        let (manager, _shutdown) = manager(bus.clone(), &config);
        let _rx = manager.subscribe("a", QUERY, None).await.unwrap();
        let err = manager
            .subscribe_bounded(
                LOCAL_SUBSCRIBER,
                Query::parse(QUERY).unwrap(),
                0,
                Duration::from_secs(5),
            )
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            RpcError::AdmissionLimitExceeded(AdmissionLimit::Clients { max: 1 })
        ));
    }

    #[tokio::test]
    async fn shutdown_releases_bus_registration() {
        let bus = Arc::new(EventBus::new());
        let (manager, shutdown) = manager(bus.clone(), &RpcConfig::default());
        let mut rx = manager.subscribe("client", QUERY, None).await.unwrap();
        assert_eq!(bus.num_clients(), 1);

        shutdown.shutdown();
        assert!(rx.recv().await.is_none());
        assert_eq!(bus.num_clients(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn out_of_capacity_resubscribes_with_backoff() {
        let bus = Arc::new(EventBus::new());
        let flaky = Arc::new(FlakyBus::new(bus.clone(), 3));
        let (manager, _shutdown) = manager(flaky.clone(), &RpcConfig::default());
        let mut rx = manager.subscribe("client", QUERY, Some(4)).await.unwrap();

        let query = Query::parse(QUERY).unwrap();
        bus.cancel("client", &query, CancelReason::OutOfCapacity).unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;

        let attempts = flaky.attempts();
        // Initial subscribe, three failures, one success.
        assert_eq!(attempts.len(), 5);
        let gaps: Vec<u128> = attempts[1..]
            .windows(2)
            .map(|w| (w[1] - w[0]).as_millis())
            .collect();
        assert_eq!(gaps, vec![10, 20, 40]);

        bus.publish_tx(tx_event(7)).await;
        let event = rx.recv().await.unwrap();
        assert_eq!(event.events["tx.height"], vec!["7".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_interrupts_backoff() {
        let bus = Arc::new(EventBus::new());
        let flaky = Arc::new(FlakyBus::new(bus.clone(), u32::MAX));
        let (manager, shutdown) = manager(flaky.clone(), &RpcConfig::default());
        let mut rx = manager.subscribe("client", QUERY, None).await.unwrap();

        let query = Query::parse(QUERY).unwrap();
        bus.cancel("client", &query, CancelReason::OutOfCapacity).unwrap();
        // Attempts at 0, 10, 30, 70, 150; the next sleep lasts 160 ms.
        tokio::time::sleep(Duration::from_millis(200)).await;
        let before = flaky.attempts().len();

        shutdown.shutdown();
        let closed = tokio::time::timeout(Duration::from_millis(1), rx.recv()).await;
        assert!(matches!(closed, Ok(None)));
        assert_eq!(flaky.attempts().len(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn unsubscribe_is_terminal() {
        let bus = Arc::new(EventBus::new());
        let flaky = Arc::new(FlakyBus::new(bus.clone(), 0));
        let (manager, _shutdown) = manager(flaky.clone(), &RpcConfig::default());
        let mut rx = manager.subscribe("client", QUERY, None).await.unwrap();

        manager.unsubscribe("client", QUERY).unwrap();
        assert_eq!(rx.recv().await.map(|e| e.query), None);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(flaky.attempts().len(), 1);
        assert_eq!(bus.num_clients(), 0);
    }

    #[tokio::test]
    async fn bus_stop_closes_consumer_channel() {
        let bus = Arc::new(EventBus::new());
        let (manager, _shutdown) = manager(bus.clone(), &RpcConfig::default());
        let mut rx = manager.subscribe("client", QUERY, None).await.unwrap();
        bus.stop();
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn dropping_consumer_releases_subscription() {
        let bus = Arc::new(EventBus::new());
        let (manager, _shutdown) = manager(bus.clone(), &RpcConfig::default());
        let rx = manager.subscribe("client", QUERY, Some(0)).await.unwrap();
        drop(rx);

        // The unbuffered forwarder notices on its next delivery.
        bus.publish_tx(tx_event(1)).await;
        for _ in 0..100 {
            if bus.num_clients() == 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(bus.num_clients(), 0);
    }

    #[tokio::test]
    async fn guard_unsubscribes_on_drop() {
        let bus = Arc::new(EventBus::new());
        let (manager, _shutdown) = manager(bus.clone(), &RpcConfig::default());
        let guard = manager
            .subscribe_bounded("local", Query::parse(QUERY).unwrap(), 0, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(bus.num_client_subscriptions("local"), 1);
        drop(guard);
        assert_eq!(bus.num_clients(), 0);
    }
}
