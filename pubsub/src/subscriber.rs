//! Subscription side of the event bus.

use async_trait::async_trait;
use tessel_types::{EventData, Tags};
use thiserror::Error;
use tokio::sync::{mpsc, watch};

use crate::{BusError, Query};

/// Why a subscription stopped delivering.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CancelReason {
    /// The client asked for it. Terminal.
    #[error("client unsubscribed")]
    Unsubscribed,

    /// The bus evicted a buffered subscriber that fell behind.
    #[error("client is not pulling messages fast enough")]
    OutOfCapacity,

    /// The bus itself was stopped. Terminal.
    #[error("event bus stopped")]
    Shutdown,
}

/// One delivered event.
#[derive(Clone, Debug)]
pub struct Message {
    /// Canonical form of the query this message matched.
    pub query: String,
    pub data: EventData,
    pub events: Tags,
}

/// A registered interest in events matching a [`Query`].
///
/// Messages arrive in bus emission order. When the subscription is
/// cancelled the delivery channel closes and [`Subscription::err`] reports
/// the reason.
#[derive(Debug)]
pub struct Subscription {
    query: Query,
    capacity: usize,
    out: mpsc::Receiver<Message>,
    cancelled: watch::Receiver<Option<CancelReason>>,
}

impl Subscription {
    pub(crate) fn new(
        query: Query,
        capacity: usize,
        out: mpsc::Receiver<Message>,
        cancelled: watch::Receiver<Option<CancelReason>>,
    ) -> Self {
        Self {
            query,
            capacity,
            out,
            cancelled,
        }
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Requested capacity; 0 means unbuffered.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Next message, or `None` once the subscription has been cancelled.
    pub async fn next(&mut self) -> Option<Message> {
        self.out.recv().await
    }

    /// A handle that resolves when this subscription is cancelled.
    ///
    /// Held separately so it can be awaited alongside [`Subscription::next`]
    /// in one `select!`.
    pub fn cancel_signal(&self) -> CancelSignal {
        CancelSignal {
            rx: self.cancelled.clone(),
        }
    }

    /// The cancellation reason, if the subscription has been cancelled.
    pub fn err(&self) -> Option<CancelReason> {
        self.cancelled.borrow().clone()
    }
}

#[derive(Clone, Debug)]
pub struct CancelSignal {
    rx: watch::Receiver<Option<CancelReason>>,
}

impl CancelSignal {
    /// Wait for cancellation. A bus that disappears without recording a
    /// reason counts as [`CancelReason::Shutdown`].
    pub async fn cancelled(&mut self) -> CancelReason {
        let reason = match self.rx.wait_for(Option::is_some).await {
            Ok(reason) => reason.clone(),
            Err(_) => None,
        };
        reason
            .or_else(|| self.current())
            .unwrap_or(CancelReason::Shutdown)
    }

    pub fn current(&self) -> Option<CancelReason> {
        self.rx.borrow().clone()
    }
}

/// Send `item` and wait until the receiver has taken it.
///
/// The channel must have capacity 1: a permit is only granted again once
/// the single slot has been drained, which gives rendezvous semantics on
/// top of a bounded tokio channel.
pub async fn deliver_unbuffered<T>(
    tx: &mpsc::Sender<T>,
    item: T,
) -> Result<(), mpsc::error::SendError<T>> {
    tx.send(item).await?;
    // A closed channel here means the receiver took the item and then went away.
    if let Ok(permit) = tx.reserve().await {
        drop(permit);
    }
    Ok(())
}

/// The narrow subscription capability handed to consumers of the bus.
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    /// Register `subscriber` for events matching `query`. A `capacity` of 0
    /// yields an unbuffered subscription.
    async fn subscribe(
        &self,
        subscriber: &str,
        query: Query,
        capacity: usize,
    ) -> Result<Subscription, BusError>;

    fn unsubscribe(&self, subscriber: &str, query: &Query) -> Result<(), BusError>;

    fn unsubscribe_all(&self, subscriber: &str) -> Result<(), BusError>;

    /// Number of distinct subscribers with at least one subscription.
    fn num_clients(&self) -> usize;

    fn num_client_subscriptions(&self, subscriber: &str) -> usize;
}
