//! Publish/subscribe plumbing for node-level events.
//!
//! - [`Query`]: the tag query language (`tm.event = 'Tx' AND tx.height > 5`)
//! - [`EventBus`]: the process-wide in-memory bus with a per-client registry
//! - [`Subscription`]: a delivery channel plus a cancellation signal
//! - [`EventSubscriber`]: the narrow subscribe/unsubscribe/count capability
//!   that consumers hold instead of the whole bus

pub mod bus;
pub mod error;
pub mod query;
pub mod subscriber;

pub use bus::EventBus;
pub use error::{BusError, QueryError};
pub use query::{Condition, Operand, Operator, Query};
pub use subscriber::{
    deliver_unbuffered, CancelReason, CancelSignal, EventSubscriber, Message, Subscription,
};

/// Buffer size used when a caller does not ask for a specific capacity.
pub const DEFAULT_OUT_CAPACITY: usize = 1;
