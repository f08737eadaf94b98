use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    #[error("already subscribed")]
    AlreadySubscribed,

    #[error("subscription not found")]
    SubscriptionNotFound,

    #[error("client not found")]
    ClientNotFound,

    #[error("event bus is stopped")]
    Stopped,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("empty query")]
    Empty,

    #[error("expected {expected} at position {pos}, found {found:?}")]
    Unexpected {
        pos: usize,
        expected: &'static str,
        found: String,
    },

    #[error("unterminated string starting at position {0}")]
    UnterminatedString(usize),

    #[error("invalid number {0:?}")]
    InvalidNumber(String),
}
