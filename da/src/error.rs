use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaError {
    #[error("unknown DA backend: {0}")]
    UnknownBackend(String),

    #[error("DA backend already registered: {0}")]
    DuplicateBackend(String),

    #[error("invalid DA config: {0}")]
    Config(String),

    #[error("{0} backend is not running")]
    NotRunning(&'static str),

    #[error("no blob at DA height {0}")]
    BlobNotFound(u64),

    #[error("DA transport error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DA codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("DA service error: {0}")]
    Remote(String),

    #[error("DA frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("DA request timed out")]
    Timeout,

    #[error("unexpected DA response: {0}")]
    UnexpectedResponse(String),
}
