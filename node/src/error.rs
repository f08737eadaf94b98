use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("RPC error: {0}")]
    Rpc(#[from] tessel_rpc::RpcError),

    #[error("data availability error: {0}")]
    Da(#[from] tessel_da::DaError),

    #[error("config error: {0}")]
    Config(String),

    #[error("logging error: {0}")]
    Logging(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("node is already running")]
    AlreadyRunning,

    #[error("RPC server task failed: {0}")]
    ServerTask(String),
}
