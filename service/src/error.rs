use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("config error: {0}")]
    Config(String),

    #[error("invalid lifecycle parameters: {0}")]
    Params(#[from] tokentrust_types::ParamsError),

    #[error("lifecycle error: {0}")]
    Lifecycle(#[from] tokentrust_lifecycle::LifecycleError),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("logging error: {0}")]
    Logging(String),

    #[error("RPC server error: {0}")]
    Rpc(#[from] tokentrust_rpc::RpcError),

    #[error("WebSocket server error: {0}")]
    WebSocket(#[from] tokentrust_websocket::WsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
