use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Cannot send message: Not connected to server")]
    NotConnected,

    /// 服务器在握手时拒绝（`connect_error` 的原因）
    #[error("Connection error: {0}")]
    Rejected(String),

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    #[error("reconnect attempts exhausted after {0} failures")]
    ReconnectExhausted(u32),

    #[error("websocket error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    #[error(transparent)]
    Domain(#[from] domain::DomainError),
}
