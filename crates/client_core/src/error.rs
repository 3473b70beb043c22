use shared::error::ApiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid session: {0}")]
    InvalidSession(&'static str),
    #[error("no conversation target: supply a conversation id or a peer user id")]
    MissingConversationTarget,
    #[error("a send is already in flight for this conversation")]
    SendInFlight,
    #[error("server rejected the request: {0}")]
    Api(#[from] ApiError),
    #[error("server returned unexpected status {0}")]
    UnexpectedStatus(reqwest::StatusCode),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("realtime channel error: {0}")]
    Channel(#[from] ChannelError),
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("websocket connect failed: {0}")]
    Connect(String),
    #[error("realtime channel is closed")]
    Closed,
}
