use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("empty frame")]
    Empty,

    #[error("frame is not terminated")]
    Truncated,

    #[error("unknown STOMP command `{0}`")]
    UnknownCommand(String),

    #[error("malformed header line `{0}`")]
    MalformedHeader(String),

    #[error("invalid escape sequence in header `{0}`")]
    InvalidEscape(String),
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("broker reported an error: {0}")]
    Broker(String),

    #[error("unexpected {0} frame while connecting")]
    Unexpected(String),

    #[error("timed out waiting for the broker")]
    Timeout,

    #[error("connection closed")]
    Closed,

    #[error("invalid socket url: {0}")]
    InvalidUrl(String),
}
