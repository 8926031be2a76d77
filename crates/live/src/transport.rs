//! Socket transports carrying STOMP frames.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};

use crate::error::ChannelError;
use crate::frame::Frame;

/// An open broker connection, as a pair of frame queues.
///
/// Dropping `outbound` closes the socket once queued frames are written. The
/// transport closes `inbound` when the socket ends.
pub struct Connection {
    pub outbound: mpsc::UnboundedSender<Frame>,
    pub inbound: mpsc::UnboundedReceiver<Result<Frame, ChannelError>>,
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Connection, ChannelError>;

    /// Value of the STOMP `host` header.
    fn host(&self) -> String {
        "localhost".to_string()
    }
}

/// Connects to a STOMP broker over a plain WebSocket.
pub struct WebSocketConnector {
    url: String,
}

impl WebSocketConnector {
    pub fn new(url: impl Into<String>) -> Result<Self, ChannelError> {
        let url = url.into();
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(ChannelError::InvalidUrl(url));
        }
        Ok(Self { url })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self) -> Result<Connection, ChannelError> {
        let (stream, _response) = connect_async(self.url.as_str()).await?;
        debug!(url = %self.url, "websocket opened");

        let (mut sink, mut source) = stream.split();
        let (outbound, mut to_socket) = mpsc::unbounded_channel::<Frame>();
        let (from_socket, inbound) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(frame) = to_socket.recv().await {
                if let Err(error) = sink.send(Message::Text(frame.encode())).await {
                    debug!(%error, "websocket write failed");
                    break;
                }
            }
            let _ = sink.close().await;
        });

        tokio::spawn(async move {
            while let Some(message) = source.next().await {
                let text = match message {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(error) => {
                        warn!(%error, "websocket read failed");
                        let _ = from_socket.send(Err(error.into()));
                        return;
                    }
                };

                match Frame::decode_all(&text) {
                    Ok(frames) => {
                        for frame in frames {
                            if from_socket.send(Ok(frame)).is_err() {
                                return;
                            }
                        }
                    }
                    Err(error) => {
                        let _ = from_socket.send(Err(error.into()));
                        return;
                    }
                }
            }
        });

        Ok(Connection { outbound, inbound })
    }

    fn host(&self) -> String {
        self.url
            .split("://")
            .nth(1)
            .and_then(|rest| rest.split(['/', ':']).next())
            .filter(|host| !host.is_empty())
            .unwrap_or("localhost")
            .to_string()
    }
}
