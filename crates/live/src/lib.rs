//! # Pantry Live
//!
//! Push updates from the kitchen backend. The broker speaks STOMP 1.2 over a
//! WebSocket; incoming markers are decoded into [`LiveEvent`] values and
//! delivered on caller-supplied channels.

pub mod channel;
pub mod error;
pub mod event;
pub mod frame;
pub mod transport;

pub use channel::{ConnectionState, EventSender, LiveChannel};
pub use error::{ChannelError, FrameError};
pub use event::{LiveEvent, Topic};
pub use frame::{Command, Frame};
pub use transport::{Connection, Connector, WebSocketConnector};
