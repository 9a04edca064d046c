//! Realtime channel frame types
//!
//! Every frame on the realtime channel is a JSON text message with an event
//! name and an arbitrary payload:
//! ```json
//! { "event": "order_status", "data": { "orderId": "o-1", "status": "picked_up" } }
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::identity::SessionIdentity;

/// Well-known event names
pub mod events {
    /// Client → server identity announcement, sent after every (re)connect
    pub const IDENTIFY: &str = "identify";
}

/// One event on the realtime channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Frame {
    pub fn new(event: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Build the identify handshake frame
    pub fn identify(identity: &SessionIdentity) -> Result<Self, serde_json::Error> {
        Ok(Self::new(events::IDENTIFY, serde_json::to_value(identity)?))
    }

    pub fn is_identify(&self) -> bool {
        self.event == events::IDENTIFY
    }

    /// 解析载荷为指定类型
    pub fn parse_data<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.data.clone())
    }

    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_text(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Why a realtime transport went away.
///
/// Displayed with the reason strings clients of the platform already log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum DisconnectReason {
    /// The server closed the connection
    ServerDisconnect,
    /// The client closed the connection
    ClientDisconnect,
    /// No traffic within the heartbeat window
    PingTimeout,
    /// The underlying stream ended
    TransportClose,
    /// The underlying stream failed
    TransportError(String),
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::ServerDisconnect => write!(f, "io server disconnect"),
            DisconnectReason::ClientDisconnect => write!(f, "io client disconnect"),
            DisconnectReason::PingTimeout => write!(f, "ping timeout"),
            DisconnectReason::TransportClose => write!(f, "transport close"),
            DisconnectReason::TransportError(e) => write!(f, "transport error: {}", e),
        }
    }
}
