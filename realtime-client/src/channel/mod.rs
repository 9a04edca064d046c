//! Realtime channel: connection state, observer events, and the per-handle
//! connection driver.

mod driver;
mod handle;
pub mod machine;

pub(crate) use driver::ConnectionDriver;
pub use handle::ConnectionHandle;

use serde::Serialize;
use shared::{DisconnectReason, Frame, SessionIdentity};
use std::fmt;

use crate::message::TransportError;

/// Connection state of a [`ConnectionHandle`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Reconnecting => write!(f, "reconnecting"),
        }
    }
}

/// What observers of a handle receive.
///
/// Lifecycle variants are advisory: transport trouble never surfaces as an
/// error to the caller, only as these events and state changes.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// First transport connection established
    Connected,
    /// `identify` written on the current transport
    Identified(SessionIdentity),
    /// Transport dropped, reconnection follows
    Disconnected { reason: DisconnectReason },
    /// A connection attempt failed
    ConnectError { error: TransportError },
    /// About to make reconnect attempt `attempt`
    ReconnectAttempt { attempt: u32 },
    /// Reconnect attempt `attempt` succeeded
    Reconnected { attempt: u32 },
    /// Retry budget exhausted; the handle is released
    ReconnectFailed,
    /// Application event pushed by the server
    Message(Frame),
}

impl ChannelEvent {
    pub fn is_lifecycle(&self) -> bool {
        !matches!(self, ChannelEvent::Message(_))
    }
}
