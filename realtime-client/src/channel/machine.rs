//! Connection lifecycle state machine
//!
//! [`TRANSITIONS`] is the single source of truth for how transport lifecycle
//! events move a handle between [`ConnectionState`]s and what the driver must
//! do on each move. The driver never changes state except through [`next`].

use shared::DisconnectReason;

use super::ConnectionState::{Connected, Connecting, Disconnected, Reconnecting};
use super::{ChannelEvent, ConnectionState};
use crate::message::TransportError;

/// Transport lifecycle event, with payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lifecycle {
    Connect,
    Disconnect(DisconnectReason),
    ConnectError(TransportError),
    ReconnectAttempt(u32),
    Reconnect(u32),
    ReconnectFailed,
    Teardown,
}

/// Payload-free discriminant used as the table key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleKind {
    Connect,
    Disconnect,
    ConnectError,
    ReconnectAttempt,
    Reconnect,
    ReconnectFailed,
    Teardown,
}

impl Lifecycle {
    pub fn kind(&self) -> LifecycleKind {
        match self {
            Lifecycle::Connect => LifecycleKind::Connect,
            Lifecycle::Disconnect(_) => LifecycleKind::Disconnect,
            Lifecycle::ConnectError(_) => LifecycleKind::ConnectError,
            Lifecycle::ReconnectAttempt(_) => LifecycleKind::ReconnectAttempt,
            Lifecycle::Reconnect(_) => LifecycleKind::Reconnect,
            Lifecycle::ReconnectFailed => LifecycleKind::ReconnectFailed,
            Lifecycle::Teardown => LifecycleKind::Teardown,
        }
    }

    /// Observer event for this lifecycle event, if observers should see it
    pub fn advisory(&self) -> Option<ChannelEvent> {
        match self {
            Lifecycle::Connect => Some(ChannelEvent::Connected),
            Lifecycle::Disconnect(reason) => Some(ChannelEvent::Disconnected {
                reason: reason.clone(),
            }),
            Lifecycle::ConnectError(error) => Some(ChannelEvent::ConnectError {
                error: error.clone(),
            }),
            Lifecycle::ReconnectAttempt(attempt) => {
                Some(ChannelEvent::ReconnectAttempt { attempt: *attempt })
            }
            Lifecycle::Reconnect(attempt) => Some(ChannelEvent::Reconnected { attempt: *attempt }),
            Lifecycle::ReconnectFailed => Some(ChannelEvent::ReconnectFailed),
            Lifecycle::Teardown => None,
        }
    }
}

/// What the driver does when a transition fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Write `identify` on the new transport, then commit the state
    Identify,
    /// Wait per reconnect policy, then try again
    Retry,
    /// Budget exhausted: release the manager slot
    Release,
    /// Close the transport and stop
    Close,
    /// Nothing beyond the state change
    Stay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// `None` matches any state
    pub from: Option<ConnectionState>,
    pub on: LifecycleKind,
    pub to: ConnectionState,
    pub action: Action,
}

const fn rule(
    from: Option<ConnectionState>,
    on: LifecycleKind,
    to: ConnectionState,
    action: Action,
) -> Transition {
    Transition {
        from,
        on,
        to,
        action,
    }
}

pub const TRANSITIONS: &[Transition] = &[
    rule(Some(Connecting), LifecycleKind::Connect, Connected, Action::Identify),
    rule(Some(Connecting), LifecycleKind::ConnectError, Reconnecting, Action::Retry),
    rule(Some(Connected), LifecycleKind::Disconnect, Reconnecting, Action::Retry),
    rule(Some(Reconnecting), LifecycleKind::ReconnectAttempt, Reconnecting, Action::Stay),
    rule(Some(Reconnecting), LifecycleKind::ConnectError, Reconnecting, Action::Retry),
    rule(Some(Reconnecting), LifecycleKind::Reconnect, Connected, Action::Identify),
    rule(Some(Reconnecting), LifecycleKind::ReconnectFailed, Disconnected, Action::Release),
    rule(None, LifecycleKind::Teardown, Disconnected, Action::Close),
];

/// Look up the transition for `event` in `state`.
///
/// `None` means the event is not valid in that state and must be ignored.
pub fn next(state: ConnectionState, event: LifecycleKind) -> Option<&'static Transition> {
    TRANSITIONS
        .iter()
        .find(|t| t.on == event && t.from.is_none_or(|from| from == state))
}
