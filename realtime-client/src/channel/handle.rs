use shared::realtime::events;
use shared::{Frame, SessionIdentity};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::machine::{self, LifecycleKind};
use super::{ChannelEvent, ConnectionState};
use crate::error::{SessionError, SessionResult};

const EVENT_CAPACITY: usize = 256;

/// The single live (or attempting) realtime connection.
///
/// Cheap to clone; all clones refer to the same connection. Only the
/// [`SessionManager`](crate::session::SessionManager) creates handles, and
/// only its connection driver changes their state. Callers observe through
/// [`state`](Self::state), [`watch_state`](Self::watch_state) and
/// [`subscribe`](Self::subscribe).
#[derive(Clone)]
pub struct ConnectionHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    id: Uuid,
    identity: SessionIdentity,
    state_tx: watch::Sender<ConnectionState>,
    outbound_tx: mpsc::UnboundedSender<Frame>,
    cancel: CancellationToken,
    /// State commits and event publishing serialize on this lock so that
    /// nothing slips out after `close`.
    shared: Mutex<HandleShared>,
}

struct HandleShared {
    /// `None` once closed: observers are unregistered
    events_tx: Option<broadcast::Sender<ChannelEvent>>,
    identified: bool,
}

impl ConnectionHandle {
    pub(crate) fn new(identity: SessionIdentity) -> (Self, mpsc::UnboundedReceiver<Frame>) {
        let (state_tx, _) = watch::channel(ConnectionState::Connecting);
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        let handle = Self {
            inner: Arc::new(HandleInner {
                id: Uuid::new_v4(),
                identity,
                state_tx,
                outbound_tx,
                cancel: CancellationToken::new(),
                shared: Mutex::new(HandleShared {
                    events_tx: Some(events_tx),
                    identified: false,
                }),
            }),
        };
        (handle, outbound_rx)
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// The identity this handle announces on every (re)connect
    pub fn identity(&self) -> &SessionIdentity {
        &self.inner.identity
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state_tx.borrow()
    }

    /// Receiver that tracks every state change
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// Subscribe to lifecycle events and server pushes.
    ///
    /// The stream ends (`RecvError::Closed`) when the handle is torn down.
    pub fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        match self.lock().events_tx.as_ref() {
            Some(tx) => tx.subscribe(),
            None => {
                let (tx, rx) = broadcast::channel(1);
                drop(tx);
                rx
            }
        }
    }

    /// Whether `identify` has been written on the current transport
    pub fn is_identified(&self) -> bool {
        self.lock().identified
    }

    /// Whether this handle has been torn down or released
    pub fn is_closed(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Same underlying connection
    pub fn same_as(&self, other: &ConnectionHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Send an application event to the server.
    ///
    /// Only allowed while connected. Frames queued just before a drop are
    /// written after the next successful `identify`.
    pub fn emit(&self, event: &str, data: serde_json::Value) -> SessionResult<()> {
        if event == events::IDENTIFY {
            return Err(SessionError::ReservedEvent(event.to_string()));
        }
        if self.state() != ConnectionState::Connected {
            return Err(SessionError::NotConnected);
        }
        self.inner
            .outbound_tx
            .send(Frame::new(event, data))
            .map_err(|_| SessionError::NotConnected)
    }

    // ========== Driver / manager side ==========

    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    /// Commit a state. Returns false (and changes nothing) once closed.
    pub(crate) fn commit(&self, state: ConnectionState, identified: bool) -> bool {
        let mut shared = self.lock();
        if shared.events_tx.is_none() {
            return false;
        }
        shared.identified = identified;
        let previous = self.inner.state_tx.send_replace(state);
        if previous != state {
            tracing::debug!(handle = %self.inner.id, from = %previous, to = %state, "Realtime state changed");
        }
        true
    }

    /// Publish to observers. Returns false once closed.
    pub(crate) fn publish(&self, event: ChannelEvent) -> bool {
        let shared = self.lock();
        match shared.events_tx.as_ref() {
            Some(tx) => {
                // No subscribers is fine
                let _ = tx.send(event);
                true
            }
            None => false,
        }
    }

    /// Tear the handle down: cancel the driver, unregister observers, and
    /// move to `disconnected`. Idempotent.
    pub(crate) fn close(&self) {
        self.inner.cancel.cancel();

        let mut shared = self.lock();
        if shared.events_tx.take().is_none() {
            return;
        }
        shared.identified = false;

        let to = machine::next(self.state(), LifecycleKind::Teardown)
            .map(|t| t.to)
            .unwrap_or(ConnectionState::Disconnected);
        self.inner.state_tx.send_replace(to);
        tracing::debug!(handle = %self.inner.id, "Realtime handle closed");
    }

    fn lock(&self) -> MutexGuard<'_, HandleShared> {
        self.inner
            .shared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.inner.id)
            .field("identity", &self.inner.identity)
            .field("state", &self.state())
            .finish()
    }
}
