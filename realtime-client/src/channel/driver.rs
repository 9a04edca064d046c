//! Connection driver: one task per [`ConnectionHandle`]
//!
//! 1. Attempt a transport connection (never more than one outstanding)
//! 2. On success: `connect`/`reconnect` event, then `identify`, then `connected`
//! 3. Pump outbound `emit` frames and inbound server pushes
//! 4. On drop or failure: `reconnecting`, wait per policy, go to 1
//! 5. On teardown or exhausted budget: close and stop
//!
//! Every step first checks that the handle is still the one occupying the
//! manager slot and has not been cancelled, so a late-completing attempt
//! after teardown does nothing.

use shared::{DisconnectReason, Frame};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::machine::{self, Action, Lifecycle, Transition};
use super::{ChannelEvent, ConnectionHandle, ConnectionState};
use crate::message::{Connection, Connector, ReconnectPolicy, TransportError};
use crate::session::Slot;

pub(crate) struct ConnectionDriver {
    handle: ConnectionHandle,
    connector: Arc<dyn Connector>,
    policy: ReconnectPolicy,
    slot: Weak<Slot>,
    outbound_rx: mpsc::UnboundedReceiver<Frame>,
    cancel: CancellationToken,
}

enum PumpExit {
    Cancelled,
    Dropped(DisconnectReason),
}

impl ConnectionDriver {
    pub(crate) fn new(
        handle: ConnectionHandle,
        connector: Arc<dyn Connector>,
        policy: ReconnectPolicy,
        slot: Weak<Slot>,
        outbound_rx: mpsc::UnboundedReceiver<Frame>,
    ) -> Self {
        let cancel = handle.cancel_token();
        Self {
            handle,
            connector,
            policy,
            slot,
            outbound_rx,
            cancel,
        }
    }

    pub(crate) async fn run(mut self) {
        let id = self.handle.id();
        tracing::info!(
            handle = %id,
            identity = %self.handle.identity(),
            "Realtime connection driver started"
        );

        // Reconnect attempts since the last successful identify
        let mut attempt: u32 = 0;

        loop {
            let outcome = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                outcome = self.connector.connect() => outcome,
            };

            match outcome {
                Ok(mut conn) => {
                    let event = match self.handle.state() {
                        ConnectionState::Reconnecting => Lifecycle::Reconnect(attempt),
                        _ => Lifecycle::Connect,
                    };
                    let Some(transition) = self.fire(event) else {
                        let _ = conn.close().await;
                        break;
                    };

                    let written = tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => None,
                        written = self.identify(conn.as_mut()) => Some(written),
                    };
                    let Some(written) = written else {
                        let _ = conn.close().await;
                        break;
                    };

                    if let Err(e) = written {
                        tracing::warn!(handle = %id, error = %e, "Failed to send identify");
                        let _ = conn.close().await;
                        if self.fire(Lifecycle::ConnectError(e)).is_none() {
                            break;
                        }
                    } else {
                        if !self.is_current() || !self.handle.commit(transition.to, true) {
                            let _ = conn.close().await;
                            break;
                        }
                        self.handle
                            .publish(ChannelEvent::Identified(self.handle.identity().clone()));
                        tracing::info!(handle = %id, attempt, "Realtime channel identified");
                        attempt = 0;

                        match self.pump(conn.as_mut()).await {
                            PumpExit::Cancelled => {
                                let _ = conn.close().await;
                                break;
                            }
                            PumpExit::Dropped(reason) => {
                                tracing::warn!(handle = %id, %reason, "Realtime transport dropped");
                                if self.fire(Lifecycle::Disconnect(reason)).is_none() {
                                    break;
                                }
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(handle = %id, attempt, error = %e, "Realtime connection attempt failed");
                    if self.fire(Lifecycle::ConnectError(e)).is_none() {
                        break;
                    }
                }
            }

            attempt = attempt.saturating_add(1);
            let Some(delay) = self.policy.next_delay(attempt) else {
                tracing::error!(
                    handle = %id,
                    attempts = attempt - 1,
                    "Reconnect budget exhausted, giving up"
                );
                if self.fire(Lifecycle::ReconnectFailed).is_some() {
                    if let Some(slot) = self.slot.upgrade() {
                        slot.release(id);
                    }
                    self.handle.close();
                }
                break;
            };

            tracing::debug!(handle = %id, attempt, ?delay, "Waiting before reconnect");
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }

            if self.fire(Lifecycle::ReconnectAttempt(attempt)).is_none() {
                break;
            }
        }

        tracing::info!(handle = %id, "Realtime connection driver stopped");
    }

    /// Still occupies the manager slot and has not been torn down
    fn is_current(&self) -> bool {
        !self.cancel.is_cancelled()
            && self
                .slot
                .upgrade()
                .is_some_and(|slot| slot.holds(self.handle.id()))
    }

    /// Run `event` through the transition table.
    ///
    /// Commits the target state right away unless the action is `Identify`,
    /// which the caller commits after the handshake is written. Returns
    /// `None` when the driver must stop.
    fn fire(&self, event: Lifecycle) -> Option<&'static Transition> {
        if !self.is_current() {
            tracing::debug!(handle = %self.handle.id(), ?event, "Dropping event for stale handle");
            return None;
        }

        let state = self.handle.state();
        let Some(transition) = machine::next(state, event.kind()) else {
            tracing::warn!(
                handle = %self.handle.id(),
                %state,
                ?event,
                "Lifecycle event not valid in current state"
            );
            return None;
        };

        if transition.action != Action::Identify && !self.handle.commit(transition.to, false) {
            return None;
        }
        if let Some(advisory) = event.advisory() {
            self.handle.publish(advisory);
        }
        Some(transition)
    }

    async fn identify(&self, conn: &mut dyn Connection) -> Result<(), TransportError> {
        let frame = Frame::identify(self.handle.identity())?;
        tracing::debug!(handle = %self.handle.id(), identity = %self.handle.identity(), "Sending identify");
        conn.send(&frame).await
    }

    async fn pump(&mut self, conn: &mut dyn Connection) -> PumpExit {
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return PumpExit::Cancelled,

                Some(frame) = self.outbound_rx.recv() => {
                    if let Err(e) = conn.send(&frame).await {
                        return PumpExit::Dropped(disconnect_reason(e));
                    }
                }

                inbound = conn.recv() => match inbound {
                    Ok(frame) => {
                        if !self.handle.publish(ChannelEvent::Message(frame)) {
                            return PumpExit::Cancelled;
                        }
                    }
                    Err(e) => return PumpExit::Dropped(disconnect_reason(e)),
                },
            }
        }
    }
}

fn disconnect_reason(e: TransportError) -> DisconnectReason {
    match e {
        TransportError::Closed(reason) => reason,
        other => DisconnectReason::TransportError(other.to_string()),
    }
}
