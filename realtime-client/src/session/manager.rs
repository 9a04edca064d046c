use shared::SessionIdentity;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use crate::channel::{ConnectionDriver, ConnectionHandle};
use crate::error::{SessionError, SessionResult};
use crate::message::{Connector, ReconnectPolicy};

/// Owner of the process's single realtime connection.
///
/// Cloning shares the same slot. Construct one per process (or per test)
/// and hand clones to whatever needs the channel.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    connector: Arc<dyn Connector>,
    policy: ReconnectPolicy,
    slot: Arc<Slot>,
}

/// At most one handle lives here
#[derive(Debug, Default)]
pub(crate) struct Slot {
    current: Mutex<Option<ConnectionHandle>>,
}

impl Slot {
    fn lock(&self) -> MutexGuard<'_, Option<ConnectionHandle>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn current(&self) -> Option<ConnectionHandle> {
        self.lock().clone()
    }

    /// Whether the slot is occupied by the handle with this id
    pub(crate) fn holds(&self, id: Uuid) -> bool {
        self.lock().as_ref().is_some_and(|h| h.id() == id)
    }

    pub(crate) fn take(&self) -> Option<ConnectionHandle> {
        self.lock().take()
    }

    /// Clear the slot only if it still holds `id`
    pub(crate) fn release(&self, id: Uuid) -> bool {
        let mut current = self.lock();
        if current.as_ref().is_some_and(|h| h.id() == id) {
            *current = None;
            true
        } else {
            false
        }
    }
}

impl SessionManager {
    pub fn new(connector: impl Connector + 'static, policy: ReconnectPolicy) -> Self {
        Self::with_connector(Arc::new(connector), policy)
    }

    pub fn with_connector(connector: Arc<dyn Connector>, policy: ReconnectPolicy) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                connector,
                policy,
                slot: Arc::new(Slot::default()),
            }),
        }
    }

    /// Start the realtime channel for `identity`, or return the live one.
    ///
    /// Returns immediately; connecting happens on a spawned driver task.
    /// A second call while a handle is live returns that handle unchanged,
    /// even for a different identity.
    pub fn initialize(&self, identity: SessionIdentity) -> SessionResult<ConnectionHandle> {
        if !identity.has_user_id() {
            tracing::warn!(user_type = %identity.user_type, "Refusing to connect without a user id");
            return Err(SessionError::NoIdentity);
        }

        let mut current = self.inner.slot.lock();
        if let Some(existing) = current.as_ref() {
            if existing.identity() != &identity {
                tracing::warn!(
                    active = %existing.identity(),
                    requested = %identity,
                    "Realtime session already active, keeping the existing identity"
                );
            }
            return Ok(existing.clone());
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| SessionError::NoRuntime)?;

        let (handle, outbound_rx) = ConnectionHandle::new(identity);
        let driver = ConnectionDriver::new(
            handle.clone(),
            self.inner.connector.clone(),
            self.inner.policy.clone(),
            Arc::downgrade(&self.inner.slot),
            outbound_rx,
        );
        *current = Some(handle.clone());
        drop(current);

        tracing::info!(handle = %handle.id(), identity = %handle.identity(), "Realtime session initialized");
        runtime.spawn(driver.run());
        Ok(handle)
    }

    /// The live handle
    pub fn get_active(&self) -> SessionResult<ConnectionHandle> {
        self.inner.slot.current().ok_or(SessionError::NotInitialized)
    }

    pub fn is_active(&self) -> bool {
        self.inner.slot.current().is_some()
    }

    /// Close the live handle and clear the slot. No-op when already empty.
    pub fn teardown(&self) {
        if let Some(handle) = self.inner.slot.take() {
            tracing::info!(handle = %handle.id(), identity = %handle.identity(), "Tearing down realtime session");
            handle.close();
        }
    }

    /// Guard that tears the session down when dropped
    pub fn scope(&self) -> SessionScope {
        SessionScope {
            manager: self.clone(),
        }
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.inner.policy
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("connector", &self.inner.connector)
            .field("policy", &self.inner.policy)
            .field("active", &self.inner.slot.current().map(|h| h.id()))
            .finish()
    }
}

impl Drop for ManagerInner {
    fn drop(&mut self) {
        if let Some(handle) = self.slot.take() {
            handle.close();
        }
    }
}

/// Tears the session down on drop.
///
/// Hold one for as long as the owning screen or task lives.
#[must_use = "the session is torn down as soon as the scope is dropped"]
#[derive(Debug)]
pub struct SessionScope {
    manager: SessionManager,
}

impl SessionScope {
    pub fn manager(&self) -> &SessionManager {
        &self.manager
    }
}

impl Drop for SessionScope {
    fn drop(&mut self) {
        self.manager.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ChannelEvent, ConnectionState};
    use crate::message::{Connection, MemoryConnector, MemoryServer, TransportError};
    use async_trait::async_trait;
    use shared::realtime::events;
    use shared::{DisconnectReason, Frame, UserType};
    use std::time::Duration;
    use tokio::sync::Notify;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    /// Connector whose writes hang until `release` is notified
    #[derive(Debug, Default)]
    struct StalledWrites {
        started: Notify,
        release: Notify,
        written: std::sync::Mutex<Vec<Frame>>,
    }

    #[derive(Debug)]
    struct StalledConnector(Arc<StalledWrites>);

    #[derive(Debug)]
    struct StalledConnection(Arc<StalledWrites>);

    #[async_trait]
    impl Connector for StalledConnector {
        async fn connect(&self) -> Result<Box<dyn Connection>, TransportError> {
            Ok(Box::new(StalledConnection(self.0.clone())))
        }
    }

    #[async_trait]
    impl Connection for StalledConnection {
        async fn send(&mut self, frame: &Frame) -> Result<(), TransportError> {
            self.0.started.notify_one();
            self.0.release.notified().await;
            self.0.written.lock().unwrap().push(frame.clone());
            Ok(())
        }

        async fn recv(&mut self) -> Result<Frame, TransportError> {
            std::future::pending().await
        }

        async fn close(&mut self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    fn manager(policy: ReconnectPolicy) -> (SessionManager, MemoryServer) {
        let (connector, server) = MemoryConnector::new();
        (SessionManager::new(connector, policy), server)
    }

    fn rider() -> SessionIdentity {
        SessionIdentity::new(UserType::Rider, "rider-42")
    }

    async fn wait_for(handle: &ConnectionHandle, state: ConnectionState) {
        let mut rx = handle.watch_state();
        timeout(WAIT, rx.wait_for(|s| *s == state))
            .await
            .expect("state not reached in time")
            .expect("state channel closed");
    }

    #[tokio::test]
    async fn test_blank_user_id_is_rejected() {
        let (manager, server) = manager(ReconnectPolicy::default());

        let err = manager
            .initialize(SessionIdentity::new(UserType::Driver, "  "))
            .unwrap_err();

        assert!(matches!(err, SessionError::NoIdentity));
        assert!(!manager.is_active());
        tokio::task::yield_now().await;
        assert_eq!(server.total_attempts(), 0);
    }

    #[test]
    fn test_initialize_requires_runtime() {
        let (manager, _server) = manager(ReconnectPolicy::default());
        assert!(matches!(
            manager.initialize(rider()),
            Err(SessionError::NoRuntime)
        ));
        assert!(!manager.is_active());
    }

    #[tokio::test]
    async fn test_second_initialize_returns_existing() {
        let (manager, mut server) = manager(ReconnectPolicy::default());

        let first = manager.initialize(rider()).unwrap();
        let second = manager
            .initialize(SessionIdentity::new(UserType::Customer, "someone-else"))
            .unwrap();

        assert!(first.same_as(&second));
        assert_eq!(second.identity(), &rider());

        let _peer = timeout(WAIT, server.next_attempt()).await.unwrap().unwrap().accept();
        wait_for(&first, ConnectionState::Connected).await;
        assert_eq!(server.total_attempts(), 1);
    }

    #[tokio::test]
    async fn test_get_active() {
        let (manager, _server) = manager(ReconnectPolicy::default());
        assert!(matches!(manager.get_active(), Err(SessionError::NotInitialized)));

        let handle = manager.initialize(rider()).unwrap();
        assert!(manager.get_active().unwrap().same_as(&handle));
    }

    #[tokio::test]
    async fn test_identify_sent_on_connect() {
        let (manager, mut server) = manager(ReconnectPolicy::default());
        let handle = manager.initialize(rider()).unwrap();
        let mut events_rx = handle.subscribe();

        let mut peer = timeout(WAIT, server.next_attempt()).await.unwrap().unwrap().accept();
        let identify = timeout(WAIT, peer.recv()).await.unwrap().unwrap();
        assert_eq!(identify.event, events::IDENTIFY);
        assert_eq!(
            identify.data,
            serde_json::json!({ "userType": "rider", "userId": "rider-42" })
        );

        wait_for(&handle, ConnectionState::Connected).await;
        assert!(handle.is_identified());
        assert_eq!(events_rx.recv().await.unwrap(), ChannelEvent::Connected);
        assert_eq!(
            events_rx.recv().await.unwrap(),
            ChannelEvent::Identified(rider())
        );
    }

    #[tokio::test]
    async fn test_teardown_is_idempotent() {
        let (manager, mut server) = manager(ReconnectPolicy::default());
        let handle = manager.initialize(rider()).unwrap();
        let _peer = timeout(WAIT, server.next_attempt()).await.unwrap().unwrap().accept();
        wait_for(&handle, ConnectionState::Connected).await;

        manager.teardown();
        manager.teardown();

        assert!(!manager.is_active());
        assert!(handle.is_closed());
        assert_eq!(handle.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_teardown_while_attempt_outstanding() {
        let (manager, mut server) = manager(ReconnectPolicy::default());
        let handle = manager.initialize(rider()).unwrap();

        let pending = timeout(WAIT, server.next_attempt()).await.unwrap().unwrap();
        manager.teardown();

        // The attempt completes after teardown: nothing may be written
        let mut peer = pending.accept();
        assert!(timeout(WAIT, peer.recv()).await.unwrap().is_none());
        assert_eq!(handle.state(), ConnectionState::Disconnected);
        assert!(!handle.is_identified());
    }

    #[tokio::test]
    async fn test_teardown_while_identify_write_pending() {
        let writes = Arc::new(StalledWrites::default());
        let manager = SessionManager::new(
            StalledConnector(writes.clone()),
            ReconnectPolicy::default(),
        );
        let handle = manager.initialize(rider()).unwrap();

        timeout(WAIT, writes.started.notified()).await.unwrap();
        manager.teardown();
        assert!(handle.is_closed());

        writes.release.notify_one();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(writes.written.lock().unwrap().is_empty());
        assert_eq!(handle.state(), ConnectionState::Disconnected);
        assert!(!handle.is_identified());
    }

    #[tokio::test]
    async fn test_budget_exhaustion_releases_slot() {
        let policy = ReconnectPolicy::fixed(Duration::from_millis(5)).with_max_attempts(2);
        let (manager, mut server) = manager(policy);
        let handle = manager.initialize(rider()).unwrap();
        let mut events_rx = handle.subscribe();

        for _ in 0..3 {
            timeout(WAIT, server.next_attempt())
                .await
                .unwrap()
                .unwrap()
                .refuse(TransportError::Unreachable("offline".into()));
        }

        // The event stream closes once the handle is released
        let mut saw_failed = false;
        while let Ok(event) = timeout(WAIT, events_rx.recv()).await.unwrap() {
            saw_failed |= event == ChannelEvent::ReconnectFailed;
        }
        assert!(saw_failed);

        assert_eq!(handle.state(), ConnectionState::Disconnected);
        assert!(!manager.is_active());
        assert_eq!(server.total_attempts(), 3);

        // A fresh initialize starts over
        let again = manager.initialize(rider()).unwrap();
        assert!(!again.same_as(&handle));
    }

    #[tokio::test]
    async fn test_scope_tears_down_on_drop() {
        let (manager, _server) = manager(ReconnectPolicy::default());
        let handle = {
            let _scope = manager.scope();
            manager.initialize(rider()).unwrap()
        };
        assert!(!manager.is_active());
        assert!(handle.is_closed());
    }

    #[tokio::test]
    async fn test_server_drop_reconnects_with_identify() {
        let policy = ReconnectPolicy::fixed(Duration::from_millis(10));
        let (manager, mut server) = manager(policy);
        let handle = manager.initialize(rider()).unwrap();

        let mut peer = timeout(WAIT, server.next_attempt()).await.unwrap().unwrap().accept();
        assert_eq!(peer.recv().await.unwrap().event, events::IDENTIFY);
        wait_for(&handle, ConnectionState::Connected).await;

        peer.drop_connection(DisconnectReason::TransportClose);
        let mut peer = timeout(WAIT, server.next_attempt()).await.unwrap().unwrap().accept();
        assert_eq!(peer.recv().await.unwrap().event, events::IDENTIFY);
        wait_for(&handle, ConnectionState::Connected).await;

        assert!(handle.same_as(&manager.get_active().unwrap()));
        assert_eq!(server.max_in_flight(), 1);
    }
}
