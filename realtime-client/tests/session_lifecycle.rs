//! Session manager lifecycle over the in-memory transport

use realtime_client::message::{MemoryServer, PendingConnection};
use realtime_client::{
    ChannelEvent, ConnectionHandle, ConnectionState, DisconnectReason, Frame, MemoryConnector,
    ReconnectPolicy, SessionError, SessionIdentity, SessionManager, TransportError, UserType,
};
use serde_json::json;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

fn setup(policy: ReconnectPolicy) -> (SessionManager, MemoryServer) {
    let (connector, server) = MemoryConnector::new();
    (SessionManager::new(connector, policy), server)
}

fn partner() -> SessionIdentity {
    SessionIdentity::new(UserType::TiffinPartner, "vendor-9")
}

async fn next_attempt(server: &mut MemoryServer) -> PendingConnection {
    timeout(WAIT, server.next_attempt())
        .await
        .expect("no connection attempt")
        .expect("connector dropped")
}

async fn wait_for(handle: &ConnectionHandle, state: ConnectionState) {
    let mut rx = handle.watch_state();
    timeout(WAIT, rx.wait_for(|s| *s == state))
        .await
        .expect("state not reached in time")
        .expect("state channel closed");
}

async fn next_event(rx: &mut broadcast::Receiver<ChannelEvent>) -> ChannelEvent {
    timeout(WAIT, rx.recv())
        .await
        .expect("no event in time")
        .expect("event stream closed")
}

#[tokio::test]
async fn test_happy_path() {
    let (manager, mut server) = setup(ReconnectPolicy::default());

    let handle = manager.initialize(partner()).unwrap();
    let mut events = handle.subscribe();
    let mut peer = next_attempt(&mut server).await.accept();

    let identify = timeout(WAIT, peer.recv()).await.unwrap().unwrap();
    assert!(identify.is_identify());
    assert_eq!(
        identify.data,
        json!({ "userType": "tiffin_partner", "userId": "vendor-9" })
    );

    wait_for(&handle, ConnectionState::Connected).await;
    assert_eq!(next_event(&mut events).await, ChannelEvent::Connected);
    assert_eq!(next_event(&mut events).await, ChannelEvent::Identified(partner()));

    // Server push reaches observers
    assert!(peer.push(Frame::new("order_status", json!({ "orderId": "o1", "status": "ready" }))));
    match next_event(&mut events).await {
        ChannelEvent::Message(frame) => {
            assert_eq!(frame.event, "order_status");
            assert_eq!(frame.data["status"], "ready");
        }
        other => panic!("unexpected event: {other:?}"),
    }

    // Application emit reaches the server
    handle
        .emit("ride_update", json!({ "lat": 12.9, "lng": 77.6 }))
        .unwrap();
    let emitted = timeout(WAIT, peer.recv()).await.unwrap().unwrap();
    assert_eq!(emitted.event, "ride_update");
}

#[tokio::test]
async fn test_singleton_across_concurrent_initialize() {
    let (manager, mut server) = setup(ReconnectPolicy::default());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let manager = manager.clone();
            tokio::spawn(async move {
                manager.initialize(SessionIdentity::new(UserType::Rider, format!("rider-{i}")))
            })
        })
        .collect();

    let mut resolved = Vec::new();
    for h in handles {
        resolved.push(h.await.unwrap().unwrap());
    }
    assert!(resolved.windows(2).all(|w| w[0].same_as(&w[1])));

    let _peer = next_attempt(&mut server).await.accept();
    wait_for(&resolved[0], ConnectionState::Connected).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(server.total_attempts(), 1);
}

#[tokio::test]
async fn test_no_anonymous_connection() {
    let (manager, server) = setup(ReconnectPolicy::default());

    for user_id in ["", "   "] {
        let result = manager.initialize(SessionIdentity::new(UserType::Customer, user_id));
        assert!(matches!(result, Err(SessionError::NoIdentity)));
    }

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!manager.is_active());
    assert_eq!(server.total_attempts(), 0);
}

#[tokio::test]
async fn test_drop_and_recover() {
    let (manager, mut server) = setup(ReconnectPolicy::fixed(Duration::from_millis(20)));
    let handle = manager.initialize(partner()).unwrap();
    let mut events = handle.subscribe();

    let peer = next_attempt(&mut server).await.accept();
    wait_for(&handle, ConnectionState::Connected).await;
    assert_eq!(next_event(&mut events).await, ChannelEvent::Connected);
    assert_eq!(next_event(&mut events).await, ChannelEvent::Identified(partner()));

    peer.drop_connection(DisconnectReason::PingTimeout);
    assert_eq!(
        next_event(&mut events).await,
        ChannelEvent::Disconnected {
            reason: DisconnectReason::PingTimeout
        }
    );
    assert_eq!(handle.state(), ConnectionState::Reconnecting);
    assert!(!handle.is_identified());
    assert!(matches!(
        handle.emit("ride_update", json!({})),
        Err(SessionError::NotConnected)
    ));

    // First retry fails, second succeeds
    next_attempt(&mut server)
        .await
        .refuse(TransportError::Unreachable("no route".into()));
    let mut peer = next_attempt(&mut server).await.accept();

    // identify is written on the new transport before `connected` is committed
    let identify = timeout(WAIT, peer.recv()).await.unwrap().unwrap();
    assert!(identify.is_identify());
    wait_for(&handle, ConnectionState::Connected).await;

    let mut seen = Vec::new();
    loop {
        let event = next_event(&mut events).await;
        let done = matches!(event, ChannelEvent::Identified(_));
        seen.push(event);
        if done {
            break;
        }
    }
    assert_eq!(
        seen,
        vec![
            ChannelEvent::ReconnectAttempt { attempt: 1 },
            ChannelEvent::ConnectError {
                error: TransportError::Unreachable("no route".into())
            },
            ChannelEvent::ReconnectAttempt { attempt: 2 },
            ChannelEvent::Reconnected { attempt: 2 },
            ChannelEvent::Identified(partner()),
        ]
    );

    assert!(manager.get_active().unwrap().same_as(&handle));
    assert_eq!(server.total_attempts(), 3);
    assert_eq!(server.max_in_flight(), 1);
}

#[tokio::test]
async fn test_handshake_after_every_reconnect() {
    let (manager, mut server) = setup(ReconnectPolicy::fixed(Duration::from_millis(5)));
    let handle = manager.initialize(partner()).unwrap();

    for _ in 0..3 {
        let mut peer = next_attempt(&mut server).await.accept();
        let first = timeout(WAIT, peer.recv()).await.unwrap().unwrap();
        assert!(first.is_identify());
        wait_for(&handle, ConnectionState::Connected).await;
        // Exactly one identify per connection
        assert!(timeout(Duration::from_millis(50), peer.recv()).await.is_err());
        peer.drop_connection(DisconnectReason::TransportClose);
        wait_for(&handle, ConnectionState::Reconnecting).await;
    }
}

#[tokio::test]
async fn test_teardown_cancels_retries() {
    let (manager, mut server) = setup(ReconnectPolicy::fixed(Duration::from_millis(100)));
    let handle = manager.initialize(partner()).unwrap();

    next_attempt(&mut server)
        .await
        .refuse(TransportError::Timeout(Duration::from_secs(20)));
    wait_for(&handle, ConnectionState::Reconnecting).await;

    // Teardown during the backoff window
    manager.teardown();
    assert_eq!(handle.state(), ConnectionState::Disconnected);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(server.try_next_attempt().is_none());
    assert_eq!(server.total_attempts(), 1);
    assert!(!manager.is_active());
}

#[tokio::test]
async fn test_teardown_idempotent_and_observers_released() {
    let (manager, mut server) = setup(ReconnectPolicy::default());
    let handle = manager.initialize(partner()).unwrap();
    let mut events = handle.subscribe();
    let mut peer = next_attempt(&mut server).await.accept();
    wait_for(&handle, ConnectionState::Connected).await;

    manager.teardown();
    manager.teardown();

    // The transport is closed
    loop {
        match timeout(WAIT, peer.recv()).await.unwrap() {
            Some(frame) => assert!(frame.is_identify()),
            None => break,
        }
    }

    // Observers drain then see the stream end
    while let Ok(event) = timeout(WAIT, events.recv()).await.unwrap() {
        assert!(event.is_lifecycle());
    }
    assert!(matches!(manager.get_active(), Err(SessionError::NotInitialized)));
    assert_eq!(handle.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_reinitialize_after_teardown() {
    let (manager, mut server) = setup(ReconnectPolicy::default());
    let first = manager.initialize(partner()).unwrap();
    let _peer = next_attempt(&mut server).await.accept();
    wait_for(&first, ConnectionState::Connected).await;

    manager.teardown();

    let driver = SessionIdentity::new(UserType::Driver, "driver-1");
    let second = manager.initialize(driver.clone()).unwrap();
    assert!(!second.same_as(&first));
    assert_eq!(second.identity(), &driver);

    let mut peer = next_attempt(&mut server).await.accept();
    let identify = timeout(WAIT, peer.recv()).await.unwrap().unwrap();
    assert_eq!(identify.parse_data::<SessionIdentity>().unwrap(), driver);
}
