// realtime-client/src/message/memory.rs
// 内存传输 - 同进程通信, 测试时由测试代码扮演服务器

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use tokio::sync::{mpsc, oneshot};

use crate::message::{Connection, Connector, DisconnectReason, Frame, TransportError};

/// In-process connector.
///
/// Every `connect()` call is handed to the paired [`MemoryServer`] as a
/// [`PendingConnection`], which the server side accepts or refuses. The
/// attempt stays outstanding until it does.
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    attempts_tx: mpsc::UnboundedSender<PendingConnection>,
    stats: Arc<AttemptStats>,
}

#[derive(Debug, Default)]
struct AttemptStats {
    total: AtomicU32,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Server half of the in-process transport
#[derive(Debug)]
pub struct MemoryServer {
    attempts_rx: mpsc::UnboundedReceiver<PendingConnection>,
    stats: Arc<AttemptStats>,
}

impl MemoryConnector {
    /// 创建连接器及其服务端
    pub fn new() -> (Self, MemoryServer) {
        let (attempts_tx, attempts_rx) = mpsc::unbounded_channel();
        let stats = Arc::new(AttemptStats::default());
        (
            Self {
                attempts_tx,
                stats: stats.clone(),
            },
            MemoryServer { attempts_rx, stats },
        )
    }
}

/// Decrements the in-flight counter however the attempt ends
struct InFlightGuard(Arc<AttemptStats>);

impl InFlightGuard {
    fn enter(stats: &Arc<AttemptStats>) -> Self {
        let now = stats.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        stats.max_in_flight.fetch_max(now, Ordering::SeqCst);
        Self(stats.clone())
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self) -> Result<Box<dyn Connection>, TransportError> {
        let _guard = InFlightGuard::enter(&self.stats);
        let attempt = self.stats.total.fetch_add(1, Ordering::SeqCst) + 1;

        let (reply, reply_rx) = oneshot::channel();
        self.attempts_tx
            .send(PendingConnection { attempt, reply })
            .map_err(|_| TransportError::Unreachable("memory server is gone".into()))?;

        match reply_rx.await {
            Ok(Ok(conn)) => Ok(Box::new(conn)),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(TransportError::Unreachable(
                "memory server abandoned the attempt".into(),
            )),
        }
    }
}

impl MemoryServer {
    /// Wait for the next connection attempt
    pub async fn next_attempt(&mut self) -> Option<PendingConnection> {
        self.attempts_rx.recv().await
    }

    /// Take an attempt that is already queued, if any
    pub fn try_next_attempt(&mut self) -> Option<PendingConnection> {
        self.attempts_rx.try_recv().ok()
    }

    /// Number of `connect()` calls so far
    pub fn total_attempts(&self) -> u32 {
        self.stats.total.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously outstanding attempts observed
    pub fn max_in_flight(&self) -> usize {
        self.stats.max_in_flight.load(Ordering::SeqCst)
    }
}

/// A connection attempt waiting for the server's decision
#[derive(Debug)]
pub struct PendingConnection {
    attempt: u32,
    reply: oneshot::Sender<Result<MemoryConnection, TransportError>>,
}

impl PendingConnection {
    /// 1-based attempt number across the connector's lifetime
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Complete the attempt successfully.
    ///
    /// If the client already gave up on the attempt the returned peer is
    /// simply disconnected.
    pub fn accept(self) -> MemoryPeer {
        let (to_server_tx, to_server_rx) = mpsc::unbounded_channel();
        let (to_client_tx, to_client_rx) = mpsc::unbounded_channel();

        let conn = MemoryConnection {
            tx: Some(to_server_tx),
            rx: to_client_rx,
        };
        if self.reply.send(Ok(conn)).is_err() {
            tracing::debug!(attempt = self.attempt, "Accepted an abandoned memory attempt");
        }

        MemoryPeer {
            rx: to_server_rx,
            tx: to_client_tx,
        }
    }

    /// Fail the attempt with a transport error
    pub fn refuse(self, error: TransportError) {
        let _ = self.reply.send(Err(error));
    }
}

#[derive(Debug)]
enum Signal {
    Frame(Frame),
    Drop(DisconnectReason),
}

/// Client half of an accepted in-process connection
#[derive(Debug)]
pub struct MemoryConnection {
    tx: Option<mpsc::UnboundedSender<Frame>>,
    rx: mpsc::UnboundedReceiver<Signal>,
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn send(&mut self, frame: &Frame) -> Result<(), TransportError> {
        let tx = self
            .tx
            .as_ref()
            .ok_or(TransportError::Closed(DisconnectReason::ClientDisconnect))?;
        tx.send(frame.clone())
            .map_err(|_| TransportError::Closed(DisconnectReason::TransportClose))
    }

    async fn recv(&mut self) -> Result<Frame, TransportError> {
        match self.rx.recv().await {
            Some(Signal::Frame(frame)) => Ok(frame),
            Some(Signal::Drop(reason)) => Err(TransportError::Closed(reason)),
            None => Err(TransportError::Closed(DisconnectReason::TransportClose)),
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.tx = None;
        self.rx.close();
        Ok(())
    }
}

/// Server half of an accepted in-process connection
#[derive(Debug)]
pub struct MemoryPeer {
    rx: mpsc::UnboundedReceiver<Frame>,
    tx: mpsc::UnboundedSender<Signal>,
}

impl MemoryPeer {
    /// Next frame sent by the client, `None` once the client side is closed
    pub async fn recv(&mut self) -> Option<Frame> {
        self.rx.recv().await
    }

    /// Push a frame to the client. Returns false if the client is gone.
    pub fn push(&self, frame: Frame) -> bool {
        self.tx.send(Signal::Frame(frame)).is_ok()
    }

    /// Drop the connection as the transport would, with the given reason
    pub fn drop_connection(self, reason: DisconnectReason) {
        let _ = self.tx.send(Signal::Drop(reason));
    }
}
