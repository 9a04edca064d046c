//! Realtime Mock - development server for the realtime client
//!
//! Serves `GET /profile` and the `GET /socket` realtime channel. Tests start
//! it on an ephemeral port with [`MockServer::start`].

pub mod api;
pub mod config;
pub mod state;

pub use config::MockConfig;
pub use state::{AppState, SocketCommand};

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// A running mock server; shuts down when dropped
#[derive(Debug)]
pub struct MockServer {
    addr: SocketAddr,
    state: Arc<AppState>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl MockServer {
    /// Serve `state` on `addr` (use port 0 for an ephemeral port)
    pub async fn start(addr: &str, state: Arc<AppState>) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        let app = api::router(state.clone());
        let (shutdown, shutdown_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = result {
                tracing::error!("Mock server error: {e}");
            }
        });

        tracing::info!(%addr, "Realtime mock listening");
        Ok(Self {
            addr,
            state,
            shutdown: Some(shutdown),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// `http://<addr>`
    pub fn api_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// `ws://<addr>/socket`
    pub fn socket_url(&self) -> String {
        format!("ws://{}/socket", self.addr)
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}
