use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::auth::TokenStore;
use crate::message::{DisconnectReason, Frame, TransportError, TransportOptions};

/// Opens realtime connections.
///
/// One call is one connection attempt; retrying is the session manager's job.
#[async_trait]
pub trait Connector: Send + Sync + fmt::Debug {
    async fn connect(&self) -> Result<Box<dyn Connection>, TransportError>;
}

/// An open, bidirectional realtime event channel
#[async_trait]
pub trait Connection: Send + fmt::Debug {
    async fn send(&mut self, frame: &Frame) -> Result<(), TransportError>;

    /// Next inbound frame.
    ///
    /// Returns `TransportError::Closed` once the connection is gone. Must be
    /// cancel safe: the driver polls it inside `select!`.
    async fn recv(&mut self) -> Result<Frame, TransportError>;

    async fn close(&mut self) -> Result<(), TransportError>;
}

/// WebSocket connector
#[derive(Clone)]
pub struct WsConnector {
    url: String,
    token: Option<String>,
    tokens: Option<Arc<dyn TokenStore>>,
    options: TransportOptions,
}

impl WsConnector {
    pub fn new(url: impl Into<String>, options: TransportOptions) -> Self {
        Self {
            url: url.into(),
            token: None,
            tokens: None,
            options,
        }
    }

    /// Send `Authorization: Bearer <token>` on the upgrade request
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Read the bearer token from `tokens` on every attempt.
    ///
    /// A stored token wins over the fixed one from [`with_token`](Self::with_token).
    pub fn with_token_store(mut self, tokens: Arc<dyn TokenStore>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn bearer_token(&self) -> Option<String> {
        self.tokens
            .as_ref()
            .and_then(|store| store.get_token())
            .or_else(|| self.token.clone())
    }
}

impl fmt::Debug for WsConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WsConnector")
            .field("url", &self.url)
            .field("has_token", &self.token.is_some())
            .field("has_token_store", &self.tokens.is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self) -> Result<Box<dyn Connection>, TransportError> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::Protocol(format!("Invalid realtime URL: {e}")))?;

        if let Some(token) = self.bearer_token() {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| TransportError::Protocol(format!("Invalid auth token: {e}")))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        tracing::debug!(url = %self.url, "Opening realtime WebSocket");

        let (stream, _response) = tokio::time::timeout(
            self.options.connect_timeout,
            tokio_tungstenite::connect_async(request),
        )
        .await
        .map_err(|_| TransportError::Timeout(self.options.connect_timeout))?
        .map_err(|e| TransportError::Unreachable(e.to_string()))?;

        Ok(Box::new(WsConnection::new(stream, &self.options)))
    }
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket connection with client-driven heartbeat
pub struct WsConnection {
    stream: WsStream,
    /// Silence longer than this closes the connection with `ping timeout`
    idle_limit: Option<Duration>,
    ping: Interval,
    last_seen: Instant,
}

impl WsConnection {
    fn new(stream: WsStream, options: &TransportOptions) -> Self {
        // Unused when the heartbeat is disabled, but Interval rejects a zero period
        let period = if options.heartbeat_enabled() {
            options.heartbeat_interval
        } else {
            Duration::from_secs(3600)
        };
        let mut ping = tokio::time::interval_at(Instant::now() + period, period);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Self {
            stream,
            idle_limit: options
                .heartbeat_enabled()
                .then(|| options.heartbeat_interval + options.heartbeat_timeout),
            ping,
            last_seen: Instant::now(),
        }
    }

    fn closed(e: impl fmt::Display) -> TransportError {
        TransportError::Closed(DisconnectReason::TransportError(e.to_string()))
    }
}

impl fmt::Debug for WsConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WsConnection")
            .field("idle_limit", &self.idle_limit)
            .field("last_seen", &self.last_seen)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Connection for WsConnection {
    async fn send(&mut self, frame: &Frame) -> Result<(), TransportError> {
        let text = frame.to_text()?;
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(Self::closed)
    }

    async fn recv(&mut self) -> Result<Frame, TransportError> {
        loop {
            let heartbeat = self.idle_limit.is_some();
            let idle_deadline = self.last_seen + self.idle_limit.unwrap_or_default();

            tokio::select! {
                msg = self.stream.next() => {
                    self.last_seen = Instant::now();
                    match msg {
                        Some(Ok(Message::Text(text))) => match Frame::from_text(text.as_str()) {
                            Ok(frame) => return Ok(frame),
                            Err(e) => {
                                tracing::warn!(error = %e, "Dropping malformed realtime frame");
                            }
                        },
                        Some(Ok(Message::Close(close))) => {
                            tracing::debug!(?close, "Server closed realtime connection");
                            return Err(TransportError::Closed(DisconnectReason::ServerDisconnect));
                        }
                        // Ping/Pong/Binary only count as liveness
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(Self::closed(e)),
                        None => return Err(TransportError::Closed(DisconnectReason::TransportClose)),
                    }
                }

                _ = self.ping.tick(), if heartbeat => {
                    if let Err(e) = self.stream.send(Message::Ping(Vec::new().into())).await {
                        return Err(Self::closed(e));
                    }
                }

                _ = tokio::time::sleep_until(idle_deadline), if heartbeat => {
                    return Err(TransportError::Closed(DisconnectReason::PingTimeout));
                }
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.stream.close(None).await.map_err(Self::closed)
    }
}
