//! Client configuration

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{FileTokenStore, TokenStore};
use crate::message::{ReconnectPolicy, TransportOptions, WsConnector};
use crate::session::SessionManager;
use crate::{ClientResult, HttpClient};

/// Client configuration
///
/// # 环境变量
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | REALTIME_API_URL | http://localhost:4000 | REST API 地址 |
/// | REALTIME_SOCKET_URL | 由 API 地址推导 (`ws://.../socket`) | 实时通道地址 |
/// | REALTIME_TIMEOUT_SECS | 30 | HTTP 请求超时(秒) |
/// | REALTIME_TOKEN_PATH | 无 | Token 文件路径 |
/// | REALTIME_RECONNECT_DELAY_MS | 1000 | 固定重连间隔(毫秒) |
/// | REALTIME_RECONNECT_MAX_ATTEMPTS | 无限 | 最大重连次数 |
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// REST API base URL (e.g., "http://localhost:4000")
    pub api_url: String,

    /// Realtime endpoint; derived from `api_url` when unset
    pub socket_url: Option<String>,

    /// Bearer token for the REST API and the realtime upgrade
    pub token: Option<String>,

    /// Request timeout in seconds
    pub timeout: u64,

    /// Where [`FileTokenStore`] keeps the token
    pub token_path: Option<PathBuf>,

    pub reconnect: ReconnectPolicy,

    pub transport: TransportOptions,
}

impl ClientConfig {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            socket_url: None,
            token: None,
            timeout: 30,
            token_path: None,
            reconnect: ReconnectPolicy::default(),
            transport: TransportOptions::default(),
        }
    }

    /// 从环境变量加载配置 (先读取 .env)
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let mut config = Self::new(
            std::env::var("REALTIME_API_URL").unwrap_or_else(|_| "http://localhost:4000".into()),
        );
        config.socket_url = std::env::var("REALTIME_SOCKET_URL").ok();
        config.timeout = std::env::var("REALTIME_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);
        config.token_path = std::env::var("REALTIME_TOKEN_PATH").ok().map(PathBuf::from);

        if let Some(delay) = std::env::var("REALTIME_RECONNECT_DELAY_MS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.reconnect = ReconnectPolicy::fixed(Duration::from_millis(delay));
        }
        if let Some(max) = std::env::var("REALTIME_RECONNECT_MAX_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.reconnect = config.reconnect.with_max_attempts(max);
        }

        config
    }

    pub fn with_socket_url(mut self, url: impl Into<String>) -> Self {
        self.socket_url = Some(url.into());
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout = seconds;
        self
    }

    pub fn with_token_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_path = Some(path.into());
        self
    }

    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    pub fn with_transport(mut self, options: TransportOptions) -> Self {
        self.transport = options;
        self
    }

    /// Realtime endpoint: `socket_url`, or `api_url` with a ws scheme and
    /// `/socket` appended
    pub fn realtime_url(&self) -> String {
        if let Some(ref url) = self.socket_url {
            return url.clone();
        }
        let base = self.api_url.trim_end_matches('/');
        let ws = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            base.to_string()
        };
        format!("{ws}/socket")
    }

    pub fn build_http_client(&self) -> ClientResult<HttpClient> {
        HttpClient::new(self)
    }

    pub fn build_connector(&self) -> WsConnector {
        let connector = WsConnector::new(self.realtime_url(), self.transport.clone());
        match self.token {
            Some(ref token) => connector.with_token(token.clone()),
            None => connector,
        }
    }

    pub fn build_session_manager(&self) -> SessionManager {
        SessionManager::new(self.build_connector(), self.reconnect.clone())
    }

    /// Session manager whose upgrade request carries the token currently in
    /// `tokens`, so a token saved by login reaches the realtime channel
    pub fn build_session_manager_with_tokens(&self, tokens: Arc<dyn TokenStore>) -> SessionManager {
        SessionManager::new(
            self.build_connector().with_token_store(tokens),
            self.reconnect.clone(),
        )
    }

    /// File token store at `token_path`, if configured
    pub fn token_store(&self) -> Option<FileTokenStore> {
        self.token_path.as_ref().map(FileTokenStore::new)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new("http://localhost:4000")
    }
}
