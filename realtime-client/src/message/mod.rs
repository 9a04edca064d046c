// realtime-client/src/message/mod.rs
// 消息模块 - 传输配置、重连策略和错误类型

pub mod memory;
pub mod transport;

pub use memory::{MemoryConnector, MemoryPeer, MemoryServer, PendingConnection};
pub use shared::realtime::{DisconnectReason, Frame};
pub use transport::{Connection, Connector, WsConnector};

use std::time::Duration;
use thiserror::Error;

/// Transport-level failure.
///
/// Always transient from the session manager's point of view: it is retried
/// per [`ReconnectPolicy`] and only reported to observers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Unreachable(String),

    #[error("Connect timed out after {0:?}")]
    Timeout(Duration),

    #[error("Connection closed: {0}")]
    Closed(DisconnectReason),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Codec error: {0}")]
    Codec(String),
}

impl From<serde_json::Error> for TransportError {
    fn from(e: serde_json::Error) -> Self {
        TransportError::Codec(e.to_string())
    }
}

/// 重连间隔形状
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every attempt
    Fixed(Duration),
    /// Doubling delay, capped at `max`
    Exponential { initial: Duration, max: Duration },
}

/// 重连策略
///
/// `max_attempts = None` retries until the session is torn down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub backoff: Backoff,
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    /// Unbounded retries, one second apart
    fn default() -> Self {
        Self {
            backoff: Backoff::Fixed(Duration::from_secs(1)),
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    /// 局域网配置: 500ms 起步, 最长 10 秒退避
    pub fn lan() -> Self {
        Self::exponential(Duration::from_millis(500), Duration::from_secs(10))
    }

    /// 广域网/移动网络配置: 1 秒起步, 最长 60 秒退避
    pub fn wan() -> Self {
        Self::exponential(Duration::from_secs(1), Duration::from_secs(60))
    }

    pub fn fixed(delay: Duration) -> Self {
        Self {
            backoff: Backoff::Fixed(delay),
            max_attempts: None,
        }
    }

    pub fn exponential(initial: Duration, max: Duration) -> Self {
        Self {
            backoff: Backoff::Exponential { initial, max },
            max_attempts: None,
        }
    }

    /// 设置最大重连尝试次数
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// 无限重试
    pub fn unbounded(mut self) -> Self {
        self.max_attempts = None;
        self
    }

    pub fn is_unbounded(&self) -> bool {
        self.max_attempts.is_none()
    }

    /// Delay before reconnect attempt `attempt` (1-based), or `None` once the
    /// budget is spent.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if let Some(max) = self.max_attempts
            && attempt > max
        {
            return None;
        }

        let delay = match self.backoff {
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential { initial, max } => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                initial.saturating_mul(factor).min(max)
            }
        };
        Some(delay)
    }
}

/// 传输配置
#[derive(Debug, Clone)]
pub struct TransportOptions {
    /// Upper bound for one connection attempt, including the upgrade
    pub connect_timeout: Duration,
    /// 心跳间隔 (0 表示禁用)
    pub heartbeat_interval: Duration,
    /// 心跳超时 (超过 interval + timeout 未收到任何数据则认为断连)
    pub heartbeat_timeout: Duration,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(20),
            heartbeat_interval: Duration::from_secs(25),
            heartbeat_timeout: Duration::from_secs(20),
        }
    }
}

impl TransportOptions {
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// 设置心跳间隔 (0 表示禁用)
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_heartbeat_timeout(mut self, timeout: Duration) -> Self {
        self.heartbeat_timeout = timeout;
        self
    }

    pub fn heartbeat_enabled(&self) -> bool {
        !self.heartbeat_interval.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_never_gives_up() {
        let policy = ReconnectPolicy::default();
        assert!(policy.is_unbounded());
        assert_eq!(policy.next_delay(1), Some(Duration::from_secs(1)));
        assert_eq!(policy.next_delay(10_000), Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_bounded_policy() {
        let policy = ReconnectPolicy::fixed(Duration::from_millis(50)).with_max_attempts(3);
        assert_eq!(policy.next_delay(3), Some(Duration::from_millis(50)));
        assert_eq!(policy.next_delay(4), None);
    }

    #[test]
    fn test_exponential_backoff_caps() {
        let policy = ReconnectPolicy::exponential(Duration::from_millis(100), Duration::from_secs(1));
        assert_eq!(policy.next_delay(1), Some(Duration::from_millis(100)));
        assert_eq!(policy.next_delay(2), Some(Duration::from_millis(200)));
        assert_eq!(policy.next_delay(4), Some(Duration::from_millis(800)));
        assert_eq!(policy.next_delay(5), Some(Duration::from_secs(1)));
        assert_eq!(policy.next_delay(64), Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_transport_options_builder() {
        let options = TransportOptions::default()
            .with_connect_timeout(Duration::from_secs(3))
            .with_heartbeat_interval(Duration::ZERO);
        assert_eq!(options.connect_timeout, Duration::from_secs(3));
        assert!(!options.heartbeat_enabled());
    }
}
