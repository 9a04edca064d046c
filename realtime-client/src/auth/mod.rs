// realtime-client/src/auth/mod.rs
// 认证存储 - 保存登录后获得的 token

mod file;

pub use file::{FileTokenStore, StoredToken};

use std::io;
use std::sync::{Mutex, PoisonError};

/// Where the bearer token obtained at login lives between app launches
pub trait TokenStore: Send + Sync {
    /// The stored token, `None` if absent or unreadable
    fn get_token(&self) -> Option<String>;

    fn set_token(&self, token: &str) -> io::Result<()>;

    /// Remove the token. Succeeds when nothing is stored.
    fn clear_token(&self) -> io::Result<()>;
}

/// In-memory token store
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn get_token(&self) -> Option<String> {
        self.token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_token(&self, token: &str) -> io::Result<()> {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.to_string());
        Ok(())
    }

    fn clear_token(&self) -> io::Result<()> {
        self.token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        Ok(())
    }
}
