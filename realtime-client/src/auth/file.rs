// realtime-client/src/auth/file.rs
// Token 文件存储 - JSON 格式

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::TokenStore;

/// 存储的 token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    pub token: String,
    /// 保存时间 (Unix 毫秒)
    pub saved_at: i64,
}

/// Token persisted as a JSON file
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<base>/<filename>`
    pub fn in_dir(base_path: impl Into<PathBuf>, filename: &str) -> Self {
        Self::new(base_path.into().join(filename))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 加载 token 记录
    pub fn load(&self) -> Option<StoredToken> {
        let json = fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str::<StoredToken>(&json) {
            Ok(stored) => Some(stored),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Ignoring corrupt token file");
                None
            }
        }
    }

    fn ensure_dir(&self) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn get_token(&self) -> Option<String> {
        self.load()
            .map(|stored| stored.token)
            .filter(|token| !token.trim().is_empty())
    }

    fn set_token(&self, token: &str) -> io::Result<()> {
        self.ensure_dir()?;
        let stored = StoredToken {
            token: token.to_string(),
            saved_at: shared::util::now_millis(),
        };
        let json = serde_json::to_string_pretty(&stored)?;
        fs::write(&self.path, json)?;
        tracing::debug!(path = %self.path.display(), "Auth token saved");
        Ok(())
    }

    fn clear_token(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}
