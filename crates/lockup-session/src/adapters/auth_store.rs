//! Auth Store Adapters
//!
//! Persist the wallet grant (`AuthData`) between sessions. The file store
//! keeps every entry in a single JSON document keyed by store key.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::debug;

use super::key_store::replace_file;
use crate::domain::{AuthData, SessionError};
use crate::ports::AuthStore;

/// Auth data persisted to one JSON file.
#[derive(Debug)]
pub struct FileAuthStore {
    path: PathBuf,
    // Serializes read-modify-write cycles on the file.
    lock: Mutex<()>,
}

impl FileAuthStore {
    /// Store auth data in `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<HashMap<String, AuthData>, SessionError> {
        match tokio::fs::read(&self.path).await {
            Ok(content) => serde_json::from_slice(&content).map_err(|e| {
                SessionError::KeyStore(format!("{}: {}", self.path.display(), e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(SessionError::KeyStore(format!(
                "{}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    async fn write_all(&self, entries: &HashMap<String, AuthData>) -> Result<(), SessionError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| SessionError::KeyStore(format!("{}: {}", dir.display(), e)))?;
        }
        let content = serde_json::to_vec_pretty(entries)
            .map_err(|e| SessionError::KeyStore(e.to_string()))?;
        replace_file(&self.path, &content).await
    }
}

#[async_trait]
impl AuthStore for FileAuthStore {
    async fn load(&self, key: &str) -> Result<Option<AuthData>, SessionError> {
        let _guard = self.lock.lock().await;
        Ok(self.read_all().await?.remove(key))
    }

    async fn save(&self, key: &str, data: &AuthData) -> Result<(), SessionError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_all().await?;
        entries.insert(key.to_string(), data.clone());
        self.write_all(&entries).await?;
        debug!(key, account = %data.account_id, "Saved wallet auth");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), SessionError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_all().await?;
        if entries.remove(key).is_some() {
            self.write_all(&entries).await?;
            debug!(key, "Removed wallet auth");
        }
        Ok(())
    }
}

/// Auth store that lives only as long as the process.
#[derive(Debug, Default)]
pub struct InMemoryAuthStore {
    entries: RwLock<HashMap<String, AuthData>>,
}

impl InMemoryAuthStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuthStore for InMemoryAuthStore {
    async fn load(&self, key: &str) -> Result<Option<AuthData>, SessionError> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn save(&self, key: &str, data: &AuthData) -> Result<(), SessionError> {
        self.entries.write().insert(key.to_string(), data.clone());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), SessionError> {
        self.entries.write().remove(key);
        Ok(())
    }
}
