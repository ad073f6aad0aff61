//! Key Store Adapters
//!
//! `FileKeyStore` keeps one JSON file per key under
//! `<root>/<network>/<name>.json`; `InMemoryKeyStore` backs tests and
//! short-lived sessions.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::debug;
use zeroize::Zeroize;

use crate::domain::{KeyPair, SessionError};
use crate::ports::KeyStore;

/// On-disk key record.
#[derive(Serialize, Deserialize)]
struct KeyFile {
    account_id: String,
    public_key: String,
    private_key: String,
}

impl Drop for KeyFile {
    fn drop(&mut self) {
        self.private_key.zeroize();
    }
}

/// Key store rooted at a credentials directory.
#[derive(Clone, Debug)]
pub struct FileKeyStore {
    root: PathBuf,
}

impl FileKeyStore {
    /// Store keys below `root`. The directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Credentials directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_path(&self, network_id: &str, name: &str) -> Result<PathBuf, SessionError> {
        check_component(network_id)?;
        check_component(name)?;
        Ok(self.root.join(network_id).join(format!("{}.json", name)))
    }
}

fn check_component(part: &str) -> Result<(), SessionError> {
    if part.is_empty() || part.starts_with('.') || part.contains(['/', '\\']) {
        return Err(SessionError::KeyStore(format!(
            "`{}` cannot be used as a key store path component",
            part
        )));
    }
    Ok(())
}

fn io_error(path: &Path, e: std::io::Error) -> SessionError {
    SessionError::KeyStore(format!("{}: {}", path.display(), e))
}

/// Replace `path` with `content`: write a sibling `.tmp` file readable only
/// by the owner, then rename it over the target.
pub(super) async fn replace_file(path: &Path, content: &[u8]) -> Result<(), SessionError> {
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(&tmp).await.map_err(|e| io_error(&tmp, e))?;
    file.write_all(content).await.map_err(|e| io_error(&tmp, e))?;
    file.sync_all().await.map_err(|e| io_error(&tmp, e))?;
    drop(file);

    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| io_error(path, e))
}

#[async_trait]
impl KeyStore for FileKeyStore {
    async fn set_key(
        &self,
        network_id: &str,
        name: &str,
        key: &KeyPair,
    ) -> Result<(), SessionError> {
        let path = self.key_path(network_id, name)?;
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| io_error(dir, e))?;
        }

        let record = KeyFile {
            account_id: name.to_string(),
            public_key: key.public_key().to_string(),
            private_key: key.secret_key_string(),
        };
        let mut content = serde_json::to_vec_pretty(&record)
            .map_err(|e| SessionError::KeyStore(e.to_string()))?;
        let written = replace_file(&path, &content).await;
        content.zeroize();
        written?;

        debug!(network = network_id, name, "Stored key");
        Ok(())
    }

    async fn get_key(
        &self,
        network_id: &str,
        name: &str,
    ) -> Result<Option<KeyPair>, SessionError> {
        let path = self.key_path(network_id, name)?;
        let mut content = match tokio::fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(&path, e)),
        };

        let parsed: Result<KeyFile, _> = serde_json::from_slice(&content);
        content.zeroize();
        let record =
            parsed.map_err(|e| SessionError::KeyStore(format!("{}: {}", path.display(), e)))?;
        KeyPair::parse(&record.private_key).map(Some)
    }

    async fn remove_key(&self, network_id: &str, name: &str) -> Result<(), SessionError> {
        let path = self.key_path(network_id, name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(network = network_id, name, "Removed key");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    async fn names(&self, network_id: &str) -> Result<Vec<String>, SessionError> {
        check_component(network_id)?;
        let dir = self.root.join(network_id);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(&dir, e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| io_error(&dir, e))? {
            let file_name = entry.file_name();
            if let Some(name) = file_name.to_str().and_then(|n| n.strip_suffix(".json")) {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Key store that never touches the disk.
#[derive(Default)]
pub struct InMemoryKeyStore {
    keys: RwLock<HashMap<(String, String), KeyPair>>,
}

impl InMemoryKeyStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys held across all networks.
    pub fn len(&self) -> usize {
        self.keys.read().len()
    }

    /// Check if no keys are held.
    pub fn is_empty(&self) -> bool {
        self.keys.read().is_empty()
    }
}

#[async_trait]
impl KeyStore for InMemoryKeyStore {
    async fn set_key(
        &self,
        network_id: &str,
        name: &str,
        key: &KeyPair,
    ) -> Result<(), SessionError> {
        self.keys
            .write()
            .insert((network_id.to_string(), name.to_string()), key.clone());
        Ok(())
    }

    async fn get_key(
        &self,
        network_id: &str,
        name: &str,
    ) -> Result<Option<KeyPair>, SessionError> {
        Ok(self
            .keys
            .read()
            .get(&(network_id.to_string(), name.to_string()))
            .cloned())
    }

    async fn remove_key(&self, network_id: &str, name: &str) -> Result<(), SessionError> {
        self.keys
            .write()
            .remove(&(network_id.to_string(), name.to_string()));
        Ok(())
    }

    async fn names(&self, network_id: &str) -> Result<Vec<String>, SessionError> {
        let mut names: Vec<String> = self
            .keys
            .read()
            .keys()
            .filter(|(network, _)| network == network_id)
            .map(|(_, name)| name.clone())
            .collect();
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyStore::new(dir.path());
        let key = KeyPair::from_seed([7u8; 32]);

        store.set_key("testnet", "alice.testnet", &key).await.unwrap();
        let loaded = store.get_key("testnet", "alice.testnet").await.unwrap().unwrap();
        assert_eq!(loaded.public_key(), key.public_key());

        let raw = std::fs::read_to_string(dir.path().join("testnet/alice.testnet.json")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["account_id"], "alice.testnet");
        assert_eq!(json["public_key"], key.public_key().to_string());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_store_key_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyStore::new(dir.path());
        let key = KeyPair::from_seed([5u8; 32]);
        store.set_key("testnet", "alice.testnet", &key).await.unwrap();
        // Overwriting keeps the mode and leaves no temporary file behind.
        store.set_key("testnet", "alice.testnet", &key).await.unwrap();

        let path = dir.path().join("testnet/alice.testnet.json");
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert!(!dir.path().join("testnet/alice.testnet.json.tmp").exists());
        assert_eq!(store.names("testnet").await.unwrap(), vec!["alice.testnet".to_string()]);
    }

    #[tokio::test]
    async fn test_file_store_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyStore::new(dir.path());
        assert!(store.get_key("testnet", "nobody.testnet").await.unwrap().is_none());
        assert!(store.names("testnet").await.unwrap().is_empty());
        store.remove_key("testnet", "nobody.testnet").await.unwrap();
    }

    #[tokio::test]
    async fn test_file_store_names_per_network() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyStore::new(dir.path());
        let key = KeyPair::from_seed([1u8; 32]);
        store.set_key("testnet", "bob.testnet", &key).await.unwrap();
        store.set_key("testnet", "alice.testnet", &key).await.unwrap();
        store.set_key("mainnet", "carol.near", &key).await.unwrap();

        assert_eq!(
            store.names("testnet").await.unwrap(),
            vec!["alice.testnet".to_string(), "bob.testnet".to_string()]
        );

        store.remove_key("testnet", "bob.testnet").await.unwrap();
        assert_eq!(store.names("testnet").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_file_store_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyStore::new(dir.path());
        let key = KeyPair::from_seed([1u8; 32]);
        let result = store.set_key("testnet", "../escape", &key).await;
        assert!(matches!(result, Err(SessionError::KeyStore(_))));
    }

    #[tokio::test]
    async fn test_file_store_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("testnet")).unwrap();
        std::fs::write(dir.path().join("testnet/bad.testnet.json"), b"not json").unwrap();
        let store = FileKeyStore::new(dir.path());
        let result = store.get_key("testnet", "bad.testnet").await;
        assert!(matches!(result, Err(SessionError::KeyStore(_))));
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = InMemoryKeyStore::new();
        let key = KeyPair::from_seed([3u8; 32]);
        store.set_key("testnet", "alice.testnet", &key).await.unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.get_key("mainnet", "alice.testnet").await.unwrap().is_none());

        store.remove_key("testnet", "alice.testnet").await.unwrap();
        assert!(store.is_empty());
    }
}
