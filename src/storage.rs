use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::config::StorageConfig;

#[derive(Debug)]
pub struct StorageError(pub String);

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for StorageError {}

/// Where avatars and book covers live. Records only keep the returned path.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn put(&self, path: &str, bytes: Bytes) -> Result<String, StorageError>;
    async fn exists(&self, path: &str) -> Result<bool, StorageError>;
    /// Returns whether something was removed.
    async fn delete(&self, path: &str) -> Result<bool, StorageError>;
    /// A URL for the object, or `None` if it does not exist.
    async fn url_for(&self, path: &str, ttl: Option<Duration>) -> Option<String>;
}

/// Files under a local directory, served statically at `public_url`.
pub struct LocalStorage {
    root: PathBuf,
    public_url: String,
}

impl LocalStorage {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            root: config.root.clone(),
            public_url: config.public_url.trim_end_matches('/').to_string(),
        }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(path);
        let safe = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(StorageError(format!("Invalid storage path: {path}")));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    async fn put(&self, path: &str, bytes: Bytes) -> Result<String, StorageError> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError(format!("Failed to create {}: {e}", parent.display())))?;
        }
        tokio::fs::write(&full, &bytes)
            .await
            .map_err(|e| StorageError(format!("Failed to write {path}: {e}")))?;
        tracing::debug!(path, size = bytes.len(), "Stored object");
        Ok(path.to_string())
    }

    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        let full = self.resolve(path)?;
        tokio::fs::try_exists(&full)
            .await
            .map_err(|e| StorageError(format!("Failed to stat {path}: {e}")))
    }

    async fn delete(&self, path: &str) -> Result<bool, StorageError> {
        let full = self.resolve(path)?;
        match tokio::fs::remove_file(&full).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError(format!("Failed to delete {path}: {e}"))),
        }
    }

    async fn url_for(&self, path: &str, _ttl: Option<Duration>) -> Option<String> {
        match self.exists(path).await {
            Ok(true) => Some(format!("{}/{}", self.public_url, path)),
            Ok(false) => None,
            Err(e) => {
                tracing::warn!("Could not resolve URL for {path}: {e}");
                None
            }
        }
    }
}
