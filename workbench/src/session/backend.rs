//! Key-value backends for the session store

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

/// Backend failure. The session store logs it and degrades to memory.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Session storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Session file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("Session storage quota exceeded ({size} > {quota} bytes)")]
    QuotaExceeded { size: usize, quota: usize },
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Durable key -> string storage
#[async_trait]
pub trait SessionBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// All sessions in a single JSON document on local disk
///
/// Every operation re-reads the file so several workbench processes sharing a
/// directory see each other's writes (last write wins). Writes go to a temporary
/// file in the same directory and are renamed over the previous document.
pub struct FileBackend {
    path: PathBuf,
    quota: Option<usize>,
    lock: Mutex<()>,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            quota: None,
            lock: Mutex::new(()),
        }
    }

    /// Refuse writes that would grow the document beyond `bytes`
    pub fn with_quota(mut self, bytes: usize) -> Self {
        self.quota = Some(bytes);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_document(&self) -> Result<BTreeMap<String, String>, StoreError> {
        match fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_document(&self, document: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(document)?;
        if let Some(quota) = self.quota {
            if json.len() > quota {
                return Err(StoreError::QuotaExceeded {
                    size: json.len(),
                    quota,
                });
            }
        }

        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).await?;

        // Removed on drop unless the rename below succeeds
        let tmp = tempfile::Builder::new()
            .prefix(".sessions-")
            .tempfile_in(&dir)?
            .into_temp_path();
        fs::write(&tmp, json.as_bytes()).await?;
        fs::rename(&tmp, &self.path).await?;
        tmp.keep().map_err(|e| StoreError::Io(e.error))?;

        debug!("Wrote {} session entries to {:?}", document.len(), self.path);
        Ok(())
    }

    async fn update(
        &self,
        apply: impl FnOnce(&mut BTreeMap<String, String>) -> bool + Send,
    ) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut document = self.read_document().await?;
        if apply(&mut document) {
            self.write_document(&document).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl SessionBackend for FileBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.read_document().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.update(|doc| doc.insert(key.to_string(), value.to_string()).as_deref() != Some(value))
            .await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.update(|doc| doc.remove(key).is_some()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_backend_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sessions.json");

        let backend = FileBackend::new(&path);
        backend.set("ws_1_Python_code", "print(1)").await.unwrap();
        backend.set("ws_1_Python_input", "3\n").await.unwrap();

        let reopened = FileBackend::new(&path);
        assert_eq!(
            reopened.get("ws_1_Python_code").await.unwrap().as_deref(),
            Some("print(1)")
        );

        reopened.remove("ws_1_Python_code").await.unwrap();
        assert_eq!(backend.get("ws_1_Python_code").await.unwrap(), None);
        assert_eq!(backend.get("ws_1_Python_input").await.unwrap().as_deref(), Some("3\n"));
    }

    #[tokio::test]
    async fn test_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path().join("absent.json"));
        assert_eq!(backend.get("anything").await.unwrap(), None);
        backend.remove("anything").await.unwrap();
        assert!(!backend.path().exists());
    }

    #[tokio::test]
    async fn test_quota_exceeded() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path().join("sessions.json")).with_quota(64);

        backend.set("k", "small").await.unwrap();
        let err = backend.set("k2", &"x".repeat(128)).await.unwrap_err();
        assert!(matches!(err, StoreError::QuotaExceeded { quota: 64, .. }));
        assert_eq!(backend.get("k2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");
        std::fs::write(&path, "{not json").unwrap();

        let backend = FileBackend::new(&path);
        assert!(matches!(backend.get("k").await, Err(StoreError::Corrupt(_))));
    }
}
