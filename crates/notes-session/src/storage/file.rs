//! File-backed state storage.
//!
//! All keys live in one JSON object on disk. The file is created on first
//! write; a missing file reads as empty.

use std::{
    collections::BTreeMap,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use notes_core::{StateStorage, StorageError};
use tokio::sync::Mutex;

type Values = BTreeMap<String, String>;

/// File storage implementation.
pub struct FileStorage {
    path: PathBuf,
    // Serialises read-modify-write cycles.
    lock: Mutex<()>,
}

impl FileStorage {
    /// Create a storage backed by `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Values, StorageError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(Values::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Values::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn store(&self, values: &Values) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(values)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}

#[async_trait]
impl StateStorage for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        let mut values = self.load().await.unwrap_or_else(|e| {
            tracing::warn!(path = %self.path.display(), "discarding unreadable storage file: {e}");
            Values::new()
        });
        values.insert(key.to_string(), value.to_string());
        self.store(&values).await
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        let mut values = match self.load().await {
            Ok(values) => values,
            Err(StorageError::Corrupt(e)) => {
                tracing::warn!(path = %self.path.display(), "resetting corrupt storage file: {e}");
                Values::new()
            }
            Err(e) => return Err(e),
        };
        if values.remove(key).is_some() || values.is_empty() {
            self.store(&values).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("nested/session.json"));
        assert_eq!(storage.get("currentUser").await.unwrap(), None);
        storage.remove("currentUser").await.unwrap();
    }

    #[tokio::test]
    async fn test_values_persist_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/session.json");

        FileStorage::new(&path).set("a", "1").await.unwrap();
        FileStorage::new(&path).set("b", "2").await.unwrap();

        let storage = FileStorage::new(&path);
        assert_eq!(storage.get("a").await.unwrap().as_deref(), Some("1"));
        storage.remove("a").await.unwrap();
        assert_eq!(FileStorage::new(&path).get("a").await.unwrap(), None);
        assert_eq!(FileStorage::new(&path).get("b").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let storage = FileStorage::new(&path);
        assert!(matches!(storage.get("k").await, Err(StorageError::Corrupt(_))));

        storage.remove("k").await.unwrap();
        assert_eq!(storage.get("k").await.unwrap(), None);
    }
}
