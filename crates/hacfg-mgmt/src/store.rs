//! Document store backed by a file on local disk.

use async_trait::async_trait;
use hacfg_core::ports::{DocumentStore, PortError};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

/// Stores the document in a file.
///
/// A write fails with [`PortError::Conflict`] when the file changed since
/// this store last read it. The new content goes to a sibling temporary
/// file first and is renamed over the original.
#[derive(Debug)]
pub struct FileDocumentStore {
    path: PathBuf,
    last_read: Mutex<Option<String>>,
}

impl FileDocumentStore {
    /// Store over `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_read: Mutex::new(None),
        }
    }

    /// Path of the document file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl DocumentStore for FileDocumentStore {
    async fn read(&self) -> Result<String, PortError> {
        let text = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            PortError::Unavailable(format!("{}: {}", self.path.display(), e))
        })?;
        *self.last_read.lock().await = Some(text.clone());
        Ok(text)
    }

    async fn write(&self, document: &str) -> Result<(), PortError> {
        let mut last_read = self.last_read.lock().await;
        if let Some(expected) = last_read.as_deref() {
            let current = tokio::fs::read_to_string(&self.path)
                .await
                .map_err(|e| PortError::Io(format!("{}: {}", self.path.display(), e)))?;
            if current != expected {
                return Err(PortError::Conflict(format!(
                    "{} changed since it was read",
                    self.path.display()
                )));
            }
        }

        let temp = self.temp_path();
        tokio::fs::write(&temp, document)
            .await
            .map_err(|e| PortError::Io(format!("{}: {}", temp.display(), e)))?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|e| PortError::Io(format!("{}: {}", self.path.display(), e)))?;
        debug!(path = %self.path.display(), bytes = document.len(), "document written");

        *last_read = Some(document.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_read_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cib.json");
        std::fs::write(&path, "old").unwrap();
        let store = FileDocumentStore::new(&path);

        assert_eq!(store.read().await.unwrap(), "old");
        store.write("new").await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
        assert!(!dir.path().join("cib.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_consecutive_writes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cib.json");
        std::fs::write(&path, "v1").unwrap();
        let store = FileDocumentStore::new(&path);

        store.read().await.unwrap();
        store.write("v2").await.unwrap();
        store.write("v3").await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "v3");
    }

    #[tokio::test]
    async fn test_conflict_when_changed_behind_our_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cib.json");
        std::fs::write(&path, "v1").unwrap();
        let store = FileDocumentStore::new(&path);

        store.read().await.unwrap();
        std::fs::write(&path, "v1 edited elsewhere").unwrap();

        let err = store.write("v2").await.unwrap_err();
        assert!(matches!(err, PortError::Conflict(_)));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "v1 edited elsewhere");
    }

    #[tokio::test]
    async fn test_missing_file_is_unavailable() {
        let dir = tempdir().unwrap();
        let store = FileDocumentStore::new(dir.path().join("missing.json"));

        let err = store.read().await.unwrap_err();
        assert!(matches!(err, PortError::Unavailable(_)));
    }
}
