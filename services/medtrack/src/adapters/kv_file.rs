//! services/medtrack/src/adapters/kv_file.rs
//!
//! A file-backed implementation of the `KeyValueStore` port. Each key lives in
//! its own file under the data directory; writes go through a temporary file
//! and a rename so a crash never leaves a half-written value behind.

use async_trait::async_trait;
use medtrack_core::ports::{KeyValueStore, PortError, PortResult};
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::debug;
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct FileKvAdapter {
    root: PathBuf,
}

impl FileKvAdapter {
    /// Creates the adapter, creating `root` if it does not exist yet.
    pub async fn open(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        debug!(path = %root.display(), "Opened file key-value store");
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.root.join(format!("{}.json", file_name))
    }
}

fn storage_error(action: &str, key: &str, e: std::io::Error) -> PortError {
    PortError::Storage(format!("Failed to {} '{}': {}", action, key, e))
}

#[async_trait]
impl KeyValueStore for FileKvAdapter {
    async fn get(&self, key: &str) -> PortResult<Option<String>> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage_error("read", key, e)),
        }
    }

    async fn set(&self, key: &str, value: &str) -> PortResult<()> {
        let target = self.path_for(key);
        let staging = self
            .root
            .join(format!(".{}.tmp", Uuid::new_v4().simple()));
        tokio::fs::write(&staging, value)
            .await
            .map_err(|e| storage_error("write", key, e))?;
        if let Err(e) = tokio::fs::rename(&staging, &target).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(storage_error("write", key, e));
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> PortResult<()> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error("remove", key, e)),
        }
    }

    async fn multi_remove(&self, keys: &[&str]) -> PortResult<()> {
        for key in keys {
            self.remove(key).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn values_survive_reopening() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKvAdapter::open(dir.path()).await.unwrap();
        store.set("@medtrack/medications", "[1,2]").await.unwrap();

        let reopened = FileKvAdapter::open(dir.path()).await.unwrap();
        assert_eq!(
            reopened.get("@medtrack/medications").await.unwrap().as_deref(),
            Some("[1,2]")
        );
    }

    #[tokio::test]
    async fn missing_keys_read_as_none_and_remove_quietly() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKvAdapter::open(dir.path().join("nested")).await.unwrap();
        assert_eq!(store.get("nothing").await.unwrap(), None);
        store.remove("nothing").await.unwrap();
        store.multi_remove(&["a", "b"]).await.unwrap();
    }

    #[tokio::test]
    async fn overwrite_replaces_value_and_leaves_no_staging_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKvAdapter::open(dir.path()).await.unwrap();
        store.set("k", "old").await.unwrap();
        store.set("k", "new").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("new"));

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["k.json".to_string()]);
    }
}
