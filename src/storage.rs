use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

/// Destination for snapshot payloads.
#[async_trait]
pub trait SnapshotSink: Send + Sync {
    /// Persist `data` under `file_name` and return where it landed.
    async fn store(&self, file_name: &str, data: &[u8]) -> Result<PathBuf>;
}

/// Writes snapshots as files inside one directory, creating it on demand.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl SnapshotSink for FileStorage {
    async fn store(&self, file_name: &str, data: &[u8]) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("failed to create output dir: {}", self.dir.display()))?;

        let path = self.dir.join(file_name);
        fs::write(&path, data)
            .await
            .with_context(|| format!("failed to write snapshot: {}", path.display()))?;
        info!(path = %path.display(), bytes = data.len(), "stored snapshot");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn store_creates_missing_dir() {
        let td = tempdir().unwrap();
        let storage = FileStorage::new(td.path().join("a").join("b"));
        let path = storage.store("1_users.json", b"[]").await.unwrap();
        assert_eq!(path, td.path().join("a").join("b").join("1_users.json"));
        assert_eq!(std::fs::read(&path).unwrap(), b"[]");
    }

    #[tokio::test]
    async fn store_overwrites_same_name() {
        let td = tempdir().unwrap();
        let storage = FileStorage::new(td.path());
        storage.store("x.json", b"first").await.unwrap();
        let path = storage.store("x.json", b"second").await.unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "second");
    }
}
