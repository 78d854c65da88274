use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use super::{MediaKey, ObjectStorage, StorageError};

/// Filesystem backend rooted at a directory. Keys map to relative paths.
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &MediaKey) -> PathBuf {
        key.as_str()
            .split('/')
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }
}

async fn ensure_parent(path: &Path) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| StorageError::Backend(format!("create {}: {e}", parent.display())))?;
    }
    Ok(())
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    async fn put(&self, key: &MediaKey, bytes: Vec<u8>, _content_type: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        ensure_parent(&path).await?;

        // Keys are unique per object; an existing file means a key collision.
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| StorageError::Backend(format!("open {key}: {e}")))?;
        file.write_all(&bytes)
            .await
            .map_err(|e| StorageError::Backend(format!("write {key}: {e}")))?;
        file.flush()
            .await
            .map_err(|e| StorageError::Backend(format!("flush {key}: {e}")))?;
        Ok(())
    }

    async fn get(&self, key: &MediaKey) -> Result<Vec<u8>, StorageError> {
        tokio::fs::read(self.path_for(key)).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => StorageError::NotFound(key.to_string()),
            _ => StorageError::Backend(format!("read {key}: {e}")),
        })
    }
}
