use async_trait::async_trait;
use std::path::PathBuf;

use super::{key_from_url, ObjectStorage, StorageError};

/// Files on the server's disk, served back under `public_base_url`
pub struct LocalDiskStorage {
    root: PathBuf,
    public_base_url: String,
}

impl LocalDiskStorage {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }
}

#[async_trait]
impl ObjectStorage for LocalDiskStorage {
    async fn put(&self, key: &str, bytes: Vec<u8>, _content_type: Option<&str>) -> Result<String, StorageError> {
        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        Ok(format!("{}/{}", self.public_base_url, key))
    }

    async fn delete_url(&self, url: &str) -> Result<(), StorageError> {
        let key = key_from_url(&self.public_base_url, url)?;
        match tokio::fs::remove_file(self.root.join(&key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound(key)),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_delete() {
        let root = std::env::temp_dir().join(format!("lms-storage-{}", uuid::Uuid::new_v4()));
        let storage = LocalDiskStorage::new(&root, "http://files.test/");

        let url = storage.put("uploads/aa/bb/a.txt", b"hi".to_vec(), Some("text/plain")).await.unwrap();
        assert_eq!(url, "http://files.test/uploads/aa/bb/a.txt");
        assert_eq!(tokio::fs::read(root.join("uploads/aa/bb/a.txt")).await.unwrap(), b"hi");

        storage.delete_url(&url).await.unwrap();
        assert!(matches!(storage.delete_url(&url).await, Err(StorageError::NotFound(_))));

        let _ = tokio::fs::remove_dir_all(&root).await;
    }
}
