use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::error::{ApiError, AppResult};
use crate::storage::{self, ObjectStorage};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DeleteFileInput {
    #[validate(length(min = 1, message = "File URL is required"))]
    pub file_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub file_url: String,
}

pub struct FileService {
    storage: Arc<dyn ObjectStorage>,
    max_bytes: usize,
}

impl FileService {
    pub fn new(storage: Arc<dyn ObjectStorage>, max_bytes: usize) -> Self {
        Self { storage, max_bytes }
    }

    pub fn check_size(&self, len: usize) -> AppResult<()> {
        if len > self.max_bytes {
            return Err(ApiError::bad_request(format!(
                "File too large, the limit is {}MB",
                self.max_bytes / (1024 * 1024)
            )));
        }
        Ok(())
    }

    pub async fn upload(&self, file_name: &str, content_type: Option<&str>, bytes: Vec<u8>) -> AppResult<UploadedFile> {
        if bytes.is_empty() {
            return Err(ApiError::bad_request("No file uploaded"));
        }
        self.check_size(bytes.len())?;

        let key = storage::object_key(file_name, &bytes);
        tracing::info!(key = %key, size = bytes.len(), content_type = ?content_type, "Storing upload");
        let file_url = self.storage.put(&key, bytes, content_type).await?;
        Ok(UploadedFile { file_url })
    }

    pub async fn delete(&self, file_url: &str) -> AppResult<()> {
        self.storage.delete_url(file_url.trim()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalDiskStorage;

    fn service(max_bytes: usize) -> (FileService, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!("lms-files-{}", uuid::Uuid::new_v4()));
        let storage = LocalDiskStorage::new(&dir, "http://localhost:5000/uploads");
        (FileService::new(Arc::new(storage), max_bytes), dir)
    }

    #[tokio::test]
    async fn upload_then_delete() {
        let (files, dir) = service(1024);
        let uploaded = files.upload("notes.txt", Some("text/plain"), b"hello".to_vec()).await.unwrap();
        assert!(uploaded.file_url.starts_with("http://localhost:5000/uploads/uploads/2c/"));
        assert!(uploaded.file_url.ends_with("/notes.txt"));

        files.delete(&uploaded.file_url).await.unwrap();
        let again = files.delete(&uploaded.file_url).await.unwrap_err();
        assert_eq!(again.status_code(), 404);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn rejects_empty_and_oversized_files() {
        let (files, _dir) = service(4);
        assert_eq!(files.upload("a.bin", None, vec![]).await.unwrap_err().status_code(), 400);
        assert_eq!(files.upload("a.bin", None, vec![0; 5]).await.unwrap_err().status_code(), 400);
    }

    #[tokio::test]
    async fn foreign_urls_are_refused() {
        let (files, _dir) = service(1024);
        let err = files.delete("https://elsewhere.example.com/x.png").await.unwrap_err();
        assert_eq!(err.status_code(), 400);
    }
}
