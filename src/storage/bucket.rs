use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use super::{key_from_url, ObjectStorage, StorageError};
use crate::config::StorageConfig;

/// Bucket-style object store over HTTP (`/storage/v1/object/...` API)
pub struct BucketStorage {
    http: Client,
    base_url: String,
    bucket: String,
    service_key: String,
}

impl BucketStorage {
    pub fn from_config(config: &StorageConfig) -> Result<Self, StorageError> {
        let base_url = config.bucket_url.clone().ok_or(StorageError::NotConfigured("STORAGE_BUCKET_URL"))?;
        let bucket = config.bucket.clone().ok_or(StorageError::NotConfigured("STORAGE_BUCKET"))?;
        let service_key = config.service_key.clone().ok_or(StorageError::NotConfigured("STORAGE_SERVICE_KEY"))?;
        Ok(Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            bucket,
            service_key,
        })
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, self.bucket, key)
    }

    fn public_base(&self) -> String {
        format!("{}/storage/v1/object/public/{}", self.base_url, self.bucket)
    }

    async fn check(response: reqwest::Response, key: &str) -> Result<(), StorageError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        if status == StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(key.to_string()));
        }
        let message = response.text().await.unwrap_or_default();
        Err(StorageError::Backend { status: status.as_u16(), message })
    }
}

#[async_trait]
impl ObjectStorage for BucketStorage {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: Option<&str>) -> Result<String, StorageError> {
        let response = self
            .http
            .put(self.object_url(key))
            .bearer_auth(&self.service_key)
            .header("x-upsert", "true")
            .header(reqwest::header::CONTENT_TYPE, content_type.unwrap_or("application/octet-stream"))
            .body(bytes)
            .send()
            .await?;
        Self::check(response, key).await?;
        Ok(format!("{}/{}", self.public_base(), key))
    }

    async fn delete_url(&self, url: &str) -> Result<(), StorageError> {
        let key = key_from_url(&self.public_base(), url)?;
        let response = self
            .http
            .delete(self.object_url(&key))
            .bearer_auth(&self.service_key)
            .send()
            .await?;
        Self::check(response, &key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageBackend;

    fn config() -> StorageConfig {
        StorageConfig {
            backend: StorageBackend::Bucket,
            local_dir: "uploads".to_string(),
            public_base_url: String::new(),
            bucket_url: Some("https://project.storage.test/".to_string()),
            bucket: Some("course-files".to_string()),
            service_key: Some("service".to_string()),
        }
    }

    #[test]
    fn builds_object_and_public_urls() {
        let storage = BucketStorage::from_config(&config()).unwrap();
        assert_eq!(
            storage.object_url("uploads/ab/x.mp4"),
            "https://project.storage.test/storage/v1/object/course-files/uploads/ab/x.mp4"
        );
        let public = format!("{}/uploads/ab/x.mp4", storage.public_base());
        assert_eq!(public, "https://project.storage.test/storage/v1/object/public/course-files/uploads/ab/x.mp4");
        assert_eq!(key_from_url(&storage.public_base(), &public).unwrap(), "uploads/ab/x.mp4");
    }

    #[test]
    fn requires_bucket_settings() {
        let mut cfg = config();
        cfg.service_key = None;
        assert!(matches!(BucketStorage::from_config(&cfg), Err(StorageError::NotConfigured("STORAGE_SERVICE_KEY"))));
    }
}
