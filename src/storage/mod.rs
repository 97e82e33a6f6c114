//! Object storage port for uploaded files.

pub mod bucket;
pub mod local;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use thiserror::Error;

pub use bucket::BucketStorage;
pub use local::LocalDiskStorage;

use crate::config::{StorageBackend, StorageConfig};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage is not configured: {0}")]
    NotConfigured(&'static str),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("URL does not belong to this store: {0}")]
    ForeignUrl(String),

    #[error("Storage backend returned {status}: {message}")]
    Backend { status: u16, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `bytes` under `key` and return the public URL.
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: Option<&str>) -> Result<String, StorageError>;

    /// Remove the object a previously returned public URL points at.
    async fn delete_url(&self, url: &str) -> Result<(), StorageError>;
}

pub fn from_config(config: &StorageConfig) -> Result<Arc<dyn ObjectStorage>, StorageError> {
    Ok(match config.backend {
        StorageBackend::Local => Arc::new(LocalDiskStorage::new(&config.local_dir, &config.public_base_url)),
        StorageBackend::Bucket => Arc::new(BucketStorage::from_config(config)?),
    })
}

/// Content-addressed key: identical uploads land on the same object.
/// `uploads/<first two hex chars>/<sha256>/<sanitized file name>`
pub fn object_key(file_name: &str, bytes: &[u8]) -> String {
    let digest = format!("{:x}", Sha256::digest(bytes));
    format!("uploads/{}/{}/{}", &digest[..2], digest, sanitize_file_name(file_name))
}

/// Keep ASCII alphanumerics, `.`, `-` and `_`; everything else becomes `_`.
pub fn sanitize_file_name(name: &str) -> String {
    // Browsers may send a full client path
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let trimmed = cleaned.trim_matches('.');
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Strip `base` from `url`, yielding the object key.
pub(crate) fn key_from_url(base: &str, url: &str) -> Result<String, StorageError> {
    let prefix = format!("{}/", base.trim_end_matches('/'));
    url.strip_prefix(&prefix)
        .filter(|key| !key.is_empty() && !key.split('/').any(|seg| seg == ".." || seg.is_empty()))
        .map(str::to_string)
        .ok_or_else(|| StorageError::ForeignUrl(url.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_content_addressed() {
        let a = object_key("notes.pdf", b"hello");
        let b = object_key("notes.pdf", b"hello");
        let c = object_key("notes.pdf", b"world");
        assert_eq!(a, b);
        assert_ne!(a, c);
        // sha256("hello")
        assert_eq!(
            a,
            "uploads/2c/2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824/notes.pdf"
        );
    }

    #[test]
    fn sanitizes_names() {
        assert_eq!(sanitize_file_name("C:\\Users\\me\\My File (1).mp4"), "My_File__1_.mp4");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name(".."), "file");
        assert_eq!(sanitize_file_name(""), "file");
    }

    #[test]
    fn extracts_keys_from_own_urls_only() {
        let base = "http://localhost:5000/uploads";
        assert_eq!(key_from_url(base, "http://localhost:5000/uploads/uploads/ab/abc/x.png").unwrap(), "uploads/ab/abc/x.png");
        assert!(matches!(key_from_url(base, "https://evil.example/x.png"), Err(StorageError::ForeignUrl(_))));
        assert!(key_from_url(base, "http://localhost:5000/uploads/../secret").is_err());
    }
}
