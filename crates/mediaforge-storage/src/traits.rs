//! Storage abstraction trait implemented by all backends.

use async_trait::async_trait;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for mediaforge_core::MediaError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => mediaforge_core::MediaError::StorageNotFound(key),
            other => mediaforge_core::MediaError::Storage(other.to_string()),
        }
    }
}

/// Storage abstraction trait.
///
/// Keys are caller-computed (see [`crate::paths`]); backends treat them as
/// opaque slash-separated paths.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Whether an object exists at the given key.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Fetch an object's bytes. `NotFound` when the key is absent.
    async fn download(&self, key: &str) -> StorageResult<Vec<u8>>;

    /// Store bytes at the given key, overwriting any prior object.
    /// `cache_control` is applied where the backend supports response headers.
    async fn upload(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
        cache_control: Option<&str>,
    ) -> StorageResult<()>;

    /// Delete the object; returns false when nothing existed at the key.
    async fn delete(&self, key: &str) -> StorageResult<bool>;

    /// Byte size of the object. `NotFound` when the key is absent.
    async fn content_length(&self, key: &str) -> StorageResult<u64>;

    /// Move an object to a new key (copy + delete where the backend has no
    /// native rename).
    async fn rename(&self, from_key: &str, to_key: &str) -> StorageResult<()>;

    /// List object keys under a prefix. Non-recursive listing stops at the
    /// next path separator.
    async fn list(&self, prefix: &str, recursive: bool) -> StorageResult<Vec<String>>;
}
