//! Storage backend factory.

use std::sync::Arc;

use mediaforge_core::config::StorageConfig;

use crate::traits::{Storage, StorageError, StorageResult};

/// Build the storage backend named by config ("local" or "s3").
pub async fn create_storage(config: &StorageConfig) -> StorageResult<Arc<dyn Storage>> {
    match config.backend.as_str() {
        #[cfg(feature = "storage-local")]
        "local" => {
            let storage = crate::local::LocalStorage::new(config.local_path.clone()).await?;
            Ok(Arc::new(storage))
        }
        #[cfg(feature = "storage-s3")]
        "s3" => {
            let bucket = config
                .s3_bucket
                .clone()
                .ok_or_else(|| StorageError::ConfigError("MEDIAFORGE_STORAGE_S3_BUCKET not set".into()))?;
            let storage = crate::s3::S3Storage::new(bucket, config.s3_region.clone()).await?;
            Ok(Arc::new(storage))
        }
        other => Err(StorageError::ConfigError(format!(
            "Unknown or disabled storage backend '{}'",
            other
        ))),
    }
}
