//! S3-compatible storage backend.

use crate::traits::{Storage, StorageError, StorageResult};
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;

/// S3 storage implementation.
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
}

impl S3Storage {
    /// Build a client from the ambient AWS environment (credentials chain,
    /// region resolution) and the configured bucket.
    pub async fn new(bucket: String, region: Option<String>) -> StorageResult<Self> {
        if bucket.is_empty() {
            return Err(StorageError::ConfigError("S3 bucket not configured".into()));
        }
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(aws_config::Region::new(region));
        }
        let config = loader.load().await;
        Ok(Self {
            client: Client::new(&config),
            bucket,
        })
    }

    fn is_not_found(err: &aws_sdk_s3::Error) -> bool {
        matches!(
            err,
            aws_sdk_s3::Error::NoSuchKey(_) | aws_sdk_s3::Error::NotFound(_)
        )
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let err = aws_sdk_s3::Error::from(e);
                if Self::is_not_found(&err) {
                    Ok(false)
                } else {
                    Err(StorageError::BackendError(err.to_string()))
                }
            }
        }
    }

    async fn download(&self, key: &str) -> StorageResult<Vec<u8>> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let err = aws_sdk_s3::Error::from(e);
                if Self::is_not_found(&err) {
                    StorageError::NotFound(key.to_string())
                } else {
                    StorageError::DownloadFailed(err.to_string())
                }
            })?;

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?;
        Ok(data.into_bytes().to_vec())
    }

    async fn upload(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
        cache_control: Option<&str>,
    ) -> StorageResult<()> {
        let size = data.len();
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data));
        if let Some(cache_control) = cache_control {
            request = request.cache_control(cache_control);
        }
        request
            .send()
            .await
            .map_err(|e| StorageError::UploadFailed(aws_sdk_s3::Error::from(e).to_string()))?;

        tracing::debug!(key = %key, size_bytes = size, bucket = %self.bucket, "S3 upload");
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<bool> {
        let existed = self.exists(key).await?;
        if !existed {
            return Ok(false);
        }
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::DeleteFailed(aws_sdk_s3::Error::from(e).to_string()))?;
        Ok(true)
    }

    async fn content_length(&self, key: &str) -> StorageResult<u64> {
        let head = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let err = aws_sdk_s3::Error::from(e);
                if Self::is_not_found(&err) {
                    StorageError::NotFound(key.to_string())
                } else {
                    StorageError::BackendError(err.to_string())
                }
            })?;
        Ok(head.content_length().unwrap_or(0) as u64)
    }

    async fn rename(&self, from_key: &str, to_key: &str) -> StorageResult<()> {
        // S3 has no rename; copy then delete.
        self.client
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(format!("{}/{}", self.bucket, from_key))
            .key(to_key)
            .send()
            .await
            .map_err(|e| {
                let err = aws_sdk_s3::Error::from(e);
                if Self::is_not_found(&err) {
                    StorageError::NotFound(from_key.to_string())
                } else {
                    StorageError::BackendError(err.to_string())
                }
            })?;
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(from_key)
            .send()
            .await
            .map_err(|e| StorageError::DeleteFailed(aws_sdk_s3::Error::from(e).to_string()))?;
        Ok(())
    }

    async fn list(&self, prefix: &str, recursive: bool) -> StorageResult<Vec<String>> {
        let normalized = if prefix.is_empty() || prefix.ends_with('/') {
            prefix.to_string()
        } else {
            format!("{}/", prefix)
        };

        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&normalized);
            if !recursive {
                request = request.delimiter("/");
            }
            if let Some(token) = continuation.take() {
                request = request.continuation_token(token);
            }
            let output = request
                .send()
                .await
                .map_err(|e| StorageError::BackendError(aws_sdk_s3::Error::from(e).to_string()))?;

            for object in output.contents() {
                if let Some(key) = object.key() {
                    keys.push(key.to_string());
                }
            }

            match output.next_continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => break,
            }
        }
        keys.sort();
        Ok(keys)
    }
}
