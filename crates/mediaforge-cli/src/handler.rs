//! Work-unit execution wiring for the CLI.

use std::sync::Arc;

use async_trait::async_trait;

use mediaforge_core::models::{CompressionPolicy, SizeSpecSet, VideoPolicy};
use mediaforge_core::{MediaError, MediaResult};
use mediaforge_db::AssetRepository;
use mediaforge_processing::VideoTransformEngine;
use mediaforge_services::{CompressService, RefreshReconciler, SizeVariantGenerator};
use mediaforge_storage::{paths, Storage};
use mediaforge_worker::{run_with_retry, Dispatcher, UnitDescriptor, UnitHandler, UnitKind};

/// Executes work units against the service layer.
pub struct ServiceUnitHandler {
    storage: Arc<dyn Storage>,
    repo: AssetRepository,
    variants: SizeVariantGenerator,
    compress: CompressService,
    refresh: RefreshReconciler,
    video: VideoTransformEngine,
    sizes: SizeSpecSet,
    policy: CompressionPolicy,
    video_policy: VideoPolicy,
}

impl ServiceUnitHandler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        storage: Arc<dyn Storage>,
        repo: AssetRepository,
        variants: SizeVariantGenerator,
        compress: CompressService,
        refresh: RefreshReconciler,
        video: VideoTransformEngine,
        sizes: SizeSpecSet,
        policy: CompressionPolicy,
        video_policy: VideoPolicy,
    ) -> Self {
        Self {
            storage,
            repo,
            variants,
            compress,
            refresh,
            video,
            sizes,
            policy,
            video_policy,
        }
    }

    fn payload_key<'a>(unit: &'a UnitDescriptor) -> MediaResult<&'a str> {
        unit.payload["key"].as_str().ok_or_else(|| {
            MediaError::InvalidInput(format!("unit {} payload has no 'key'", unit.id))
        })
    }

    fn payload_id(unit: &UnitDescriptor) -> MediaResult<i64> {
        unit.payload["id"].as_i64().ok_or_else(|| {
            MediaError::InvalidInput(format!("unit {} payload has no 'id'", unit.id))
        })
    }

    /// Transcode a stored video into the configured container and drop a
    /// poster frame next to it.
    async fn transcode_stored(&self, key: &str) -> MediaResult<serde_json::Value> {
        let data = self.storage.download(key).await.map_err(MediaError::from)?;
        let transcoded = self.video.transcode(&data, &self.video_policy).await?;

        let output_key = paths::with_extension(key, self.video_policy.container.extension());
        self.storage
            .upload(
                &output_key,
                transcoded.bytes.to_vec(),
                self.video_policy.container.mime_type(),
                None,
            )
            .await
            .map_err(MediaError::from)?;
        if let Some(thumbnail) = transcoded.thumbnail {
            let poster_key = paths::with_extension(&output_key, "jpg");
            self.storage
                .upload(&poster_key, thumbnail.to_vec(), "image/jpeg", None)
                .await
                .map_err(MediaError::from)?;
        }
        Ok(serde_json::json!({
            "key": output_key,
            "width": transcoded.width,
            "height": transcoded.height,
            "duration_seconds": transcoded.duration_seconds,
        }))
    }
}

#[async_trait]
impl UnitHandler for ServiceUnitHandler {
    async fn execute(&self, unit: &UnitDescriptor) -> MediaResult<serde_json::Value> {
        match unit.kind {
            UnitKind::VariantDerive => {
                let key = Self::payload_key(unit)?;
                let outcome = self.variants.generate(key, &self.sizes, &self.policy).await?;
                Ok(serde_json::json!({
                    "generated": outcome.generated,
                    "failed": outcome.failed,
                    "skipped": outcome.skipped,
                }))
            }
            UnitKind::VideoCompress => {
                let key = Self::payload_key(unit)?;
                self.transcode_stored(key).await
            }
            UnitKind::ImageCompress => {
                let id = Self::payload_id(unit)?;
                let asset = self.repo.get_by_id(id).await?.ok_or_else(|| {
                    MediaError::InvalidInput(format!("no metadata record with id {}", id))
                })?;
                let outcome = self.compress.compress_asset(&asset, false).await?;
                Ok(serde_json::json!({ "bytes_delta": outcome.bytes_delta() }))
            }
            UnitKind::MetadataRefresh => {
                let id = Self::payload_id(unit)?;
                let asset = self.repo.get_by_id(id).await?.ok_or_else(|| {
                    MediaError::InvalidInput(format!("no metadata record with id {}", id))
                })?;
                let outcome = self.refresh.refresh_asset(&asset, false).await?;
                Ok(serde_json::json!({
                    "changed": outcome.changed,
                    "drift": outcome.drift,
                    "updates": outcome.updates,
                }))
            }
            UnitKind::Notify => {
                tracing::info!(payload = %unit.payload, "notify");
                Ok(serde_json::Value::Null)
            }
        }
    }
}

/// Dispatcher that runs every unit in the calling task. The CLI wants all
/// queued derivation finished before the process exits, so fire-and-forget
/// submission degenerates to inline execution here. Units still carry their
/// retry budget, honored the same way the pool honors it.
pub struct InlineDispatcher {
    handler: Arc<dyn UnitHandler>,
}

impl InlineDispatcher {
    pub fn new(handler: Arc<dyn UnitHandler>) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl Dispatcher for InlineDispatcher {
    async fn submit(&self, unit: UnitDescriptor) -> MediaResult<()> {
        run_with_retry(self.handler.as_ref(), &unit).await.map(|_| ())
    }

    async fn submit_sync(&self, unit: UnitDescriptor) -> MediaResult<serde_json::Value> {
        run_with_retry(self.handler.as_ref(), &unit).await
    }
}
