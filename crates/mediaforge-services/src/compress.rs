//! In-place recompression of already-stored originals.

use std::sync::Arc;

use mediaforge_core::models::{
    compression_ratio_percent, AssetAttrs, CompressionPolicy, MediaAsset, OutputFormat, UnitOutcome,
};
use mediaforge_core::{MediaError, MediaResult};
use mediaforge_db::AssetFilter;
use mediaforge_processing::ImageTransformEngine;
use mediaforge_storage::{paths, Storage};

use crate::batch::BatchCoordinator;
use crate::store::MetadataStore;
use crate::summary::BulkSummary;

/// Result of one in-place compress attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompressOutcome {
    Compressed {
        original_bytes: u64,
        compressed_bytes: u64,
        ratio: String,
    },
    Skipped {
        reason: String,
    },
}

impl CompressOutcome {
    pub fn bytes_delta(&self) -> i64 {
        match self {
            CompressOutcome::Compressed {
                original_bytes,
                compressed_bytes,
                ..
            } => *compressed_bytes as i64 - *original_bytes as i64,
            CompressOutcome::Skipped { .. } => 0,
        }
    }
}

/// Re-runs the compress pass over stored originals and keeps their metadata
/// records in step.
pub struct CompressService {
    storage: Arc<dyn Storage>,
    store: Arc<dyn MetadataStore>,
    engine: ImageTransformEngine,
    policy: CompressionPolicy,
}

impl CompressService {
    pub fn new(
        storage: Arc<dyn Storage>,
        store: Arc<dyn MetadataStore>,
        policy: CompressionPolicy,
    ) -> Self {
        Self {
            storage,
            store,
            engine: ImageTransformEngine::new(),
            policy,
        }
    }

    /// Recompress one record's file in place. The stored key is referenced by
    /// owner fields, so this never renames it; when the configured output
    /// format would change the extension, the source format is kept instead.
    #[tracing::instrument(skip(self, asset), fields(key = %asset.file_name))]
    pub async fn compress_asset(
        &self,
        asset: &MediaAsset,
        dry_run: bool,
    ) -> MediaResult<CompressOutcome> {
        if !asset.is_image() || paths::is_animated(&asset.file_name) {
            return Ok(CompressOutcome::Skipped {
                reason: "not a still image".to_string(),
            });
        }

        let data = self
            .storage
            .download(&asset.file_name)
            .await
            .map_err(MediaError::from)?;
        if (data.len() as u64) < self.policy.min_bytes {
            return Ok(CompressOutcome::Skipped {
                reason: format!("below {} byte threshold", self.policy.min_bytes),
            });
        }

        let source_ext = paths::extension(&asset.file_name);
        let mut policy = self.policy;
        let extension_would_change = source_ext.as_deref() != Some(policy.format.extension());
        if policy.format != OutputFormat::Preserve && extension_would_change {
            policy.format = OutputFormat::Preserve;
        }

        let transformed = self
            .engine
            .compress(&data, &policy, source_ext.as_deref())?;
        if transformed.bytes.len() >= data.len() {
            return Ok(CompressOutcome::Skipped {
                reason: "recompression yields no savings".to_string(),
            });
        }

        let ratio = compression_ratio_percent(data.len() as u64, transformed.bytes.len() as u64);
        let outcome = CompressOutcome::Compressed {
            original_bytes: data.len() as u64,
            compressed_bytes: transformed.bytes.len() as u64,
            ratio: ratio.clone(),
        };
        if dry_run {
            return Ok(outcome);
        }

        self.storage
            .upload(
                &asset.file_name,
                transformed.bytes.to_vec(),
                transformed.content_type(),
                None,
            )
            .await
            .map_err(MediaError::from)?;

        let mut metadata = asset.metadata.clone();
        if let Some(map) = metadata.as_object_mut() {
            map.insert(
                "compression".to_string(),
                serde_json::json!({
                    "original_bytes": data.len(),
                    "compressed_bytes": transformed.bytes.len(),
                    "ratio": ratio,
                }),
            );
        }
        let attrs = AssetAttrs {
            file_size: transformed.bytes.len() as i64,
            mime_type: Some(transformed.content_type().to_string()),
            width: Some(transformed.width as i32),
            height: Some(transformed.height as i32),
            metadata: Some(metadata),
            seo_title: asset.seo_title.clone(),
        };
        self.store.upsert(&asset.key(), &attrs).await?;

        tracing::info!(
            key = %asset.file_name,
            original_bytes = data.len(),
            compressed_bytes = transformed.bytes.len(),
            ratio = %ratio,
            "Recompressed stored original"
        );
        Ok(outcome)
    }

    /// Recompress every record matching the filter, in id order, reporting
    /// per-unit progress to the coordinator when one is given.
    pub async fn compress_all(
        &self,
        filter: &AssetFilter,
        chunk_size: i64,
        dry_run: bool,
        coordinator: Option<&BatchCoordinator>,
    ) -> MediaResult<BulkSummary> {
        let total = self.store.count(filter).await?;
        let batch_id = match coordinator {
            Some(c) => Some(c.start(total as u32).await),
            None => None,
        };

        let mut summary = BulkSummary::default();
        let mut after_id = 0i64;
        loop {
            let chunk = self.store.fetch_chunk(filter, after_id, chunk_size).await?;
            if chunk.is_empty() {
                break;
            }
            for asset in &chunk {
                after_id = asset.id;
                let unit_outcome = match self.compress_asset(asset, dry_run).await {
                    Ok(CompressOutcome::Compressed {
                        original_bytes,
                        compressed_bytes,
                        ratio,
                    }) => {
                        summary.record_success(
                            compressed_bytes as i64 - original_bytes as i64,
                        );
                        UnitOutcome::Success {
                            identifier: asset.file_name.clone(),
                            message: format!("saved {}", ratio),
                            bytes_delta: compressed_bytes as i64 - original_bytes as i64,
                        }
                    }
                    Ok(CompressOutcome::Skipped { reason }) => {
                        summary.record_skip();
                        UnitOutcome::Success {
                            identifier: asset.file_name.clone(),
                            message: format!("skipped: {}", reason),
                            bytes_delta: 0,
                        }
                    }
                    Err(e) => {
                        summary.record_failure(&asset.file_name, e.to_string());
                        UnitOutcome::Failure {
                            identifier: asset.file_name.clone(),
                            error: e.to_string(),
                        }
                    }
                };
                if let (Some(coordinator), Some(batch_id)) = (coordinator, batch_id) {
                    coordinator.record(batch_id, &unit_outcome).await?;
                }
            }
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryStore;
    use image::{ImageFormat, Rgb, RgbImage};
    use mediaforge_core::models::{AssetKey, ResizeMode};
    use mediaforge_storage::LocalStorage;
    use tempfile::tempdir;

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(w, h, Rgb([200, 100, 50]));
        let mut out = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        out
    }

    fn policy(min_bytes: u64) -> CompressionPolicy {
        CompressionPolicy {
            quality: 80,
            format: OutputFormat::WebP,
            mode: ResizeMode::Contain,
            max_width: Some(200),
            max_height: Some(200),
            min_bytes,
        }
    }

    struct Fixture {
        storage: Arc<LocalStorage>,
        store: Arc<InMemoryStore>,
        service: CompressService,
    }

    async fn fixture(dir: &std::path::Path, min_bytes: u64) -> Fixture {
        let storage = Arc::new(LocalStorage::new(dir).await.unwrap());
        let store = Arc::new(InMemoryStore::new());
        let service = CompressService::new(storage.clone(), store.clone(), policy(min_bytes));
        Fixture {
            storage,
            store,
            service,
        }
    }

    async fn seed_image(f: &Fixture, key: &str, w: u32, h: u32) -> MediaAsset {
        let data = png_bytes(w, h);
        f.storage
            .upload(key, data.clone(), "image/png", None)
            .await
            .unwrap();
        f.store.insert_raw(
            &AssetKey::new("shop.ProductModel", 1, "images", key),
            &AssetAttrs {
                file_size: data.len() as i64,
                mime_type: Some("image/png".to_string()),
                width: Some(w as i32),
                height: Some(h as i32),
                metadata: None,
                seo_title: None,
            },
        )
    }

    #[tokio::test]
    async fn recompress_keeps_the_key_and_updates_the_record() {
        let dir = tempdir().unwrap();
        let f = fixture(dir.path(), 0).await;
        let asset = seed_image(&f, "p/1/big.png", 1600, 1200).await;
        let original_size = asset.file_size;

        let outcome = f.service.compress_asset(&asset, false).await.unwrap();
        let delta = outcome.bytes_delta();
        assert!(delta < 0, "expected savings, got {}", delta);

        // Key unchanged; png stays png even though the policy asks for webp.
        let stored = f.storage.download("p/1/big.png").await.unwrap();
        let (w, h) = mediaforge_processing::probe::image_dimensions(&stored).unwrap();
        assert_eq!((w, h), (200, 150));

        let updated = f.store.get(&asset.key()).await.unwrap().unwrap();
        assert!(updated.file_size < original_size);
        assert_eq!(updated.mime_type.as_deref(), Some("image/png"));
        assert!(updated.metadata["compression"]["ratio"].is_string());
    }

    #[tokio::test]
    async fn below_threshold_is_skipped() {
        let dir = tempdir().unwrap();
        let f = fixture(dir.path(), 1_000_000).await;
        let asset = seed_image(&f, "p/1/small.png", 50, 50).await;

        let outcome = f.service.compress_asset(&asset, false).await.unwrap();
        assert!(matches!(outcome, CompressOutcome::Skipped { .. }));
        assert_eq!(outcome.bytes_delta(), 0);
    }

    #[tokio::test]
    async fn dry_run_reports_without_mutating() {
        let dir = tempdir().unwrap();
        let f = fixture(dir.path(), 0).await;
        let asset = seed_image(&f, "p/1/big.png", 1600, 1200).await;
        let before = f.storage.download("p/1/big.png").await.unwrap();

        let outcome = f.service.compress_asset(&asset, true).await.unwrap();
        assert!(matches!(outcome, CompressOutcome::Compressed { .. }));

        let after = f.storage.download("p/1/big.png").await.unwrap();
        assert_eq!(before, after);
        let record = f.store.get(&asset.key()).await.unwrap().unwrap();
        assert_eq!(record.file_size, asset.file_size);
    }

    #[tokio::test]
    async fn bulk_pass_aggregates_and_isolates_failures() {
        let dir = tempdir().unwrap();
        let f = fixture(dir.path(), 0).await;
        seed_image(&f, "p/1/a.png", 1600, 1200).await;
        seed_image(&f, "p/1/b.png", 1600, 1200).await;
        // Record whose file is missing from storage.
        f.store.insert_raw(
            &AssetKey::new("shop.ProductModel", 1, "images", "p/1/gone.png"),
            &AssetAttrs {
                file_size: 123,
                mime_type: Some("image/png".to_string()),
                ..Default::default()
            },
        );

        let summary = f
            .service
            .compress_all(&AssetFilter::default(), 2, false, None)
            .await
            .unwrap();
        assert_eq!(summary.processed, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert!(summary.bytes_delta < 0);
        assert_eq!(summary.failures[0].0, "p/1/gone.png");
    }

    #[tokio::test]
    async fn non_image_records_are_skipped() {
        let dir = tempdir().unwrap();
        let f = fixture(dir.path(), 0).await;
        f.store.insert_raw(
            &AssetKey::new("shop.ProductModel", 1, "manual", "p/1/spec.pdf"),
            &AssetAttrs {
                file_size: 2048,
                mime_type: Some("application/pdf".to_string()),
                ..Default::default()
            },
        );

        let summary = f
            .service
            .compress_all(&AssetFilter::default(), 10, false, None)
            .await
            .unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 0);
    }
}
