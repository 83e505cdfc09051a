//! Upload orchestration: canonicalize, compress, store, record, and dispatch
//! derivation work.

use std::sync::Arc;

use bytes::Bytes;
use uuid::Uuid;

use mediaforge_core::config::{StorageConfig, WorkerConfig};
use mediaforge_core::models::{
    AssetAttrs, AssetKey, CompressionPolicy, OutputFormat, ResizeMode, SizeSpecSet,
};
use mediaforge_core::{MediaError, MediaResult};
use mediaforge_processing::ImageTransformEngine;
use mediaforge_storage::{paths, Storage};
use mediaforge_worker::{Dispatcher, UnitDescriptor, UnitKind};

use crate::store::MetadataStore;

/// Identity and placement of an incoming file.
#[derive(Debug, Clone, Copy)]
pub struct UploadRequest<'a> {
    pub owner_type: &'a str,
    pub owner_id: i64,
    pub owner_field: &'a str,
    /// Directory prefix the file is stored under, e.g. "products/42".
    pub owner_dir: &'a str,
    /// Client-supplied file name; canonicalized before storing.
    pub file_name: &'a str,
    /// Folded into the canonical file name before the extension, e.g. a tag
    /// of "hero" turns photo.png into photo-hero.png.
    pub tag: Option<&'a str>,
    /// Overrides the policy's resize mode for this upload's compress pass.
    pub fit_mode: Option<ResizeMode>,
    /// When false the file is stored verbatim.
    pub do_resize: bool,
}

/// What the caller gets back from an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedMedia {
    pub stored_path: String,
    pub serving_url: String,
    pub mime_type: Option<String>,
}

/// Front door of the pipeline: stores an incoming file under its canonical
/// name, applies the primary compress pass to images, creates the initial
/// metadata record, and fans out derived work to the dispatcher.
#[derive(Clone)]
pub struct UploadOrchestrator {
    storage: Arc<dyn Storage>,
    store: Arc<dyn MetadataStore>,
    engine: ImageTransformEngine,
    dispatcher: Arc<dyn Dispatcher>,
    policy: CompressionPolicy,
    sizes: SizeSpecSet,
    base_url: String,
    cache_control: String,
    max_retries: u32,
    retry_backoff_secs: u64,
}

impl UploadOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        storage: Arc<dyn Storage>,
        store: Arc<dyn MetadataStore>,
        dispatcher: Arc<dyn Dispatcher>,
        policy: CompressionPolicy,
        sizes: SizeSpecSet,
        storage_config: &StorageConfig,
        worker_config: &WorkerConfig,
    ) -> Self {
        Self {
            storage,
            store,
            engine: ImageTransformEngine::new(),
            dispatcher,
            policy,
            sizes,
            base_url: storage_config.base_url.clone(),
            cache_control: storage_config.cache_control.clone(),
            max_retries: worker_config.max_retries,
            retry_backoff_secs: worker_config.retry_backoff_secs,
        }
    }

    /// Store a file, record it, and kick off derivation. Images get the
    /// primary compress pass inline (unless `do_resize` is off or the file is
    /// below the policy's byte threshold); videos are stored as-is and
    /// transcoded by a dispatched unit.
    #[tracing::instrument(skip(self, request, data), fields(owner_dir = %request.owner_dir, file = %request.file_name))]
    pub async fn upload_and_derive(
        &self,
        request: &UploadRequest<'_>,
        data: Bytes,
    ) -> MediaResult<UploadedMedia> {
        let named = match request.tag {
            Some(tag) => match request.file_name.rsplit_once('.') {
                Some((stem, ext)) if !stem.is_empty() => format!("{}-{}.{}", stem, tag, ext),
                _ => format!("{}-{}", request.file_name, tag),
            },
            None => request.file_name.to_string(),
        };
        let canonical = paths::canonical_file_name(&named);
        let mut key = format!("{}/{}", request.owner_dir.trim_matches('/'), canonical);

        let mut policy = self.policy;
        if let Some(mode) = request.fit_mode {
            policy.mode = mode;
        }

        let is_plain_image = paths::is_image(&key) && !paths::is_animated(&key);
        let compress_inline =
            is_plain_image && request.do_resize && data.len() as u64 >= policy.min_bytes;

        let mut attrs = AssetAttrs::default();
        let (stored_bytes, content_type) = if compress_inline {
            let source_ext = paths::extension(&key);
            let transformed = self
                .engine
                .compress(&data, &policy, source_ext.as_deref())?;
            // Keep the stored extension truthful about the encoded format.
            if policy.format != OutputFormat::Preserve {
                key = paths::with_extension(&key, policy.format.extension());
            }
            tracing::debug!(
                original_bytes = data.len(),
                compressed_bytes = transformed.bytes.len(),
                width = transformed.width,
                height = transformed.height,
                "Primary compress pass applied"
            );
            attrs.width = Some(transformed.width as i32);
            attrs.height = Some(transformed.height as i32);
            let content_type = transformed.content_type().to_string();
            (transformed.bytes.to_vec(), content_type)
        } else {
            if is_plain_image {
                if let Ok((w, h)) = mediaforge_processing::probe::image_dimensions(&data) {
                    attrs.width = Some(w as i32);
                    attrs.height = Some(h as i32);
                }
            }
            let content_type = paths::mime_type(&key)
                .unwrap_or("application/octet-stream")
                .to_string();
            (data.to_vec(), content_type)
        };
        attrs.file_size = stored_bytes.len() as i64;
        attrs.mime_type = Some(content_type.clone());

        self.storage
            .upload(&key, stored_bytes, &content_type, Some(&self.cache_control))
            .await
            .map_err(MediaError::from)?;

        let asset_key = AssetKey::new(
            request.owner_type,
            request.owner_id,
            request.owner_field,
            key.clone(),
        );
        self.store.upsert(&asset_key, &attrs).await?;

        if is_plain_image && !self.sizes.is_empty() {
            self.derive_variants(&key, None).await?;
        } else if paths::is_video(&key) {
            self.dispatch(UnitKind::VideoCompress, &key, None).await?;
        }

        Ok(UploadedMedia {
            stored_path: key.clone(),
            serving_url: paths::resolve_url(&self.base_url, &key, None),
            mime_type: paths::mime_type(&key).map(String::from),
        })
    }

    /// Fire-and-forget fan-out of named-size derivation for a stored
    /// original.
    pub async fn derive_variants(
        &self,
        stored_path: &str,
        batch_id: Option<Uuid>,
    ) -> MediaResult<()> {
        self.dispatch(UnitKind::VariantDerive, stored_path, batch_id)
            .await
    }

    async fn dispatch(
        &self,
        kind: UnitKind,
        key: &str,
        batch_id: Option<Uuid>,
    ) -> MediaResult<()> {
        let mut unit = UnitDescriptor::new(kind, serde_json::json!({ "key": key }))
            .with_retries(self.max_retries, self.retry_backoff_secs);
        if let Some(batch_id) = batch_id {
            unit = unit.with_batch(batch_id);
        }
        self.dispatcher.submit(unit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{InMemoryStore, RecordingDispatcher};
    use image::{ImageFormat, Rgb, RgbImage};
    use mediaforge_core::models::ResizeMode;
    use mediaforge_storage::LocalStorage;
    use tempfile::tempdir;

    fn png_bytes(w: u32, h: u32) -> Bytes {
        let img = RgbImage::from_pixel(w, h, Rgb([1, 2, 3]));
        let mut out = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        Bytes::from(out)
    }

    fn policy(format: OutputFormat, min_bytes: u64) -> CompressionPolicy {
        CompressionPolicy {
            quality: 80,
            format,
            mode: ResizeMode::Contain,
            max_width: Some(1000),
            max_height: Some(1000),
            min_bytes,
        }
    }

    fn request<'a>(owner_dir: &'a str, file_name: &'a str, do_resize: bool) -> UploadRequest<'a> {
        UploadRequest {
            owner_type: "shop.ProductModel",
            owner_id: 42,
            owner_field: "images",
            owner_dir,
            file_name,
            tag: None,
            fit_mode: None,
            do_resize,
        }
    }

    struct Fixture {
        storage: Arc<LocalStorage>,
        store: Arc<InMemoryStore>,
        dispatcher: Arc<RecordingDispatcher>,
        orchestrator: UploadOrchestrator,
    }

    async fn fixture(dir: &std::path::Path, policy: CompressionPolicy, sizes: &str) -> Fixture {
        let storage = Arc::new(LocalStorage::new(dir).await.unwrap());
        let store = Arc::new(InMemoryStore::new());
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let storage_config: StorageConfig = serde_json::from_str("{}").unwrap();
        let worker_config: WorkerConfig = serde_json::from_str("{}").unwrap();
        let orchestrator = UploadOrchestrator::new(
            storage.clone(),
            store.clone(),
            dispatcher.clone(),
            policy,
            SizeSpecSet::parse(sizes).unwrap(),
            &storage_config,
            &worker_config,
        );
        Fixture {
            storage,
            store,
            dispatcher,
            orchestrator,
        }
    }

    #[tokio::test]
    async fn upload_canonicalizes_compresses_records_and_dispatches() {
        let dir = tempdir().unwrap();
        let f = fixture(dir.path(), policy(OutputFormat::Png, 0), "icon=64").await;

        let uploaded = f
            .orchestrator
            .upload_and_derive(
                &request("products/42", "My Photo (1).PNG", true),
                png_bytes(2000, 1500),
            )
            .await
            .unwrap();

        assert_eq!(uploaded.stored_path, "products/42/my-photo-1.png");
        assert!(uploaded.serving_url.ends_with("/products/42/my-photo-1.png"));

        // Compress pass clamped to the 1000x1000 ceiling.
        let stored = f.storage.download(&uploaded.stored_path).await.unwrap();
        let (w, h) = mediaforge_processing::probe::image_dimensions(&stored).unwrap();
        assert_eq!((w, h), (1000, 750));

        // Initial metadata record carries the stored facts.
        let record = f
            .store
            .get(&AssetKey::new(
                "shop.ProductModel",
                42,
                "images",
                "products/42/my-photo-1.png",
            ))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.file_size, stored.len() as i64);
        assert_eq!(record.width, Some(1000));
        assert_eq!(record.mime_type.as_deref(), Some("image/png"));

        let units = f.dispatcher.units.lock().unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].kind, UnitKind::VariantDerive);
        assert_eq!(units[0].payload["key"], "products/42/my-photo-1.png");
    }

    #[tokio::test]
    async fn tag_is_folded_into_the_canonical_name() {
        let dir = tempdir().unwrap();
        let f = fixture(dir.path(), policy(OutputFormat::Png, 0), "").await;

        let uploaded = f
            .orchestrator
            .upload_and_derive(
                &UploadRequest {
                    tag: Some("Hero Shot"),
                    ..request("p/1", "My Photo.PNG", true)
                },
                png_bytes(100, 100),
            )
            .await
            .unwrap();
        assert_eq!(uploaded.stored_path, "p/1/my-photo-hero-shot.png");
        assert!(f.storage.exists("p/1/my-photo-hero-shot.png").await.unwrap());
    }

    #[tokio::test]
    async fn fit_mode_overrides_the_policy_mode_for_one_upload() {
        let dir = tempdir().unwrap();
        let f = fixture(dir.path(), policy(OutputFormat::Png, 0), "").await;

        // Policy mode is contain; this upload asks for cover instead, so the
        // 1000x1000 ceiling becomes an exact target box.
        let uploaded = f
            .orchestrator
            .upload_and_derive(
                &UploadRequest {
                    fit_mode: Some(ResizeMode::Cover),
                    ..request("p/1", "banner.png", true)
                },
                png_bytes(2000, 1500),
            )
            .await
            .unwrap();
        let stored = f.storage.download(&uploaded.stored_path).await.unwrap();
        let (w, h) = mediaforge_processing::probe::image_dimensions(&stored).unwrap();
        assert_eq!((w, h), (1000, 1000));
    }

    #[tokio::test]
    async fn format_conversion_renames_the_stored_extension() {
        let dir = tempdir().unwrap();
        let f = fixture(dir.path(), policy(OutputFormat::Jpeg, 0), "").await;

        let uploaded = f
            .orchestrator
            .upload_and_derive(&request("p/1", "photo.png", true), png_bytes(100, 100))
            .await
            .unwrap();
        assert_eq!(uploaded.stored_path, "p/1/photo.jpg");
        assert_eq!(uploaded.mime_type.as_deref(), Some("image/jpeg"));
        assert!(f.storage.exists("p/1/photo.jpg").await.unwrap());
        assert!(!f.storage.exists("p/1/photo.png").await.unwrap());
    }

    #[tokio::test]
    async fn small_files_skip_the_compress_pass_but_are_still_recorded() {
        let dir = tempdir().unwrap();
        let data = png_bytes(100, 100);
        let threshold = data.len() as u64 + 1;
        let f = fixture(dir.path(), policy(OutputFormat::Jpeg, threshold), "").await;

        let uploaded = f
            .orchestrator
            .upload_and_derive(&request("p/1", "tiny.png", true), data.clone())
            .await
            .unwrap();
        // Stored verbatim, original format kept.
        assert_eq!(uploaded.stored_path, "p/1/tiny.png");
        let stored = f.storage.download("p/1/tiny.png").await.unwrap();
        assert_eq!(stored, data.to_vec());

        let record = f
            .store
            .get(&AssetKey::new("shop.ProductModel", 42, "images", "p/1/tiny.png"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.file_size, data.len() as i64);
        assert_eq!(record.width, Some(100));
    }

    #[tokio::test]
    async fn animated_files_are_stored_verbatim_without_fan_out() {
        let dir = tempdir().unwrap();
        let f = fixture(dir.path(), policy(OutputFormat::Jpeg, 0), "icon=64").await;

        let uploaded = f
            .orchestrator
            .upload_and_derive(
                &request("p/1", "Loop.GIF", true),
                Bytes::from_static(b"GIF89a..."),
            )
            .await
            .unwrap();
        assert_eq!(uploaded.stored_path, "p/1/loop.gif");
        assert!(f.storage.exists("p/1/loop.gif").await.unwrap());
        assert!(f.dispatcher.units.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn videos_dispatch_a_transcode_unit() {
        let dir = tempdir().unwrap();
        let f = fixture(dir.path(), policy(OutputFormat::Jpeg, 0), "icon=64").await;

        let uploaded = f
            .orchestrator
            .upload_and_derive(
                &request("p/1", "clip.mp4", true),
                Bytes::from_static(b"fake video"),
            )
            .await
            .unwrap();
        assert_eq!(uploaded.stored_path, "p/1/clip.mp4");
        let units = f.dispatcher.units.lock().unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].kind, UnitKind::VideoCompress);
    }
}
