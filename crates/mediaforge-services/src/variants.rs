//! Named-size variant fan-out.
//!
//! Variants live at `{owner_dir}/{size}/{filename}`, so serving a size is a
//! pure path join. Every size derivation decodes the pristine original again;
//! a mutated in-memory image is never reused across sizes.

use std::sync::Arc;

use mediaforge_core::models::{CompressionPolicy, SizeSpec, SizeSpecSet};
use mediaforge_core::{MediaError, MediaResult};
use mediaforge_processing::{size_for_axis, ImageTransformEngine};
use mediaforge_storage::{paths, Storage};

/// Aggregate outcome of one fan-out. Per-size failures are isolated; one
/// size failing never blocks the others.
#[derive(Debug, Clone, Default)]
pub struct VariantOutcome {
    pub generated: Vec<String>,
    pub failed: Vec<(String, String)>,
    /// True when the original is animated or the size set is empty.
    pub skipped: bool,
}

impl VariantOutcome {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Derives the configured named sizes for stored originals.
#[derive(Clone)]
pub struct SizeVariantGenerator {
    storage: Arc<dyn Storage>,
    engine: ImageTransformEngine,
    cache_control: Option<String>,
}

impl SizeVariantGenerator {
    pub fn new(storage: Arc<dyn Storage>, cache_control: Option<String>) -> Self {
        Self {
            storage,
            engine: ImageTransformEngine::new(),
            cache_control,
        }
    }

    /// Fan out all configured sizes for one original. An empty size set is a
    /// deliberate no-op; animated originals are skipped entirely (no derived
    /// sizes exist for them).
    #[tracing::instrument(skip(self, sizes, policy), fields(key = %original_key))]
    pub async fn generate(
        &self,
        original_key: &str,
        sizes: &SizeSpecSet,
        policy: &CompressionPolicy,
    ) -> MediaResult<VariantOutcome> {
        if sizes.is_empty() || paths::is_animated(original_key) {
            return Ok(VariantOutcome::skipped());
        }

        let source = self
            .storage
            .download(original_key)
            .await
            .map_err(MediaError::from)?;

        let mut outcome = VariantOutcome::default();
        for spec in sizes.iter() {
            match self.derive_one(original_key, &source, spec, policy).await {
                Ok(variant_key) => outcome.generated.push(variant_key),
                Err(e) => {
                    tracing::warn!(
                        key = %original_key,
                        size = %spec.name,
                        error = %e,
                        "Size variant derivation failed"
                    );
                    outcome.failed.push((spec.name.clone(), e.to_string()));
                }
            }
        }
        Ok(outcome)
    }

    /// Derive a single named size for one original. Used for partial
    /// re-derivation after a size's target changed.
    #[tracing::instrument(skip(self, spec, policy), fields(key = %original_key, size = %spec.name))]
    pub async fn generate_one(
        &self,
        original_key: &str,
        spec: &SizeSpec,
        policy: &CompressionPolicy,
    ) -> MediaResult<String> {
        if paths::is_animated(original_key) {
            return Err(MediaError::InvalidInput(format!(
                "No sized variants for animated file {}",
                original_key
            )));
        }
        let source = self
            .storage
            .download(original_key)
            .await
            .map_err(MediaError::from)?;
        self.derive_one(original_key, &source, spec, policy).await
    }

    /// Delete the variant of one named size for one original. Returns true
    /// when an object was actually removed.
    pub async fn remove_one(&self, original_key: &str, size_name: &str) -> MediaResult<bool> {
        let variant_key = paths::variant_key(original_key, size_name);
        self.storage
            .delete(&variant_key)
            .await
            .map_err(MediaError::from)
    }

    async fn derive_one(
        &self,
        original_key: &str,
        source: &[u8],
        spec: &SizeSpec,
        policy: &CompressionPolicy,
    ) -> MediaResult<String> {
        let (orig_w, orig_h) = mediaforge_processing::probe::image_dimensions(source)?;
        // One axis from the size spec, the other derived from the original
        // aspect ratio. The max-ceiling clamp does not apply to fan-out.
        let (w, h) = size_for_axis(orig_w, orig_h, spec);

        let source_ext = paths::extension(original_key);
        let transformed = self.engine.resize_to(
            source,
            w,
            h,
            policy.format,
            policy.quality,
            source_ext.as_deref(),
        )?;

        let variant_key = paths::variant_key(original_key, &spec.name);
        self.storage
            .upload(
                &variant_key,
                transformed.bytes.to_vec(),
                transformed.content_type(),
                self.cache_control.as_deref(),
            )
            .await
            .map_err(MediaError::from)?;
        Ok(variant_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use mediaforge_core::models::{OutputFormat, ResizeMode};
    use mediaforge_storage::LocalStorage;
    use tempfile::tempdir;

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(w, h, Rgb([120, 90, 60]));
        let mut out = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        out
    }

    fn policy() -> CompressionPolicy {
        CompressionPolicy {
            quality: 80,
            format: OutputFormat::Png,
            mode: ResizeMode::Contain,
            max_width: Some(3840),
            max_height: Some(2160),
            min_bytes: 0,
        }
    }

    async fn generator(dir: &std::path::Path) -> (Arc<LocalStorage>, SizeVariantGenerator) {
        let storage = Arc::new(LocalStorage::new(dir).await.unwrap());
        let generator = SizeVariantGenerator::new(storage.clone(), None);
        (storage, generator)
    }

    #[tokio::test]
    async fn fan_out_writes_each_size_under_its_directory() {
        let dir = tempdir().unwrap();
        let (storage, generator) = generator(dir.path()).await;
        storage
            .upload("products/42/photo.png", png_bytes(1920, 1080), "image/png", None)
            .await
            .unwrap();

        let sizes = SizeSpecSet::parse("icon=64,thumb=240").unwrap();
        let outcome = generator
            .generate("products/42/photo.png", &sizes, &policy())
            .await
            .unwrap();

        assert!(outcome.all_succeeded());
        assert!(!outcome.skipped);
        assert_eq!(
            outcome.generated,
            vec![
                "products/42/icon/photo.png".to_string(),
                "products/42/thumb/photo.png".to_string()
            ]
        );
        let icon = storage.download("products/42/icon/photo.png").await.unwrap();
        let (w, h) = mediaforge_processing::probe::image_dimensions(&icon).unwrap();
        assert_eq!((w, h), (114, 64));
    }

    #[tokio::test]
    async fn empty_size_set_is_a_silent_no_op() {
        let dir = tempdir().unwrap();
        let (_storage, generator) = generator(dir.path()).await;
        let sizes = SizeSpecSet::parse("").unwrap();
        let outcome = generator
            .generate("products/42/photo.png", &sizes, &policy())
            .await
            .unwrap();
        assert!(outcome.skipped);
    }

    #[tokio::test]
    async fn animated_originals_are_skipped() {
        let dir = tempdir().unwrap();
        let (_storage, generator) = generator(dir.path()).await;
        let sizes = SizeSpecSet::parse("icon=64").unwrap();
        let outcome = generator
            .generate("products/42/anim.gif", &sizes, &policy())
            .await
            .unwrap();
        assert!(outcome.skipped);
        assert!(outcome.generated.is_empty());
    }

    #[tokio::test]
    async fn rerun_overwrites_at_the_same_path() {
        let dir = tempdir().unwrap();
        let (storage, generator) = generator(dir.path()).await;
        storage
            .upload("p/1/a.png", png_bytes(800, 600), "image/png", None)
            .await
            .unwrap();
        let sizes = SizeSpecSet::parse("thumb=240").unwrap();

        let first = generator.generate("p/1/a.png", &sizes, &policy()).await.unwrap();
        let second = generator.generate("p/1/a.png", &sizes, &policy()).await.unwrap();
        assert_eq!(first.generated, second.generated);

        let variant = storage.download("p/1/thumb/a.png").await.unwrap();
        let (w, h) = mediaforge_processing::probe::image_dimensions(&variant).unwrap();
        assert_eq!((w, h), (320, 240));
    }

    #[tokio::test]
    async fn missing_original_surfaces_not_found() {
        let dir = tempdir().unwrap();
        let (_storage, generator) = generator(dir.path()).await;
        let sizes = SizeSpecSet::parse("icon=64").unwrap();
        let err = generator
            .generate("p/1/missing.png", &sizes, &policy())
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::StorageNotFound(_)));
    }

    #[tokio::test]
    async fn corrupt_source_isolates_per_size_failures() {
        let dir = tempdir().unwrap();
        let (storage, generator) = generator(dir.path()).await;
        storage
            .upload("p/1/bad.png", b"not an image".to_vec(), "image/png", None)
            .await
            .unwrap();
        let sizes = SizeSpecSet::parse("icon=64,thumb=240").unwrap();
        let outcome = generator.generate("p/1/bad.png", &sizes, &policy()).await.unwrap();
        assert_eq!(outcome.failed.len(), 2);
        assert!(outcome.generated.is_empty());
    }

    #[tokio::test]
    async fn remove_one_deletes_the_variant_object() {
        let dir = tempdir().unwrap();
        let (storage, generator) = generator(dir.path()).await;
        storage
            .upload("p/1/a.png", png_bytes(400, 300), "image/png", None)
            .await
            .unwrap();
        let sizes = SizeSpecSet::parse("icon=64").unwrap();
        generator.generate("p/1/a.png", &sizes, &policy()).await.unwrap();

        assert!(generator.remove_one("p/1/a.png", "icon").await.unwrap());
        assert!(!generator.remove_one("p/1/a.png", "icon").await.unwrap());
    }
}
