//! Rollout and rollback of a single named size across stored images.
//!
//! Config comes first: a size must already be declared in the active set
//! before its variants are generated, and must be gone from the set before
//! its variants are deleted. The check keeps the stored tree and the serving
//! paths (which are derived from config) from disagreeing.

use std::sync::Arc;

use mediaforge_core::models::{CompressionPolicy, SizeSpecSet};
use mediaforge_core::{MediaError, MediaResult};
use mediaforge_db::AssetFilter;

use crate::store::MetadataStore;
use crate::summary::BulkSummary;
use crate::variants::SizeVariantGenerator;

/// What to do with one named size across the stored image set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeAction {
    Add,
    Remove,
}

/// Applies a size addition or removal to every stored image.
pub struct NamedSizeManager {
    store: Arc<dyn MetadataStore>,
    generator: SizeVariantGenerator,
    sizes: SizeSpecSet,
    policy: CompressionPolicy,
}

impl NamedSizeManager {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        generator: SizeVariantGenerator,
        sizes: SizeSpecSet,
        policy: CompressionPolicy,
    ) -> Self {
        Self {
            store,
            generator,
            sizes,
            policy,
        }
    }

    /// Rejects actions that disagree with the active size set. `force`
    /// overrides the check for recovery runs (e.g. re-deriving a size whose
    /// target changed, or sweeping leftovers of a size renamed in config).
    fn check_config(&self, action: SizeAction, size_name: &str, force: bool) -> MediaResult<()> {
        if force {
            return Ok(());
        }
        match action {
            SizeAction::Add if !self.sizes.contains(size_name) => {
                Err(MediaError::ConfigInconsistency(format!(
                    "size '{}' is not declared in the active size set ({}); declare it in config before generating",
                    size_name,
                    self.sizes.names().join(", ")
                )))
            }
            SizeAction::Remove if self.sizes.contains(size_name) => {
                Err(MediaError::ConfigInconsistency(format!(
                    "size '{}' is still declared in the active size set; remove it from config before deleting variants",
                    size_name
                )))
            }
            _ => Ok(()),
        }
    }

    /// Apply the action for `size_name` across all image records, in id
    /// order. Dry runs only count what would change.
    #[tracing::instrument(skip(self), fields(size = %size_name, action = ?action))]
    pub async fn apply(
        &self,
        action: SizeAction,
        size_name: &str,
        chunk_size: i64,
        dry_run: bool,
        force: bool,
    ) -> MediaResult<BulkSummary> {
        self.check_config(action, size_name, force)?;

        // Add needs the size spec even under force; force only skips the
        // declared-state check for Remove.
        let spec = match action {
            SizeAction::Add => Some(self.sizes.get(size_name).ok_or_else(|| {
                MediaError::ConfigInconsistency(format!(
                    "size '{}' has no spec to generate from",
                    size_name
                ))
            })?),
            SizeAction::Remove => None,
        };

        let filter = AssetFilter {
            mime_prefix: Some("image/".to_string()),
            ..AssetFilter::default()
        };
        let mut summary = BulkSummary::default();
        let mut after_id = 0i64;
        loop {
            let chunk = self.store.fetch_chunk(&filter, after_id, chunk_size).await?;
            if chunk.is_empty() {
                break;
            }
            for asset in &chunk {
                after_id = asset.id;
                if dry_run {
                    summary.record_skip();
                    continue;
                }
                let result = match (action, spec) {
                    (SizeAction::Add, Some(spec)) => self
                        .generator
                        .generate_one(&asset.file_name, spec, &self.policy)
                        .await
                        .map(|_| ()),
                    _ => self
                        .generator
                        .remove_one(&asset.file_name, size_name)
                        .await
                        .map(|_| ()),
                };
                match result {
                    Ok(()) => summary.record_success(0),
                    Err(MediaError::InvalidInput(_)) => summary.record_skip(),
                    Err(e) => summary.record_failure(&asset.file_name, e.to_string()),
                }
            }
        }
        tracing::info!(
            size = %size_name,
            action = ?action,
            processed = summary.processed,
            failed = summary.failed,
            "Named size rollout finished"
        );
        Ok(summary)
    }
}
