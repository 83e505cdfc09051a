//! Reaction to owner field changes.
//!
//! The owner-entity layer emits a `FieldChanged` event whenever a watched
//! field's value moves. The handler acts only on the old/new diff: files
//! dropped from the field lose their stored objects, variants, and metadata
//! records; files added to it gain a record and queued derivation. Files
//! present on both sides are never touched.

use std::sync::Arc;

use mediaforge_core::models::{AssetAttrs, AssetKey, FieldChanged, SizeSpecSet};
use mediaforge_core::{MediaError, MediaResult};
use mediaforge_processing::probe::FileInfoProbe;
use mediaforge_storage::{paths, Storage};
use mediaforge_worker::{Dispatcher, UnitDescriptor, UnitKind};

use crate::store::MetadataStore;

/// What one event application actually did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldChangeOutcome {
    pub removed: Vec<String>,
    pub added: Vec<String>,
    /// Added file names whose objects were not found in storage.
    pub missing: Vec<String>,
}

/// Applies `FieldChanged` events to storage, metadata, and the work queue.
pub struct FieldChangeHandler {
    storage: Arc<dyn Storage>,
    store: Arc<dyn MetadataStore>,
    probe: FileInfoProbe,
    dispatcher: Arc<dyn Dispatcher>,
    sizes: SizeSpecSet,
    max_retries: u32,
    retry_backoff_secs: u64,
}

impl FieldChangeHandler {
    pub fn new(
        storage: Arc<dyn Storage>,
        store: Arc<dyn MetadataStore>,
        dispatcher: Arc<dyn Dispatcher>,
        sizes: SizeSpecSet,
        max_retries: u32,
        retry_backoff_secs: u64,
    ) -> Self {
        Self {
            probe: FileInfoProbe::new(storage.clone()),
            storage,
            store,
            dispatcher,
            sizes,
            max_retries,
            retry_backoff_secs,
        }
    }

    #[tracing::instrument(skip(self, event), fields(owner = %event.owner_type, owner_id = event.owner_id, field = %event.field))]
    pub async fn handle(&self, event: &FieldChanged) -> MediaResult<FieldChangeOutcome> {
        let mut outcome = FieldChangeOutcome::default();

        let removed = event.removed_files();
        for file_name in &removed {
            self.remove_file(file_name).await?;
        }
        if !removed.is_empty() {
            self.store
                .delete_for_owner_field(
                    &event.owner_type,
                    event.owner_id,
                    &event.field,
                    Some(&removed),
                )
                .await?;
            tracing::info!(count = removed.len(), "Removed dereferenced files");
        }
        outcome.removed = removed;

        for file_name in event.added_files() {
            if !self
                .storage
                .exists(&file_name)
                .await
                .map_err(MediaError::from)?
            {
                tracing::warn!(key = %file_name, "Added file not found in storage, skipping");
                outcome.missing.push(file_name);
                continue;
            }
            self.add_file(event, &file_name).await?;
            outcome.added.push(file_name);
        }
        Ok(outcome)
    }

    /// Delete one dereferenced file: every named variant, then the original.
    async fn remove_file(&self, file_name: &str) -> MediaResult<()> {
        for spec in self.sizes.iter() {
            self.storage
                .delete(&paths::variant_key(file_name, &spec.name))
                .await
                .map_err(MediaError::from)?;
        }
        self.storage
            .delete(file_name)
            .await
            .map_err(MediaError::from)?;
        Ok(())
    }

    /// Record one newly referenced file and queue its derivation.
    async fn add_file(&self, event: &FieldChanged, file_name: &str) -> MediaResult<()> {
        let info = self.probe.probe(file_name).await?;
        let key = AssetKey::new(
            event.owner_type.clone(),
            event.owner_id,
            event.field.clone(),
            file_name,
        );
        let attrs = AssetAttrs {
            file_size: info.size as i64,
            mime_type: info.mime_type,
            width: info.width.map(|w| w as i32),
            height: info.height.map(|h| h as i32),
            metadata: None,
            seo_title: None,
        };
        self.store.upsert(&key, &attrs).await?;

        let kind = if paths::is_image(file_name) && !paths::is_animated(file_name) {
            if self.sizes.is_empty() {
                return Ok(());
            }
            UnitKind::VariantDerive
        } else if paths::is_video(file_name) {
            UnitKind::VideoCompress
        } else {
            return Ok(());
        };
        let unit = UnitDescriptor::new(kind, serde_json::json!({ "key": file_name }))
            .with_retries(self.max_retries, self.retry_backoff_secs);
        self.dispatcher.submit(unit).await
    }
}
