//! Metadata refresh: reconcile stored records against live owners and
//! storage.
//!
//! A record can drift three ways: its owner row is gone, the owner field no
//! longer references the file, or the file itself left storage. Drift is
//! reported, never auto-deleted; stale physical facts (size, MIME,
//! dimensions) are repaired in place.

use std::sync::Arc;

use mediaforge_core::models::{AssetAttrs, MediaAsset, OwnerRegistry};
use mediaforge_core::validation::sanitize_seo_title;
use mediaforge_core::{MediaError, MediaResult};
use mediaforge_db::AssetFilter;
use mediaforge_processing::probe::FileInfoProbe;
use mediaforge_storage::Storage;

use crate::store::MetadataStore;
use crate::summary::BulkSummary;

/// What one reconciliation pass found for a single record.
#[derive(Debug, Clone, Default)]
pub struct RefreshOutcome {
    /// True when at least one stored fact was (or would be) rewritten.
    pub changed: bool,
    /// Referential problems that need a human decision.
    pub drift: Vec<String>,
    /// Human-readable "field: old -> new" descriptions of repairs.
    pub updates: Vec<String>,
    /// Net change in the recorded file size.
    pub bytes_delta: i64,
}

impl RefreshOutcome {
    pub fn has_drift(&self) -> bool {
        !self.drift.is_empty()
    }
}

/// Reconciles metadata records with the owners and files they describe.
pub struct RefreshReconciler {
    storage: Arc<dyn Storage>,
    store: Arc<dyn MetadataStore>,
    probe: FileInfoProbe,
    registry: OwnerRegistry,
}

impl RefreshReconciler {
    pub fn new(
        storage: Arc<dyn Storage>,
        store: Arc<dyn MetadataStore>,
        registry: OwnerRegistry,
    ) -> Self {
        Self {
            probe: FileInfoProbe::new(storage.clone()),
            storage,
            store,
            registry,
        }
    }

    /// Reconcile one record. Runs to a fixpoint: a second pass over an
    /// already-repaired record reports no changes.
    #[tracing::instrument(skip(self, asset), fields(key = %asset.key()))]
    pub async fn refresh_asset(
        &self,
        asset: &MediaAsset,
        dry_run: bool,
    ) -> MediaResult<RefreshOutcome> {
        let mut outcome = RefreshOutcome::default();

        let owner = match self.registry.resolve(&asset.owner_type, asset.owner_id).await {
            Ok(Some(owner)) => Some(owner),
            Ok(None) => {
                outcome
                    .drift
                    .push(format!("owner {}#{} no longer exists", asset.owner_type, asset.owner_id));
                None
            }
            Err(MediaError::ReferentialDrift(msg)) => {
                outcome.drift.push(msg);
                None
            }
            Err(e) => return Err(e),
        };

        if let Some(ref owner) = owner {
            match owner.field_value(&asset.owner_field) {
                Some(value) if value.references(&asset.file_name) => {}
                Some(_) => outcome.drift.push(format!(
                    "field '{}' no longer references {}",
                    asset.owner_field, asset.file_name
                )),
                None => outcome.drift.push(format!(
                    "owner has no field '{}'",
                    asset.owner_field
                )),
            }
        }

        if !self
            .storage
            .exists(&asset.file_name)
            .await
            .map_err(MediaError::from)?
        {
            outcome
                .drift
                .push(format!("{} missing from storage", asset.file_name));
            return Ok(outcome);
        }

        let info = self.probe.probe(&asset.file_name).await?;
        let mut attrs = AssetAttrs {
            file_size: asset.file_size,
            mime_type: asset.mime_type.clone(),
            width: asset.width,
            height: asset.height,
            metadata: Some(asset.metadata.clone()),
            seo_title: asset.seo_title.clone(),
        };

        if asset.file_size != info.size as i64 {
            outcome
                .updates
                .push(format!("file_size: {} -> {}", asset.file_size, info.size));
            outcome.bytes_delta = info.size as i64 - asset.file_size;
            attrs.file_size = info.size as i64;
        }
        if asset.mime_type != info.mime_type {
            outcome.updates.push(format!(
                "mime_type: {} -> {}",
                asset.mime_type.as_deref().unwrap_or("none"),
                info.mime_type.as_deref().unwrap_or("none")
            ));
            attrs.mime_type = info.mime_type.clone();
        }
        let live_width = info.width.map(|w| w as i32);
        let live_height = info.height.map(|h| h as i32);
        if info.width.is_some() && (asset.width != live_width || asset.height != live_height) {
            outcome.updates.push(format!(
                "dimensions: {}x{} -> {}x{}",
                asset.width.unwrap_or(0),
                asset.height.unwrap_or(0),
                live_width.unwrap_or(0),
                live_height.unwrap_or(0)
            ));
            attrs.width = live_width;
            attrs.height = live_height;
        }
        if let Some(ref owner) = owner {
            let live_title = owner
                .seo_source(&asset.owner_field)
                .as_deref()
                .and_then(sanitize_seo_title);
            if live_title != asset.seo_title {
                outcome.updates.push(format!(
                    "seo_title: {} -> {}",
                    asset.seo_title.as_deref().unwrap_or("none"),
                    live_title.as_deref().unwrap_or("none")
                ));
                attrs.seo_title = live_title;
            }
        }

        if outcome.updates.is_empty() {
            return Ok(outcome);
        }
        outcome.changed = true;
        if !dry_run {
            self.store.upsert(&asset.key(), &attrs).await?;
            tracing::info!(
                key = %asset.key(),
                updates = outcome.updates.len(),
                "Repaired stale metadata record"
            );
        }
        Ok(outcome)
    }

    /// Reconcile every record matching the filter. Drift is surfaced in the
    /// summary's failure sample; repaired and untouched records count as
    /// successes and skips.
    pub async fn refresh_all(
        &self,
        filter: &AssetFilter,
        chunk_size: i64,
        dry_run: bool,
    ) -> MediaResult<BulkSummary> {
        let mut summary = BulkSummary::default();
        let mut after_id = 0i64;
        loop {
            let chunk = self.store.fetch_chunk(filter, after_id, chunk_size).await?;
            if chunk.is_empty() {
                break;
            }
            for asset in &chunk {
                after_id = asset.id;
                match self.refresh_asset(asset, dry_run).await {
                    Ok(outcome) if outcome.has_drift() => {
                        // Physical repairs still happen on drifted records;
                        // their byte delta belongs in the aggregate.
                        summary.bytes_delta += outcome.bytes_delta;
                        summary.record_failure(asset.key().to_string(), outcome.drift.join("; "));
                    }
                    Ok(outcome) if outcome.changed => {
                        summary.record_success(outcome.bytes_delta);
                    }
                    Ok(_) => summary.record_skip(),
                    Err(e) => {
                        summary.record_failure(asset.key().to_string(), e.to_string());
                    }
                }
            }
        }
        Ok(summary)
    }
}
