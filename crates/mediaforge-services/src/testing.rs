//! In-memory test doubles shared across the service test modules.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use mediaforge_core::models::{AssetAttrs, AssetKey, DuplicateGroup, MediaAsset};
use mediaforge_core::MediaResult;
use mediaforge_db::AssetFilter;
use mediaforge_worker::{Dispatcher, UnitDescriptor};

use crate::store::MetadataStore;

/// Dispatcher that records submitted units instead of running them.
#[derive(Default)]
pub struct RecordingDispatcher {
    pub units: Mutex<Vec<UnitDescriptor>>,
}

#[async_trait]
impl Dispatcher for RecordingDispatcher {
    async fn submit(&self, unit: UnitDescriptor) -> MediaResult<()> {
        self.units.lock().unwrap().push(unit);
        Ok(())
    }

    async fn submit_sync(&self, _unit: UnitDescriptor) -> MediaResult<serde_json::Value> {
        Ok(serde_json::Value::Null)
    }
}

/// In-memory metadata store. Allows duplicate natural keys (insert_raw) so
/// dedup paths can be exercised.
#[derive(Default)]
pub struct InMemoryStore {
    rows: Mutex<Vec<MediaAsset>>,
    next_id: AtomicI64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }

    fn make_asset(&self, key: &AssetKey, attrs: &AssetAttrs) -> MediaAsset {
        let now = Utc::now();
        MediaAsset {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            owner_type: key.owner_type.clone(),
            owner_id: key.owner_id,
            owner_field: key.owner_field.clone(),
            file_name: key.file_name.clone(),
            file_size: attrs.file_size,
            mime_type: attrs.mime_type.clone(),
            width: attrs.width,
            height: attrs.height,
            metadata: attrs
                .metadata
                .clone()
                .unwrap_or_else(|| serde_json::json!({})),
            seo_title: attrs.seo_title.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Insert without upsert semantics, for seeding duplicate rows.
    pub fn insert_raw(&self, key: &AssetKey, attrs: &AssetAttrs) -> MediaAsset {
        let asset = self.make_asset(key, attrs);
        self.rows.lock().unwrap().push(asset.clone());
        asset
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn all(&self) -> Vec<MediaAsset> {
        self.rows.lock().unwrap().clone()
    }
}

fn matches_filter(asset: &MediaAsset, filter: &AssetFilter) -> bool {
    if let Some(ref t) = filter.owner_type {
        if &asset.owner_type != t {
            return false;
        }
    }
    if let Some(id) = filter.owner_id {
        if asset.owner_id != id {
            return false;
        }
    }
    if let Some(ref f) = filter.owner_field {
        if &asset.owner_field != f {
            return false;
        }
    }
    if let Some(min) = filter.min_file_size {
        if asset.file_size <= min {
            return false;
        }
    }
    if let Some(ref prefix) = filter.mime_prefix {
        if !asset
            .mime_type
            .as_deref()
            .map(|m| m.starts_with(prefix.as_str()))
            .unwrap_or(false)
        {
            return false;
        }
    }
    true
}

fn natural_key(asset: &MediaAsset) -> AssetKey {
    asset.key()
}

#[async_trait]
impl MetadataStore for InMemoryStore {
    async fn upsert(&self, key: &AssetKey, attrs: &AssetAttrs) -> MediaResult<MediaAsset> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(existing) = rows.iter_mut().find(|a| &natural_key(a) == key) {
            existing.file_size = attrs.file_size;
            existing.mime_type = attrs.mime_type.clone();
            existing.width = attrs.width;
            existing.height = attrs.height;
            if let Some(ref m) = attrs.metadata {
                existing.metadata = m.clone();
            }
            existing.seo_title = attrs.seo_title.clone();
            existing.updated_at = Utc::now();
            return Ok(existing.clone());
        }
        drop(rows);
        let asset = self.make_asset(key, attrs);
        self.rows.lock().unwrap().push(asset.clone());
        Ok(asset)
    }

    async fn get(&self, key: &AssetKey) -> MediaResult<Option<MediaAsset>> {
        let rows = self.rows.lock().unwrap();
        let mut matches: Vec<&MediaAsset> =
            rows.iter().filter(|a| &natural_key(a) == key).collect();
        matches.sort_by_key(|a| a.id);
        Ok(matches.first().map(|a| (*a).clone()))
    }

    async fn delete(&self, key: &AssetKey) -> MediaResult<u64> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|a| &natural_key(a) != key);
        Ok((before - rows.len()) as u64)
    }

    async fn delete_for_owner_field(
        &self,
        owner_type: &str,
        owner_id: i64,
        owner_field: &str,
        file_names: Option<&[String]>,
    ) -> MediaResult<u64> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|a| {
            let owner_match = a.owner_type == owner_type
                && a.owner_id == owner_id
                && a.owner_field == owner_field;
            let name_match = file_names
                .map(|names| names.contains(&a.file_name))
                .unwrap_or(true);
            !(owner_match && name_match)
        });
        Ok((before - rows.len()) as u64)
    }

    async fn list_for_owner(
        &self,
        owner_type: &str,
        owner_id: i64,
    ) -> MediaResult<Vec<MediaAsset>> {
        let rows = self.rows.lock().unwrap();
        let mut out: Vec<MediaAsset> = rows
            .iter()
            .filter(|a| a.owner_type == owner_type && a.owner_id == owner_id)
            .cloned()
            .collect();
        out.sort_by_key(|a| a.id);
        Ok(out)
    }

    async fn find_duplicates(&self) -> MediaResult<Vec<DuplicateGroup>> {
        let rows = self.rows.lock().unwrap();
        let mut groups: HashMap<AssetKey, Vec<i64>> = HashMap::new();
        for a in rows.iter() {
            groups.entry(natural_key(a)).or_default().push(a.id);
        }
        let mut out: Vec<DuplicateGroup> = groups
            .into_iter()
            .filter(|(_, ids)| ids.len() > 1)
            .map(|(key, ids)| DuplicateGroup {
                owner_type: key.owner_type,
                owner_id: key.owner_id,
                owner_field: key.owner_field,
                file_name: key.file_name,
                keep_id: *ids.iter().min().unwrap(),
                duplicate_count: ids.len() as i64,
            })
            .collect();
        out.sort_by(|a, b| a.keep_id.cmp(&b.keep_id));
        Ok(out)
    }

    async fn remove_duplicates(&self) -> MediaResult<u64> {
        let groups = self.find_duplicates().await?;
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        for group in &groups {
            rows.retain(|a| {
                !(a.owner_type == group.owner_type
                    && a.owner_id == group.owner_id
                    && a.owner_field == group.owner_field
                    && a.file_name == group.file_name
                    && a.id != group.keep_id)
            });
        }
        Ok((before - rows.len()) as u64)
    }

    async fn count_duplicate_groups(&self) -> MediaResult<i64> {
        Ok(self.find_duplicates().await?.len() as i64)
    }

    async fn count(&self, filter: &AssetFilter) -> MediaResult<i64> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().filter(|a| matches_filter(a, filter)).count() as i64)
    }

    async fn fetch_chunk(
        &self,
        filter: &AssetFilter,
        after_id: i64,
        limit: i64,
    ) -> MediaResult<Vec<MediaAsset>> {
        let rows = self.rows.lock().unwrap();
        let mut out: Vec<MediaAsset> = rows
            .iter()
            .filter(|a| a.id > after_id && matches_filter(a, filter))
            .cloned()
            .collect();
        out.sort_by_key(|a| a.id);
        out.truncate(limit as usize);
        Ok(out)
    }
}

/// Owner test double with fixed field values.
pub struct FixedOwner {
    pub fields: HashMap<String, mediaforge_core::models::FieldValue>,
    pub seo: Option<String>,
}

impl mediaforge_core::models::MediaOwner for FixedOwner {
    fn field_value(&self, field: &str) -> Option<mediaforge_core::models::FieldValue> {
        self.fields.get(field).cloned()
    }

    fn seo_source(&self, _field: &str) -> Option<String> {
        self.seo.clone()
    }
}

/// Resolver returning clones of a fixed owner for a set of known ids.
pub struct FixedResolver {
    pub known: HashMap<i64, (HashMap<String, mediaforge_core::models::FieldValue>, Option<String>)>,
}

#[async_trait]
impl mediaforge_core::models::OwnerResolver for FixedResolver {
    async fn resolve(
        &self,
        owner_id: i64,
    ) -> MediaResult<Option<Box<dyn mediaforge_core::models::MediaOwner>>> {
        Ok(self.known.get(&owner_id).map(|(fields, seo)| {
            Box::new(FixedOwner {
                fields: fields.clone(),
                seo: seo.clone(),
            }) as Box<dyn mediaforge_core::models::MediaOwner>
        }))
    }
}
