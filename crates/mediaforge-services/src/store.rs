//! Metadata persistence capability consumed by the services.
//!
//! The Postgres-backed `AssetRepository` is the production implementation;
//! tests use an in-memory store.

use async_trait::async_trait;

use mediaforge_core::models::{AssetAttrs, AssetKey, DuplicateGroup, MediaAsset};
use mediaforge_core::MediaResult;
use mediaforge_db::{AssetFilter, AssetRepository};

#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn upsert(&self, key: &AssetKey, attrs: &AssetAttrs) -> MediaResult<MediaAsset>;
    async fn get(&self, key: &AssetKey) -> MediaResult<Option<MediaAsset>>;
    async fn delete(&self, key: &AssetKey) -> MediaResult<u64>;
    async fn delete_for_owner_field(
        &self,
        owner_type: &str,
        owner_id: i64,
        owner_field: &str,
        file_names: Option<&[String]>,
    ) -> MediaResult<u64>;
    async fn list_for_owner(&self, owner_type: &str, owner_id: i64)
        -> MediaResult<Vec<MediaAsset>>;
    async fn find_duplicates(&self) -> MediaResult<Vec<DuplicateGroup>>;
    async fn remove_duplicates(&self) -> MediaResult<u64>;
    async fn count_duplicate_groups(&self) -> MediaResult<i64>;
    async fn count(&self, filter: &AssetFilter) -> MediaResult<i64>;
    async fn fetch_chunk(
        &self,
        filter: &AssetFilter,
        after_id: i64,
        limit: i64,
    ) -> MediaResult<Vec<MediaAsset>>;
}

#[async_trait]
impl MetadataStore for AssetRepository {
    async fn upsert(&self, key: &AssetKey, attrs: &AssetAttrs) -> MediaResult<MediaAsset> {
        AssetRepository::upsert(self, key, attrs).await
    }

    async fn get(&self, key: &AssetKey) -> MediaResult<Option<MediaAsset>> {
        AssetRepository::get(self, key).await
    }

    async fn delete(&self, key: &AssetKey) -> MediaResult<u64> {
        AssetRepository::delete(self, key).await
    }

    async fn delete_for_owner_field(
        &self,
        owner_type: &str,
        owner_id: i64,
        owner_field: &str,
        file_names: Option<&[String]>,
    ) -> MediaResult<u64> {
        AssetRepository::delete_for_owner_field(self, owner_type, owner_id, owner_field, file_names)
            .await
    }

    async fn list_for_owner(
        &self,
        owner_type: &str,
        owner_id: i64,
    ) -> MediaResult<Vec<MediaAsset>> {
        AssetRepository::list_for_owner(self, owner_type, owner_id).await
    }

    async fn find_duplicates(&self) -> MediaResult<Vec<DuplicateGroup>> {
        AssetRepository::find_duplicates(self).await
    }

    async fn remove_duplicates(&self) -> MediaResult<u64> {
        AssetRepository::remove_duplicates(self).await
    }

    async fn count_duplicate_groups(&self) -> MediaResult<i64> {
        AssetRepository::count_duplicate_groups(self).await
    }

    async fn count(&self, filter: &AssetFilter) -> MediaResult<i64> {
        AssetRepository::count(self, filter).await
    }

    async fn fetch_chunk(
        &self,
        filter: &AssetFilter,
        after_id: i64,
        limit: i64,
    ) -> MediaResult<Vec<MediaAsset>> {
        AssetRepository::fetch_chunk(self, filter, after_id, limit).await
    }
}
