//! Repository for media metadata records.
//!
//! Every record is keyed by the natural key (owner_type, owner_id,
//! owner_field, file_name). Writes are scoped to one key, so no cross-row
//! locking is needed; concurrent writers of the same key are last-writer-wins.

use chrono::Utc;
use sqlx::{PgPool, Postgres, QueryBuilder};

use mediaforge_core::models::{AssetAttrs, AssetKey, DuplicateGroup, MediaAsset};
use mediaforge_core::MediaResult;

/// Optional constraints for list/count/iteration queries.
#[derive(Debug, Clone, Default)]
pub struct AssetFilter {
    pub owner_type: Option<String>,
    pub owner_id: Option<i64>,
    pub owner_field: Option<String>,
    /// Only records strictly larger than this many bytes.
    pub min_file_size: Option<i64>,
    /// Matched with `LIKE 'prefix%'`, e.g. "image/".
    pub mime_prefix: Option<String>,
}

impl AssetFilter {
    fn push_where(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        let mut sep = " WHERE ";
        if let Some(ref owner_type) = self.owner_type {
            qb.push(sep).push("owner_type = ").push_bind(owner_type.clone());
            sep = " AND ";
        }
        if let Some(owner_id) = self.owner_id {
            qb.push(sep).push("owner_id = ").push_bind(owner_id);
            sep = " AND ";
        }
        if let Some(ref owner_field) = self.owner_field {
            qb.push(sep).push("owner_field = ").push_bind(owner_field.clone());
            sep = " AND ";
        }
        if let Some(min) = self.min_file_size {
            qb.push(sep).push("file_size > ").push_bind(min);
            sep = " AND ";
        }
        if let Some(ref prefix) = self.mime_prefix {
            qb.push(sep)
                .push("mime_type LIKE ")
                .push_bind(format!("{}%", prefix));
        }
    }
}

/// Data access for the `media_assets` table.
#[derive(Clone)]
pub struct AssetRepository {
    pool: PgPool,
}

impl AssetRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create-or-update by natural key. An existing record is updated in
    /// place; a colliding insert is therefore never a hard failure.
    #[tracing::instrument(skip(self, attrs), fields(db.table = "media_assets", db.operation = "upsert", key = %key))]
    pub async fn upsert(&self, key: &AssetKey, attrs: &AssetAttrs) -> MediaResult<MediaAsset> {
        let now = Utc::now();
        let metadata = attrs
            .metadata
            .clone()
            .unwrap_or_else(|| serde_json::json!({}));

        let updated: Option<MediaAsset> = sqlx::query_as::<Postgres, MediaAsset>(
            r#"
            UPDATE media_assets
            SET file_size = $5, mime_type = $6, width = $7, height = $8,
                metadata = $9, seo_title = $10, updated_at = $11
            WHERE owner_type = $1 AND owner_id = $2 AND owner_field = $3 AND file_name = $4
            RETURNING *
            "#,
        )
        .bind(&key.owner_type)
        .bind(key.owner_id)
        .bind(&key.owner_field)
        .bind(&key.file_name)
        .bind(attrs.file_size)
        .bind(&attrs.mime_type)
        .bind(attrs.width)
        .bind(attrs.height)
        .bind(&metadata)
        .bind(&attrs.seo_title)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(asset) = updated {
            return Ok(asset);
        }

        let inserted: MediaAsset = sqlx::query_as::<Postgres, MediaAsset>(
            r#"
            INSERT INTO media_assets (
                owner_type, owner_id, owner_field, file_name,
                file_size, mime_type, width, height, metadata, seo_title,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
            RETURNING *
            "#,
        )
        .bind(&key.owner_type)
        .bind(key.owner_id)
        .bind(&key.owner_field)
        .bind(&key.file_name)
        .bind(attrs.file_size)
        .bind(&attrs.mime_type)
        .bind(attrs.width)
        .bind(attrs.height)
        .bind(&metadata)
        .bind(&attrs.seo_title)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(inserted)
    }

    #[tracing::instrument(skip(self), fields(db.table = "media_assets", db.operation = "select", key = %key))]
    pub async fn get(&self, key: &AssetKey) -> MediaResult<Option<MediaAsset>> {
        let asset = sqlx::query_as::<Postgres, MediaAsset>(
            r#"
            SELECT * FROM media_assets
            WHERE owner_type = $1 AND owner_id = $2 AND owner_field = $3 AND file_name = $4
            ORDER BY id
            LIMIT 1
            "#,
        )
        .bind(&key.owner_type)
        .bind(key.owner_id)
        .bind(&key.owner_field)
        .bind(&key.file_name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(asset)
    }

    #[tracing::instrument(skip(self), fields(db.table = "media_assets", db.operation = "select"))]
    pub async fn get_by_id(&self, id: i64) -> MediaResult<Option<MediaAsset>> {
        let asset =
            sqlx::query_as::<Postgres, MediaAsset>("SELECT * FROM media_assets WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(asset)
    }

    /// Delete the record(s) for one natural key. Returns how many rows went
    /// away (more than one only when legacy duplicates existed).
    #[tracing::instrument(skip(self), fields(db.table = "media_assets", db.operation = "delete", key = %key))]
    pub async fn delete(&self, key: &AssetKey) -> MediaResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM media_assets
            WHERE owner_type = $1 AND owner_id = $2 AND owner_field = $3 AND file_name = $4
            "#,
        )
        .bind(&key.owner_type)
        .bind(key.owner_id)
        .bind(&key.owner_field)
        .bind(&key.file_name)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Cascading delete of the records backing one owner field, optionally
    /// restricted to a set of file names.
    #[tracing::instrument(skip(self, file_names), fields(db.table = "media_assets", db.operation = "delete"))]
    pub async fn delete_for_owner_field(
        &self,
        owner_type: &str,
        owner_id: i64,
        owner_field: &str,
        file_names: Option<&[String]>,
    ) -> MediaResult<u64> {
        let result = match file_names {
            Some(names) => {
                sqlx::query(
                    r#"
                    DELETE FROM media_assets
                    WHERE owner_type = $1 AND owner_id = $2 AND owner_field = $3
                      AND file_name = ANY($4)
                    "#,
                )
                .bind(owner_type)
                .bind(owner_id)
                .bind(owner_field)
                .bind(names)
                .execute(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    DELETE FROM media_assets
                    WHERE owner_type = $1 AND owner_id = $2 AND owner_field = $3
                    "#,
                )
                .bind(owner_type)
                .bind(owner_id)
                .bind(owner_field)
                .execute(&self.pool)
                .await?
            }
        };
        Ok(result.rows_affected())
    }

    /// All records of every field of one owner.
    #[tracing::instrument(skip(self), fields(db.table = "media_assets", db.operation = "select"))]
    pub async fn list_for_owner(
        &self,
        owner_type: &str,
        owner_id: i64,
    ) -> MediaResult<Vec<MediaAsset>> {
        let assets = sqlx::query_as::<Postgres, MediaAsset>(
            "SELECT * FROM media_assets WHERE owner_type = $1 AND owner_id = $2 ORDER BY id",
        )
        .bind(owner_type)
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(assets)
    }

    /// Groups of records sharing a natural key, each with the oldest id to
    /// keep and the total member count.
    #[tracing::instrument(skip(self), fields(db.table = "media_assets", db.operation = "select"))]
    pub async fn find_duplicates(&self) -> MediaResult<Vec<DuplicateGroup>> {
        let groups = sqlx::query_as::<Postgres, DuplicateGroup>(
            r#"
            SELECT owner_type, owner_id, owner_field, file_name,
                   MIN(id) AS keep_id, COUNT(*) AS duplicate_count
            FROM media_assets
            GROUP BY owner_type, owner_id, owner_field, file_name
            HAVING COUNT(*) > 1
            ORDER BY owner_type, owner_id, owner_field, file_name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(groups)
    }

    /// Delete all but the oldest record of every duplicate group. Returns the
    /// number of rows removed. Idempotent: a second run removes zero.
    #[tracing::instrument(skip(self), fields(db.table = "media_assets", db.operation = "delete"))]
    pub async fn remove_duplicates(&self) -> MediaResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM media_assets a
            USING media_assets b
            WHERE a.owner_type = b.owner_type
              AND a.owner_id = b.owner_id
              AND a.owner_field = b.owner_field
              AND a.file_name = b.file_name
              AND a.id > b.id
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Post-dedup verification: how many duplicate groups remain. Non-zero
    /// means a concurrent writer raced the pass and it should be re-run.
    pub async fn count_duplicate_groups(&self) -> MediaResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM (
                SELECT 1
                FROM media_assets
                GROUP BY owner_type, owner_id, owner_field, file_name
                HAVING COUNT(*) > 1
            ) dups
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    #[tracing::instrument(skip(self, filter), fields(db.table = "media_assets", db.operation = "select"))]
    pub async fn count(&self, filter: &AssetFilter) -> MediaResult<i64> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM media_assets");
        filter.push_where(&mut qb);
        let count: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(count)
    }

    /// One keyset-paginated chunk: records with `id > after_id`, ordered by
    /// id, at most `limit` rows. Lets callers walk tables of millions of rows
    /// without holding them in memory.
    #[tracing::instrument(skip(self, filter), fields(db.table = "media_assets", db.operation = "select"))]
    pub async fn fetch_chunk(
        &self,
        filter: &AssetFilter,
        after_id: i64,
        limit: i64,
    ) -> MediaResult<Vec<MediaAsset>> {
        let mut qb = QueryBuilder::new("SELECT * FROM media_assets");
        filter.push_where(&mut qb);
        let sep = if filter_is_empty(filter) { " WHERE " } else { " AND " };
        qb.push(sep).push("id > ").push_bind(after_id);
        qb.push(" ORDER BY id LIMIT ").push_bind(limit);
        let assets = qb.build_query_as().fetch_all(&self.pool).await?;
        Ok(assets)
    }
}

fn filter_is_empty(filter: &AssetFilter) -> bool {
    filter.owner_type.is_none()
        && filter.owner_id.is_none()
        && filter.owner_field.is_none()
        && filter.min_file_size.is_none()
        && filter.mime_prefix.is_none()
}
