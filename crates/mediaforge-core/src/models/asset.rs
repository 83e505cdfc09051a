//! The metadata record for one (owner, field, file) tuple.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Natural key of a metadata record. An owner field may hold multiple files,
/// so the file name is part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetKey {
    /// Fully-qualified owner entity name, e.g. "shop.ProductModel".
    pub owner_type: String,
    pub owner_id: i64,
    /// Attribute on the owner holding the file reference.
    pub owner_field: String,
    /// Canonical storage path/key of the file.
    pub file_name: String,
}

impl AssetKey {
    pub fn new(
        owner_type: impl Into<String>,
        owner_id: i64,
        owner_field: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            owner_type: owner_type.into(),
            owner_id,
            owner_field: owner_field.into(),
            file_name: file_name.into(),
        }
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}#{}.{}:{}",
            self.owner_type, self.owner_id, self.owner_field, self.file_name
        )
    }
}

/// Stored facts about one media file, exclusively owned by the metadata store.
/// The owner entity is a weak back-reference (type + id), never a pointer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct MediaAsset {
    pub id: i64,
    pub owner_type: String,
    pub owner_id: i64,
    pub owner_field: String,
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: Option<String>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    /// Free-form map: compression stats, provenance, SEO title source.
    #[cfg_attr(feature = "sqlx", sqlx(json))]
    pub metadata: serde_json::Value,
    /// Bounded to 160 chars, sanitized on write.
    pub seo_title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MediaAsset {
    pub fn key(&self) -> AssetKey {
        AssetKey {
            owner_type: self.owner_type.clone(),
            owner_id: self.owner_id,
            owner_field: self.owner_field.clone(),
            file_name: self.file_name.clone(),
        }
    }

    pub fn is_image(&self) -> bool {
        self.mime_type
            .as_deref()
            .map(|m| m.starts_with("image/"))
            .unwrap_or(false)
    }
}

/// Attributes written by an upsert; identity comes from the `AssetKey`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetAttrs {
    pub file_size: i64,
    pub mime_type: Option<String>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub metadata: Option<serde_json::Value>,
    pub seo_title: Option<String>,
}

/// One group of records sharing a natural key. `keep_id` is the minimum
/// (oldest) id, the record retained by dedup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct DuplicateGroup {
    pub owner_type: String,
    pub owner_id: i64,
    pub owner_field: String,
    pub file_name: String,
    pub keep_id: i64,
    pub duplicate_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_display_is_stable() {
        let key = AssetKey::new("shop.ProductModel", 42, "images", "products/42.webp");
        assert_eq!(key.to_string(), "shop.ProductModel#42.images:products/42.webp");
    }

    #[test]
    fn keys_differing_only_in_file_name_are_distinct() {
        let a = AssetKey::new("shop.ProductModel", 42, "images", "products/a.webp");
        let b = AssetKey::new("shop.ProductModel", 42, "images", "products/b.webp");
        assert_ne!(a, b);
    }

    #[test]
    fn is_image_follows_mime() {
        let mut asset = MediaAsset {
            id: 1,
            owner_type: "shop.ProductModel".into(),
            owner_id: 42,
            owner_field: "images".into(),
            file_name: "products/42.webp".into(),
            file_size: 1024,
            mime_type: Some("image/webp".into()),
            width: Some(640),
            height: Some(480),
            metadata: serde_json::json!({}),
            seo_title: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(asset.is_image());
        asset.mime_type = Some("video/webm".into());
        assert!(!asset.is_image());
        asset.mime_type = None;
        assert!(!asset.is_image());
    }
}
