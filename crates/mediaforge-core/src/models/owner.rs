//! Owner entities as a small capability interface.
//!
//! The core never reflects on entity classes at runtime. Owners implement
//! `MediaOwner`; a registry maps owner-type tags to resolver functions, and
//! the surrounding application emits `FieldChanged` events when a watched
//! field's value changes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{MediaError, MediaResult};

/// Current value of a watched field on an owner entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldValue {
    /// Single file reference; None/empty means no file.
    Scalar(Option<String>),
    /// Array-valued field holding multiple file references.
    Many(Vec<String>),
}

impl FieldValue {
    /// Whether this value still references the given file name.
    pub fn references(&self, file_name: &str) -> bool {
        match self {
            FieldValue::Scalar(Some(v)) => v == file_name,
            FieldValue::Scalar(None) => false,
            FieldValue::Many(items) => items.iter().any(|v| v == file_name),
        }
    }

    /// All file names currently referenced.
    pub fn files(&self) -> Vec<&str> {
        match self {
            FieldValue::Scalar(Some(v)) => vec![v.as_str()],
            FieldValue::Scalar(None) => Vec::new(),
            FieldValue::Many(items) => items.iter().map(String::as_str).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.files().is_empty()
    }
}

/// Capability interface owners implement for the media core.
pub trait MediaOwner: Send + Sync {
    /// Current value of a watched field, or None if the field is unknown.
    fn field_value(&self, field: &str) -> Option<FieldValue>;

    /// Value of the SEO-title source attribute, if the owner has one.
    fn seo_source(&self, field: &str) -> Option<String>;
}

/// Resolves an owner entity by id, for one owner type.
#[async_trait]
pub trait OwnerResolver: Send + Sync {
    async fn resolve(&self, owner_id: i64) -> MediaResult<Option<Box<dyn MediaOwner>>>;
}

/// Maps owner-type tags to resolvers.
#[derive(Clone, Default)]
pub struct OwnerRegistry {
    resolvers: HashMap<String, Arc<dyn OwnerResolver>>,
}

impl OwnerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, owner_type: impl Into<String>, resolver: Arc<dyn OwnerResolver>) {
        self.resolvers.insert(owner_type.into(), resolver);
    }

    pub fn is_registered(&self, owner_type: &str) -> bool {
        self.resolvers.contains_key(owner_type)
    }

    /// Resolve an owner, or fail with `ReferentialDrift` when the type tag is
    /// unknown (a record pointing at an unregistered type cannot be checked).
    pub async fn resolve(
        &self,
        owner_type: &str,
        owner_id: i64,
    ) -> MediaResult<Option<Box<dyn MediaOwner>>> {
        let resolver = self.resolvers.get(owner_type).ok_or_else(|| {
            MediaError::ReferentialDrift(format!("No resolver registered for '{}'", owner_type))
        })?;
        resolver.resolve(owner_id).await
    }
}

/// Emitted by the owner-entity layer when a watched field's value changes.
/// The core decides derivation/delete actions from the old/new diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChanged {
    pub owner_type: String,
    pub owner_id: i64,
    pub field: String,
    pub old: Option<FieldValue>,
    pub new: Option<FieldValue>,
}

impl FieldChanged {
    /// File names present in `old` but absent from `new` (to be cleaned up).
    pub fn removed_files(&self) -> Vec<String> {
        let new_files: Vec<&str> = self.new.as_ref().map(|v| v.files()).unwrap_or_default();
        self.old
            .as_ref()
            .map(|v| v.files())
            .unwrap_or_default()
            .into_iter()
            .filter(|f| !new_files.contains(f))
            .map(String::from)
            .collect()
    }

    /// File names present in `new` but absent from `old` (to be derived).
    pub fn added_files(&self) -> Vec<String> {
        let old_files: Vec<&str> = self.old.as_ref().map(|v| v.files()).unwrap_or_default();
        self.new
            .as_ref()
            .map(|v| v.files())
            .unwrap_or_default()
            .into_iter()
            .filter(|f| !old_files.contains(f))
            .map(String::from)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_reference_check() {
        let value = FieldValue::Scalar(Some("products/42.webp".into()));
        assert!(value.references("products/42.webp"));
        assert!(!value.references("products/43.webp"));
        assert!(!FieldValue::Scalar(None).references("anything"));
    }

    #[test]
    fn array_membership_check() {
        let value = FieldValue::Many(vec!["a.webp".into(), "b.webp".into()]);
        assert!(value.references("b.webp"));
        assert!(!value.references("c.webp"));
        assert_eq!(value.files(), vec!["a.webp", "b.webp"]);
    }

    #[test]
    fn field_change_diff_is_exact() {
        // [a, b, c] -> [a, c]: only b removed, nothing added.
        let event = FieldChanged {
            owner_type: "shop.ProductModel".into(),
            owner_id: 42,
            field: "images".into(),
            old: Some(FieldValue::Many(vec![
                "a.webp".into(),
                "b.webp".into(),
                "c.webp".into(),
            ])),
            new: Some(FieldValue::Many(vec!["a.webp".into(), "c.webp".into()])),
        };
        assert_eq!(event.removed_files(), vec!["b.webp".to_string()]);
        assert!(event.added_files().is_empty());
    }

    #[test]
    fn replace_yields_both_removed_and_added() {
        let event = FieldChanged {
            owner_type: "shop.ProductModel".into(),
            owner_id: 42,
            field: "cover".into(),
            old: Some(FieldValue::Scalar(Some("old.webp".into()))),
            new: Some(FieldValue::Scalar(Some("new.webp".into()))),
        };
        assert_eq!(event.removed_files(), vec!["old.webp".to_string()]);
        assert_eq!(event.added_files(), vec!["new.webp".to_string()]);
    }

    #[tokio::test]
    async fn unregistered_owner_type_is_drift() {
        let registry = OwnerRegistry::new();
        let err = registry
            .resolve("unknown.Type", 1)
            .await
            .err()
            .expect("expected drift error");
        assert!(matches!(err, MediaError::ReferentialDrift(_)));
    }
}
