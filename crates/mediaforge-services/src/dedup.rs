//! Duplicate metadata record cleanup.
//!
//! The natural key is deliberately not unique at the database level, so
//! concurrent writers racing the upsert can leave duplicate rows behind.
//! Dedup keeps the oldest row of each group and deletes the rest.

use std::sync::Arc;

use mediaforge_core::models::DuplicateGroup;
use mediaforge_core::MediaResult;

use crate::store::MetadataStore;

/// Outcome of one dedup pass.
#[derive(Debug, Clone, Default)]
pub struct DedupReport {
    /// Groups found before any deletion, oldest keeper first.
    pub groups: Vec<DuplicateGroup>,
    /// Rows actually deleted; zero on a dry run.
    pub removed: u64,
    /// Groups still present after the pass. Non-zero means writers raced the
    /// cleanup and another pass is needed.
    pub remaining_groups: i64,
    pub dry_run: bool,
}

impl DedupReport {
    pub fn clean(&self) -> bool {
        self.remaining_groups == 0
    }
}

/// Finds and removes duplicate records sharing a natural key.
pub struct DedupService {
    store: Arc<dyn MetadataStore>,
}

impl DedupService {
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self { store }
    }

    /// One detect/delete/verify cycle.
    #[tracing::instrument(skip(self))]
    pub async fn run(&self, dry_run: bool) -> MediaResult<DedupReport> {
        let groups = self.store.find_duplicates().await?;
        if groups.is_empty() {
            return Ok(DedupReport {
                dry_run,
                ..DedupReport::default()
            });
        }
        tracing::info!(groups = groups.len(), dry_run = dry_run, "Duplicate groups found");

        if dry_run {
            return Ok(DedupReport {
                remaining_groups: groups.len() as i64,
                groups,
                removed: 0,
                dry_run: true,
            });
        }

        let removed = self.store.remove_duplicates().await?;
        let remaining_groups = self.store.count_duplicate_groups().await?;
        if remaining_groups > 0 {
            tracing::warn!(
                remaining = remaining_groups,
                "Duplicate groups reappeared during cleanup, re-run dedup"
            );
        } else {
            tracing::info!(removed = removed, "Duplicate records removed");
        }
        Ok(DedupReport {
            groups,
            removed,
            remaining_groups,
            dry_run: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryStore;
    use mediaforge_core::models::{AssetAttrs, AssetKey};

    fn key(file: &str) -> AssetKey {
        AssetKey::new("shop.ProductModel", 42, "images", file)
    }

    fn attrs(size: i64) -> AssetAttrs {
        AssetAttrs {
            file_size: size,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn oldest_row_of_each_group_survives() {
        let store = Arc::new(InMemoryStore::new());
        let keeper = store.insert_raw(&key("a.webp"), &attrs(100));
        store.insert_raw(&key("a.webp"), &attrs(200));
        store.insert_raw(&key("a.webp"), &attrs(300));
        store.insert_raw(&key("b.webp"), &attrs(50));

        let report = DedupService::new(store.clone()).run(false).await.unwrap();
        assert_eq!(report.groups.len(), 1);
        assert_eq!(report.groups[0].keep_id, keeper.id);
        assert_eq!(report.groups[0].duplicate_count, 3);
        assert_eq!(report.removed, 2);
        assert!(report.clean());

        let rest = store.all();
        assert_eq!(rest.len(), 2);
        assert!(rest.iter().any(|a| a.id == keeper.id));
    }

    #[tokio::test]
    async fn dry_run_only_reports() {
        let store = Arc::new(InMemoryStore::new());
        store.insert_raw(&key("a.webp"), &attrs(100));
        store.insert_raw(&key("a.webp"), &attrs(200));

        let report = DedupService::new(store.clone()).run(true).await.unwrap();
        assert!(report.dry_run);
        assert_eq!(report.removed, 0);
        assert_eq!(report.groups.len(), 1);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn clean_store_is_a_no_op() {
        let store = Arc::new(InMemoryStore::new());
        store.insert_raw(&key("a.webp"), &attrs(100));
        let report = DedupService::new(store).run(false).await.unwrap();
        assert!(report.groups.is_empty());
        assert_eq!(report.removed, 0);
        assert!(report.clean());
    }
}
