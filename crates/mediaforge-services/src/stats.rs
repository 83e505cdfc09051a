//! Cached counters over the metadata store.

use std::sync::Arc;
use std::time::Duration;

use mediaforge_core::cache::TtlCache;
use mediaforge_core::MediaResult;
use mediaforge_db::AssetFilter;

use crate::store::MetadataStore;

/// Counter of records whose file exceeds a size threshold. The count backs a
/// dashboard tile, so it is cached; writers call `invalidate` after any
/// mutation that could move it.
pub struct AssetStats {
    store: Arc<dyn MetadataStore>,
    min_file_size: i64,
    cache: TtlCache<i64>,
}

impl AssetStats {
    pub fn new(store: Arc<dyn MetadataStore>, min_file_size: i64, ttl: Duration) -> Self {
        Self {
            store,
            min_file_size,
            cache: TtlCache::new(ttl),
        }
    }

    /// Records strictly larger than the threshold.
    pub async fn oversized_count(&self) -> MediaResult<i64> {
        let filter = AssetFilter {
            min_file_size: Some(self.min_file_size),
            ..AssetFilter::default()
        };
        self.cache
            .get_or_recompute(|| async { self.store.count(&filter).await })
            .await
    }

    pub fn invalidate(&self) {
        self.cache.invalidate();
    }
}
