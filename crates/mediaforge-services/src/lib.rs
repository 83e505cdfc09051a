//! Business service layer: orchestration over storage, processing, and the
//! metadata store. The CLI depends on this single facade.

pub mod batch;
pub mod compress;
pub mod dedup;
pub mod events;
pub mod refresh;
pub mod sizes;
pub mod stats;
pub mod store;
pub mod summary;
pub mod upload;
pub mod variants;

pub use batch::{BatchCoordinator, LogSink, ProgressSink};
pub use compress::{CompressOutcome, CompressService};
pub use dedup::{DedupReport, DedupService};
pub use events::FieldChangeHandler;
pub use refresh::{RefreshOutcome, RefreshReconciler};
pub use sizes::{NamedSizeManager, SizeAction};
pub use stats::AssetStats;
pub use store::MetadataStore;
pub use summary::BulkSummary;
pub use upload::{UploadOrchestrator, UploadRequest, UploadedMedia};
pub use variants::{SizeVariantGenerator, VariantOutcome};

#[cfg(test)]
pub(crate) mod testing;
