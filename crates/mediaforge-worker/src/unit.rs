//! Work-unit descriptors and the dispatch traits.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use mediaforge_core::MediaResult;

/// What a work unit does. Notifications are fire-once: a failed notification
/// is logged, never retried, since a retry could duplicate a user-visible
/// message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    ImageCompress,
    VideoCompress,
    MetadataRefresh,
    VariantDerive,
    Notify,
}

impl UnitKind {
    pub fn retryable(self) -> bool {
        !matches!(self, UnitKind::Notify)
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnitKind::ImageCompress => "image_compress",
            UnitKind::VideoCompress => "video_compress",
            UnitKind::MetadataRefresh => "metadata_refresh",
            UnitKind::VariantDerive => "variant_derive",
            UnitKind::Notify => "notify",
        };
        f.write_str(s)
    }
}

/// One independent unit of work. Retry count and backoff travel with the
/// descriptor so different unit kinds can carry different budgets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitDescriptor {
    pub id: Uuid,
    pub kind: UnitKind,
    pub payload: serde_json::Value,
    /// Progress record this unit reports into, if dispatched as part of a
    /// bulk operation.
    pub batch_id: Option<Uuid>,
    pub max_retries: u32,
    pub retry_backoff_secs: u64,
}

impl UnitDescriptor {
    pub fn new(kind: UnitKind, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            payload,
            batch_id: None,
            max_retries: 3,
            retry_backoff_secs: 5,
        }
    }

    pub fn with_batch(mut self, batch_id: Uuid) -> Self {
        self.batch_id = Some(batch_id);
        self
    }

    pub fn with_retries(mut self, max_retries: u32, backoff_secs: u64) -> Self {
        self.max_retries = max_retries;
        self.retry_backoff_secs = backoff_secs;
        self
    }
}

/// Executes one unit. Implemented by the application layer; the queue knows
/// nothing about what units do.
#[async_trait]
pub trait UnitHandler: Send + Sync {
    async fn execute(&self, unit: &UnitDescriptor) -> MediaResult<serde_json::Value>;
}

/// Work-dispatch capability consumed by the services layer.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Fire-and-forget submission to the pool.
    async fn submit(&self, unit: UnitDescriptor) -> MediaResult<()>;

    /// Run the unit in the caller's task, with the same retry discipline.
    /// Used by CLI and dry-run paths that need the result inline.
    async fn submit_sync(&self, unit: UnitDescriptor) -> MediaResult<serde_json::Value>;
}
