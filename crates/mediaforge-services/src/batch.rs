//! Batch progress coordination across concurrent workers.
//!
//! The progress record is the only state shared across workers. Increments
//! run under a per-coordinator lock; the final transition removes the record
//! while still holding the lock, so the completion event fires exactly once
//! no matter how unit completions interleave.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use mediaforge_core::config::BatchConfig;
use mediaforge_core::models::{BatchProgress, UnitOutcome};
use mediaforge_core::{MediaError, MediaResult};

/// Receives progress events. The default sink logs; applications can plug in
/// chat/webhook notifiers.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    /// Intermediate progress, emitted at the configured cadence.
    async fn progress(&self, progress: &BatchProgress);

    /// Final event, fired exactly once per batch.
    async fn finished(&self, progress: &BatchProgress);
}

/// Logs progress through tracing.
pub struct LogSink;

#[async_trait]
impl ProgressSink for LogSink {
    async fn progress(&self, progress: &BatchProgress) {
        tracing::info!(
            batch_id = %progress.batch_id,
            finished = progress.finished(),
            total = progress.total,
            "Batch progress"
        );
    }

    async fn finished(&self, progress: &BatchProgress) {
        if progress.all_succeeded() {
            tracing::info!(
                batch_id = %progress.batch_id,
                completed = progress.completed,
                bytes_delta = progress.bytes_delta,
                "Batch finished, all units succeeded"
            );
        } else {
            tracing::warn!(
                batch_id = %progress.batch_id,
                completed = progress.completed,
                failed = progress.failed,
                bytes_delta = progress.bytes_delta,
                "Batch finished with failures"
            );
        }
    }
}

/// Tracks in-flight batches and emits progress events.
pub struct BatchCoordinator {
    batches: Mutex<HashMap<Uuid, BatchProgress>>,
    sink: Arc<dyn ProgressSink>,
    config: BatchConfig,
}

impl BatchCoordinator {
    pub fn new(config: BatchConfig, sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            batches: Mutex::new(HashMap::new()),
            sink,
            config,
        }
    }

    /// Open a new batch with a known unit total. Returns its opaque id.
    pub async fn start(&self, total: u32) -> Uuid {
        let batch_id = Uuid::new_v4();
        let progress = BatchProgress::new(batch_id, total);
        self.batches.lock().await.insert(batch_id, progress);
        tracing::debug!(batch_id = %batch_id, total = total, "Batch started");
        batch_id
    }

    /// Record one unit outcome against a batch. The completing call removes
    /// the record and fires the final event.
    pub async fn record(&self, batch_id: Uuid, outcome: &UnitOutcome) -> MediaResult<()> {
        let (completed_now, snapshot) = {
            let mut batches = self.batches.lock().await;
            let progress = batches.get_mut(&batch_id).ok_or_else(|| {
                MediaError::InvalidInput(format!("Unknown or expired batch {}", batch_id))
            })?;
            let completed_now = progress.record(outcome, self.config.detail_cap);
            if completed_now {
                // Remove under the lock so a racing duplicate report cannot
                // observe a complete batch and re-fire.
                (true, batches.remove(&batch_id))
            } else {
                let notify = self.config.notify_every > 0
                    && progress.finished() % self.config.notify_every == 0;
                (false, notify.then(|| progress.clone()))
            }
        };

        match (completed_now, snapshot) {
            (true, Some(progress)) => self.sink.finished(&progress).await,
            (false, Some(progress)) => self.sink.progress(&progress).await,
            _ => {}
        }
        Ok(())
    }

    /// Current snapshot of an in-flight batch.
    pub async fn get(&self, batch_id: Uuid) -> Option<BatchProgress> {
        self.batches.lock().await.get(&batch_id).cloned()
    }

    /// Drop abandoned progress records older than the configured TTL.
    /// Batches whose units stopped reporting would otherwise accumulate.
    pub async fn evict_expired(&self) -> usize {
        let ttl = chrono::Duration::from_std(Duration::from_secs(self.config.ttl_secs))
            .unwrap_or_else(|_| chrono::Duration::seconds(3600));
        let cutoff = chrono::Utc::now() - ttl;
        let mut batches = self.batches.lock().await;
        let before = batches.len();
        batches.retain(|_, p| p.created_at > cutoff);
        let evicted = before - batches.len();
        if evicted > 0 {
            tracing::warn!(evicted = evicted, "Evicted expired batch progress records");
        }
        evicted
    }
}
