//! Bounded in-process worker pool with fixed-backoff retry.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Semaphore};

use mediaforge_core::config::WorkerConfig;
use mediaforge_core::{MediaError, MediaResult};

use crate::unit::{Dispatcher, UnitDescriptor, UnitHandler, UnitKind};

#[derive(Debug, Clone)]
pub struct TaskQueueConfig {
    pub max_workers: usize,
    pub queue_depth: usize,
}

impl Default for TaskQueueConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            queue_depth: 1024,
        }
    }
}

impl TaskQueueConfig {
    pub fn from_worker_config(config: &WorkerConfig) -> Self {
        Self {
            max_workers: config.max_workers,
            ..Self::default()
        }
    }
}

/// Dispatches units to a pool of at most `max_workers` concurrent tasks.
/// Units run to completion or failure; a unit never yields mid-operation.
pub struct TaskQueue {
    tx: mpsc::Sender<UnitDescriptor>,
    handler: Arc<dyn UnitHandler>,
    shutdown_tx: mpsc::Sender<()>,
}

impl TaskQueue {
    pub fn new(config: TaskQueueConfig, handler: Arc<dyn UnitHandler>) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_depth);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let pool_handler = handler.clone();
        tokio::spawn(async move {
            Self::worker_pool(config, pool_handler, rx, shutdown_rx).await;
        });

        Self {
            tx,
            handler,
            shutdown_tx,
        }
    }

    async fn worker_pool(
        config: TaskQueueConfig,
        handler: Arc<dyn UnitHandler>,
        mut rx: mpsc::Receiver<UnitDescriptor>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        tracing::info!(max_workers = config.max_workers, "Worker pool started");
        let semaphore = Arc::new(Semaphore::new(config.max_workers));

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Worker pool shutting down");
                    break;
                }
                unit = rx.recv() => {
                    let Some(unit) = unit else { break };
                    let permit = match semaphore.clone().acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => break,
                    };
                    let handler = handler.clone();
                    tokio::spawn(async move {
                        let _permit = permit;
                        if let Err(e) = run_with_retry(handler.as_ref(), &unit).await {
                            tracing::error!(
                                unit_id = %unit.id,
                                unit_kind = %unit.kind,
                                error = %e,
                                "Unit failed after retries"
                            );
                        }
                    });
                }
            }
        }

        tracing::info!("Worker pool stopped");
    }

    /// Signals the pool to stop claiming new units. Returns immediately;
    /// in-flight units run to completion.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

#[async_trait]
impl Dispatcher for TaskQueue {
    async fn submit(&self, unit: UnitDescriptor) -> MediaResult<()> {
        tracing::debug!(unit_id = %unit.id, unit_kind = %unit.kind, "Unit submitted");
        self.tx
            .send(unit)
            .await
            .map_err(|_| MediaError::Internal("Worker pool is shut down".to_string()))
    }

    async fn submit_sync(&self, unit: UnitDescriptor) -> MediaResult<serde_json::Value> {
        run_with_retry(self.handler.as_ref(), &unit).await
    }
}

/// Execute one unit with its retry budget. Only retryable errors on
/// retryable unit kinds consume attempts; everything else fails immediately.
/// Exposed so alternative dispatchers keep the same retry discipline as the
/// pool.
pub async fn run_with_retry(
    handler: &dyn UnitHandler,
    unit: &UnitDescriptor,
) -> MediaResult<serde_json::Value> {
    let budget = if unit.kind.retryable() {
        unit.max_retries
    } else {
        0
    };
    let mut attempt = 0u32;
    loop {
        match handler.execute(unit).await {
            Ok(result) => {
                tracing::info!(
                    unit_id = %unit.id,
                    unit_kind = %unit.kind,
                    attempt = attempt,
                    "Unit completed"
                );
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < budget => {
                attempt += 1;
                tracing::warn!(
                    unit_id = %unit.id,
                    unit_kind = %unit.kind,
                    error = %e,
                    attempt = attempt,
                    max_retries = budget,
                    "Unit failed, retrying after backoff"
                );
                tokio::time::sleep(Duration::from_secs(unit.retry_backoff_secs)).await;
            }
            Err(e) => {
                if unit.kind == UnitKind::Notify {
                    // Fire-once semantics: log and swallow.
                    tracing::warn!(unit_id = %unit.id, error = %e, "Notification failed, not retried");
                    return Ok(serde_json::Value::Null);
                }
                return Err(e);
            }
        }
    }
}
