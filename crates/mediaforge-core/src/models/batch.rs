//! Pure batch-progress state machine: Pending -> Accumulating -> Complete.
//!
//! Locking and event emission live in the services layer; this type only
//! tracks counts, the bounded detail list, and aggregate byte savings so the
//! transitions stay unit-testable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Result reported by one completing work unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UnitOutcome {
    Success {
        identifier: String,
        message: String,
        /// Negative when bytes were saved (after - before).
        bytes_delta: i64,
    },
    Failure {
        identifier: String,
        error: String,
    },
}

impl UnitOutcome {
    pub fn identifier(&self) -> &str {
        match self {
            UnitOutcome::Success { identifier, .. } => identifier,
            UnitOutcome::Failure { identifier, .. } => identifier,
        }
    }
}

/// Bounded per-unit summary kept for reporting, oldest-first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitSummary {
    pub identifier: String,
    pub succeeded: bool,
    pub message: String,
}

/// Ephemeral progress record for one fan-out batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchProgress {
    pub batch_id: Uuid,
    pub total: u32,
    pub completed: u32,
    pub failed: u32,
    pub details: Vec<UnitSummary>,
    /// Sum of reported byte deltas; negative means net savings.
    pub bytes_delta: i64,
    pub created_at: DateTime<Utc>,
}

impl BatchProgress {
    pub fn new(batch_id: Uuid, total: u32) -> Self {
        Self {
            batch_id,
            total,
            completed: 0,
            failed: 0,
            details: Vec::new(),
            bytes_delta: 0,
            created_at: Utc::now(),
        }
    }

    /// Record one unit outcome. Returns true when this call completed the
    /// batch (completed + failed reached total for the first time).
    pub fn record(&mut self, outcome: &UnitOutcome, detail_cap: usize) -> bool {
        let was_complete = self.is_complete();
        match outcome {
            UnitOutcome::Success {
                identifier,
                message,
                bytes_delta,
            } => {
                self.completed += 1;
                self.bytes_delta += bytes_delta;
                if self.details.len() < detail_cap {
                    self.details.push(UnitSummary {
                        identifier: identifier.clone(),
                        succeeded: true,
                        message: message.clone(),
                    });
                }
            }
            UnitOutcome::Failure { identifier, error } => {
                self.failed += 1;
                if self.details.len() < detail_cap {
                    self.details.push(UnitSummary {
                        identifier: identifier.clone(),
                        succeeded: false,
                        message: error.clone(),
                    });
                }
            }
        }
        !was_complete && self.is_complete()
    }

    pub fn is_complete(&self) -> bool {
        self.completed + self.failed >= self.total
    }

    pub fn all_succeeded(&self) -> bool {
        self.is_complete() && self.failed == 0
    }

    pub fn finished(&self) -> u32 {
        self.completed + self.failed
    }
}
