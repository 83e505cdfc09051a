//! Aggregate summary for bulk operations.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Failure descriptions beyond this many are elided with an
/// "...and N more" marker.
pub const FAILURE_SAMPLE_SIZE: usize = 5;

/// Counts plus a bounded sample of failures; printed at the end of every
/// bulk command.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkSummary {
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub skipped: u64,
    /// Net byte delta across all units; negative means savings.
    pub bytes_delta: i64,
    /// (identifier, reason) pairs, oldest-first, unbounded internally.
    pub failures: Vec<(String, String)>,
}

impl BulkSummary {
    pub fn record_success(&mut self, bytes_delta: i64) {
        self.processed += 1;
        self.succeeded += 1;
        self.bytes_delta += bytes_delta;
    }

    pub fn record_skip(&mut self) {
        self.processed += 1;
        self.skipped += 1;
    }

    pub fn record_failure(&mut self, identifier: impl Into<String>, reason: impl Into<String>) {
        self.processed += 1;
        self.failed += 1;
        self.failures.push((identifier.into(), reason.into()));
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

impl fmt::Display for BulkSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "processed {} (succeeded {}, failed {}, skipped {})",
            self.processed, self.succeeded, self.failed, self.skipped
        )?;
        if self.bytes_delta != 0 {
            let saved = -self.bytes_delta;
            if saved >= 0 {
                write!(f, ", saved {} bytes", saved)?;
            } else {
                write!(f, ", grew by {} bytes", -saved)?;
            }
        }
        for (identifier, reason) in self.failures.iter().take(FAILURE_SAMPLE_SIZE) {
            write!(f, "\n  {}: {}", identifier, reason)?;
        }
        if self.failures.len() > FAILURE_SAMPLE_SIZE {
            write!(f, "\n  ...and {} more", self.failures.len() - FAILURE_SAMPLE_SIZE)?;
        }
        Ok(())
    }
}
