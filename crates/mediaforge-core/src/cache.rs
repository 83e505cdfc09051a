//! Read-through TTL cache for derived counters.
//!
//! Holds one recomputable value with an expiry; writers that change the
//! underlying data call `invalidate` so the next read recomputes.

use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub struct TtlCache<T: Clone> {
    ttl: Duration,
    slot: Mutex<Option<(Instant, T)>>,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: Mutex::new(None),
        }
    }

    /// Return the cached value if fresh, otherwise recompute and store it.
    pub async fn get_or_recompute<F, Fut, E>(&self, recompute: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        {
            let slot = self.slot.lock().expect("cache lock poisoned");
            if let Some((at, value)) = slot.as_ref() {
                if at.elapsed() < self.ttl {
                    return Ok(value.clone());
                }
            }
        }
        let value = recompute().await?;
        let mut slot = self.slot.lock().expect("cache lock poisoned");
        *slot = Some((Instant::now(), value.clone()));
        Ok(value)
    }

    pub fn invalidate(&self) {
        let mut slot = self.slot.lock().expect("cache lock poisoned");
        *slot = None;
    }
}
