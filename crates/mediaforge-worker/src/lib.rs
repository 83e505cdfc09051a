//! In-process work dispatch: a bounded worker pool with per-unit retry.

pub mod queue;
pub mod unit;

pub use queue::{run_with_retry, TaskQueue, TaskQueueConfig};
pub use unit::{Dispatcher, UnitDescriptor, UnitHandler, UnitKind};
