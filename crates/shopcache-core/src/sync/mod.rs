//! Sync orchestration: scope bookkeeping, single-flight deduplication and
//! the scheduler that writes catalog snapshots through to the store.

pub mod flight;
pub mod scheduler;
pub mod scope;
pub mod tracker;

pub use flight::{Flight, SingleFlight};
pub use scheduler::{SchedulerConfig, SyncOutcome, SyncReport, SyncScheduler};
pub use scope::{SyncRecord, SyncScope};
pub use tracker::{InFlightGuard, SyncTracker};
