//! Background reconciliation between the Local Store and the remote.
//!
//! The engine runs push-then-pull passes per entity kind with a
//! single-flight guarantee; the scheduler decides when passes run
//! (interval, reconnect, DAL hints); connectivity is an injectable
//! online/offline flag.

mod connectivity;
mod engine;
mod scheduler;

pub use connectivity::Connectivity;
pub use engine::{PassReport, SyncEngine, Syncer, SyncPassError, SyncStatusSummary};
pub use scheduler::{Scheduler, SchedulerHandle, SyncHandle, SyncRequest};
