//! Tier-driven scheduling and the single-consumer background work queue.
//!
//! [`TierScheduler`] decides which tenants are due on each tier tick and hands
//! them to a [`WorkQueue`], which runs one [`WorkExecutor`] call at a time with
//! per-tenant deduplication, bounded retry, and persisted status.

pub mod error;
pub mod executor;
pub mod job;
pub mod queue;
pub mod scheduler;
pub mod store;
pub mod tenants;

pub use error::{JobFailure, ListError, QueueError, StoreError, WorkError};
pub use executor::{WorkExecutor, WorkOutput};
pub use job::{Job, JobOutcome, JobStatus};
pub use queue::{
    EnqueueReceipt, Enqueued, JobHandle, JobStatusView, QueueSettings, QueueSnapshot, WorkQueue,
    WorkerHandle, WorkerState,
};
pub use scheduler::{Dispatch, SchedulerError, TickReport, TierScheduler};
pub use store::{MemoryStatusStore, StatusRecord, StatusStore};
pub use tenants::{InMemoryTenants, RunLedger, TenantLister};
