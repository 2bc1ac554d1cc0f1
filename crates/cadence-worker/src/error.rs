use std::time::Duration;

use thiserror::Error;

/// Failure reported by a [`crate::WorkExecutor`] for one attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkError {
    #[error("{0}")]
    Failed(String),

    #[error("timed out after {}s", .0.as_secs())]
    TimedOut(Duration),

    #[error("executor panicked: {0}")]
    Panicked(String),
}

impl WorkError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Classified job failure, used for status messages and logs.
#[derive(Debug, Clone, Error)]
pub enum JobFailure {
    /// Attempts remain; the job goes back to the tail of the queue.
    #[error("attempt {attempt} of {max_attempts} failed: {error}")]
    Transient {
        attempt: u32,
        max_attempts: u32,
        error: WorkError,
    },

    /// Attempts exhausted; the job is dropped with status `failed`.
    #[error("failed after {attempts} attempts: {error}")]
    Permanent { attempts: u32, error: WorkError },
}

/// Tenant listing failed for one tier.
#[derive(Debug, Clone, Error)]
#[error("tenant listing failed for tier {tier}: {reason}")]
pub struct ListError {
    pub tier: String,
    pub reason: String,
}

impl ListError {
    pub fn new(tier: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            tier: tier.into(),
            reason: reason.into(),
        }
    }
}

/// Status store or run ledger persistence failure.
#[derive(Debug, Clone, Error)]
#[error("status store error: {0}")]
pub struct StoreError(pub String);

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("work queue worker is already running")]
    AlreadyStarted,

    #[error(transparent)]
    Store(#[from] StoreError),
}
