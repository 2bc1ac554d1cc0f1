use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};

use crate::error::WorkError;

/// Result of one successful job run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkOutput {
    /// Short human-readable summary persisted alongside the `completed` status.
    pub summary: Option<String>,
}

impl WorkOutput {
    pub fn with_summary(summary: impl Into<String>) -> Self {
        Self {
            summary: Some(summary.into()),
        }
    }
}

/// Performs the actual background work for one tenant.
///
/// Any returned error counts as one failed attempt. Implementations decide for
/// themselves whether to retry internally before giving up.
pub trait WorkExecutor: Send + Sync {
    fn execute<'a>(&'a self, tenant_id: &'a str) -> BoxFuture<'a, Result<WorkOutput, WorkError>>;
}

/// Run the executor, converting a panic into [`WorkError::Panicked`] so one
/// misbehaving tenant cannot take the worker down.
pub(crate) async fn run_guarded(
    executor: &dyn WorkExecutor,
    tenant_id: &str,
) -> Result<WorkOutput, WorkError> {
    match AssertUnwindSafe(executor.execute(tenant_id))
        .catch_unwind()
        .await
    {
        Ok(result) => result,
        Err(payload) => Err(WorkError::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
