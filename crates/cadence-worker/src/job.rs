use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::StatusRecord;

/// Lifecycle state of a tenant's background job.
///
/// `Idle` only appears on the status surface, for tenants with no job history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Idle,
    Queued,
    Processing,
    Completed,
    Failed,
    Retrying,
}

impl JobStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Idle => "idle",
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Retrying => "retrying",
        }
    }

    /// Parse a persisted status string. Unknown values yield `None`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(JobStatus::Idle),
            "queued" => Some(JobStatus::Queued),
            "processing" => Some(JobStatus::Processing),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            "retrying" => Some(JobStatus::Retrying),
            _ => None,
        }
    }

    /// `true` while the tenant has a job waiting or running.
    #[must_use]
    pub fn is_in_progress(self) -> bool {
        matches!(
            self,
            JobStatus::Queued | JobStatus::Processing | JobStatus::Retrying
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One tenant's pending or running unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Job {
    pub tenant_id: String,
    pub status: JobStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    pub enqueued_at: DateTime<Utc>,
    /// Earliest time the worker may pick this job up.
    pub ready_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl Job {
    pub(crate) fn new(tenant_id: &str, max_attempts: u32, now: DateTime<Utc>) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            status: JobStatus::Queued,
            attempts: 0,
            max_attempts,
            enqueued_at: now,
            ready_at: now,
            started_at: None,
            completed_at: None,
            failed_at: None,
            last_error: None,
        }
    }

    pub(crate) fn mark_processing(&mut self, now: DateTime<Utc>) {
        self.status = JobStatus::Processing;
        self.started_at = Some(now);
    }

    pub(crate) fn mark_completed(&mut self, now: DateTime<Utc>) {
        self.status = JobStatus::Completed;
        self.completed_at = Some(now);
    }

    pub(crate) fn mark_retrying(&mut self, ready_at: DateTime<Utc>) {
        self.status = JobStatus::Retrying;
        self.ready_at = ready_at;
    }

    pub(crate) fn mark_failed(&mut self, now: DateTime<Utc>) {
        self.status = JobStatus::Failed;
        self.failed_at = Some(now);
    }

    /// Snapshot this job as a persisted status record.
    pub(crate) fn to_record(&self, message: String, now: DateTime<Utc>) -> StatusRecord {
        StatusRecord {
            in_progress: self.status.is_in_progress(),
            status: self.status,
            message,
            queued_at: Some(self.enqueued_at),
            started_at: self.started_at,
            completed_at: self.completed_at,
            failed_at: self.failed_at,
            last_error: self.last_error.clone(),
            result_summary: None,
            updated_at: now,
        }
    }
}

/// Terminal result delivered to everyone waiting on a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed { summary: Option<String> },
    Failed { attempts: u32, error: String },
    /// The queue stopped before the job reached a terminal state.
    Abandoned,
}

impl JobOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Completed { .. })
    }
}
