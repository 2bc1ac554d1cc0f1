//! Database operations for `tenant_job_status`, the durable mirror of the
//! work queue's per-tenant state.
//!
//! `status` is stored as text and constrained by a CHECK; callers map it to
//! their own enum.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// `last_error` written by [`mark_interrupted_jobs`].
pub const INTERRUPTED_ERROR: &str = "interrupted by process restart";

/// A row from the `tenant_job_status` table.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct JobStatusRow {
    pub tenant_id: String,
    pub in_progress: bool,
    pub status: String,
    pub message: String,
    pub queued_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub result_summary: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Writes the full status row for a tenant, replacing any previous one.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails, including when the tenant
/// does not exist or `status` violates the CHECK constraint.
pub async fn upsert_job_status(pool: &PgPool, row: &JobStatusRow) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO tenant_job_status \
             (tenant_id, in_progress, status, message, queued_at, started_at, \
              completed_at, failed_at, last_error, result_summary, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
         ON CONFLICT (tenant_id) DO UPDATE SET \
             in_progress = EXCLUDED.in_progress, \
             status = EXCLUDED.status, \
             message = EXCLUDED.message, \
             queued_at = EXCLUDED.queued_at, \
             started_at = EXCLUDED.started_at, \
             completed_at = EXCLUDED.completed_at, \
             failed_at = EXCLUDED.failed_at, \
             last_error = EXCLUDED.last_error, \
             result_summary = EXCLUDED.result_summary, \
             updated_at = EXCLUDED.updated_at",
    )
    .bind(&row.tenant_id)
    .bind(row.in_progress)
    .bind(&row.status)
    .bind(&row.message)
    .bind(row.queued_at)
    .bind(row.started_at)
    .bind(row.completed_at)
    .bind(row.failed_at)
    .bind(&row.last_error)
    .bind(&row.result_summary)
    .bind(row.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Fetches the status row for a tenant, if one was ever written.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_job_status(pool: &PgPool, tenant_id: &str) -> Result<Option<JobStatusRow>, DbError> {
    let row = sqlx::query_as::<_, JobStatusRow>(
        "SELECT tenant_id, in_progress, status, message, queued_at, started_at, \
                completed_at, failed_at, last_error, result_summary, updated_at \
         FROM tenant_job_status \
         WHERE tenant_id = $1",
    )
    .bind(tenant_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Returns every row still flagged `in_progress`, oldest update first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_in_progress_job_statuses(pool: &PgPool) -> Result<Vec<JobStatusRow>, DbError> {
    let rows = sqlx::query_as::<_, JobStatusRow>(
        "SELECT tenant_id, in_progress, status, message, queued_at, started_at, \
                completed_at, failed_at, last_error, result_summary, updated_at \
         FROM tenant_job_status \
         WHERE in_progress = true \
         ORDER BY updated_at, tenant_id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Marks every `in_progress` row as `failed`.
///
/// Called once at startup, before the queue worker runs: the in-memory queue
/// does not survive a restart, so any job it held is gone. Returns the number
/// of rows rewritten.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn mark_interrupted_jobs(pool: &PgPool) -> Result<u64, DbError> {
    let result = sqlx::query(
        "UPDATE tenant_job_status \
         SET in_progress = false, \
             status = 'failed', \
             message = 'Failed: ' || $1, \
             failed_at = NOW(), \
             last_error = $1, \
             updated_at = NOW() \
         WHERE in_progress = true",
    )
    .bind(INTERRUPTED_ERROR)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
