//! Postgres-backed implementations of the worker's collaborator traits.

use cadence_core::Tenant;
use cadence_db::JobStatusRow;
use cadence_worker::{
    JobStatus, ListError, RunLedger, StatusRecord, StatusStore, StoreError, TenantLister,
};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use sqlx::PgPool;

/// Tenant listing and last-run bookkeeping over the `tenants` table.
#[derive(Clone)]
pub struct PgTenantDirectory {
    pool: PgPool,
}

impl PgTenantDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl TenantLister for PgTenantDirectory {
    fn list_tenants<'a>(&'a self, tier: &'a str) -> BoxFuture<'a, Result<Vec<Tenant>, ListError>> {
        Box::pin(async move {
            let rows = cadence_db::list_active_tenants_by_tier(&self.pool, tier)
                .await
                .map_err(|e| ListError::new(tier, e.to_string()))?;
            Ok(rows.into_iter().map(Tenant::from).collect())
        })
    }

    fn list_tenants_outside<'a>(
        &'a self,
        known: &'a [String],
    ) -> BoxFuture<'a, Result<Vec<Tenant>, ListError>> {
        Box::pin(async move {
            let rows = cadence_db::list_active_tenants_outside_tiers(&self.pool, known)
                .await
                .map_err(|e| ListError::new("unknown tiers", e.to_string()))?;
            Ok(rows.into_iter().map(Tenant::from).collect())
        })
    }
}

impl RunLedger for PgTenantDirectory {
    fn record_success<'a>(
        &'a self,
        tenant_id: &'a str,
        at: DateTime<Utc>,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            cadence_db::record_successful_run(&self.pool, tenant_id, at)
                .await
                .map_err(|e| StoreError(e.to_string()))
        })
    }
}

/// [`StatusStore`] over the `tenant_job_status` table.
#[derive(Clone)]
pub struct PgStatusStore {
    pool: PgPool,
}

impl PgStatusStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl StatusStore for PgStatusStore {
    fn save<'a>(
        &'a self,
        tenant_id: &'a str,
        record: &'a StatusRecord,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            let row = to_row(tenant_id, record);
            cadence_db::upsert_job_status(&self.pool, &row)
                .await
                .map_err(|e| StoreError(e.to_string()))
        })
    }

    fn load<'a>(
        &'a self,
        tenant_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<StatusRecord>, StoreError>> {
        Box::pin(async move {
            let row = cadence_db::get_job_status(&self.pool, tenant_id)
                .await
                .map_err(|e| StoreError(e.to_string()))?;
            row.map(from_row).transpose()
        })
    }
}

pub(crate) fn to_row(tenant_id: &str, record: &StatusRecord) -> JobStatusRow {
    JobStatusRow {
        tenant_id: tenant_id.to_string(),
        in_progress: record.in_progress,
        status: record.status.as_str().to_string(),
        message: record.message.clone(),
        queued_at: record.queued_at,
        started_at: record.started_at,
        completed_at: record.completed_at,
        failed_at: record.failed_at,
        last_error: record.last_error.clone(),
        result_summary: record.result_summary.clone(),
        updated_at: record.updated_at,
    }
}

pub(crate) fn from_row(row: JobStatusRow) -> Result<StatusRecord, StoreError> {
    let status = JobStatus::parse(&row.status).ok_or_else(|| {
        StoreError(format!(
            "unknown job status '{}' for tenant {}",
            row.status, row.tenant_id
        ))
    })?;

    Ok(StatusRecord {
        in_progress: row.in_progress,
        status,
        message: row.message,
        queued_at: row.queued_at,
        started_at: row.started_at,
        completed_at: row.completed_at,
        failed_at: row.failed_at,
        last_error: row.last_error,
        result_summary: row.result_summary,
        updated_at: row.updated_at,
    })
}
