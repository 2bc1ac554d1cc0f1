//! Database operations for the `tenants` table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `tenants` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TenantRow {
    pub id: String,
    pub tier: String,
    /// Time of the last *successful* scheduled run; `NULL` until the first.
    pub last_run_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<TenantRow> for cadence_core::Tenant {
    fn from(row: TenantRow) -> Self {
        Self {
            id: row.id,
            tier: row.tier,
            last_run_at: row.last_run_at,
        }
    }
}

/// Returns all active tenants on `tier`, ordered by `id`.
///
/// An unknown tier simply yields an empty list.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_active_tenants_by_tier(
    pool: &PgPool,
    tier: &str,
) -> Result<Vec<TenantRow>, DbError> {
    let rows = sqlx::query_as::<_, TenantRow>(
        "SELECT id, tier, last_run_at, is_active, created_at, updated_at \
         FROM tenants \
         WHERE tier = $1 AND is_active = true \
         ORDER BY id",
    )
    .bind(tier)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns all active tenants whose tier is not one of `known_tiers`, ordered
/// by `id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_active_tenants_outside_tiers(
    pool: &PgPool,
    known_tiers: &[String],
) -> Result<Vec<TenantRow>, DbError> {
    let rows = sqlx::query_as::<_, TenantRow>(
        "SELECT id, tier, last_run_at, is_active, created_at, updated_at \
         FROM tenants \
         WHERE tier <> ALL($1) AND is_active = true \
         ORDER BY id",
    )
    .bind(known_tiers)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Fetches a single tenant by id, active or not.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no tenant has this id, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_tenant(pool: &PgPool, tenant_id: &str) -> Result<TenantRow, DbError> {
    sqlx::query_as::<_, TenantRow>(
        "SELECT id, tier, last_run_at, is_active, created_at, updated_at \
         FROM tenants \
         WHERE id = $1",
    )
    .bind(tenant_id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Inserts a tenant or moves an existing one to `tier`, re-activating it.
///
/// `last_run_at` is preserved on update.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_tenant(pool: &PgPool, tenant_id: &str, tier: &str) -> Result<TenantRow, DbError> {
    let row = sqlx::query_as::<_, TenantRow>(
        "INSERT INTO tenants (id, tier) \
         VALUES ($1, $2) \
         ON CONFLICT (id) DO UPDATE \
         SET tier = EXCLUDED.tier, is_active = true, updated_at = NOW() \
         RETURNING id, tier, last_run_at, is_active, created_at, updated_at",
    )
    .bind(tenant_id)
    .bind(tier)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Records a successful run for `tenant_id` at `at`.
///
/// The stored value never moves backwards: an older `at` than the current
/// `last_run_at` leaves the row unchanged.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the tenant does not exist, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn record_successful_run(
    pool: &PgPool,
    tenant_id: &str,
    at: DateTime<Utc>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE tenants \
         SET last_run_at = GREATEST(COALESCE(last_run_at, $2), $2), updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(tenant_id)
    .bind(at)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}
