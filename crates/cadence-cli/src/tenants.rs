//! Tenant administration and status lookups against Postgres.

use cadence_core::TierCadenceTable;

fn fmt_time(at: Option<chrono::DateTime<chrono::Utc>>) -> String {
    at.map_or_else(
        || "\u{2014}".to_string(),
        |t| t.format("%Y-%m-%d %H:%M").to_string(),
    )
}

/// Add or re-tier a tenant. The tier must exist in the cadence table.
///
/// # Errors
///
/// Returns an error if the tier is unknown or the upsert fails.
pub(crate) async fn run_tenant_add(
    pool: &sqlx::PgPool,
    table: &TierCadenceTable,
    tenant_id: &str,
    tier: &str,
) -> anyhow::Result<()> {
    if table.get(tier).is_none() {
        let known: Vec<&str> = table.iter().map(|t| t.key.as_str()).collect();
        anyhow::bail!("unknown tier '{tier}'; known tiers: {}", known.join(", "));
    }

    let row = cadence_db::upsert_tenant(pool, tenant_id, tier).await?;
    println!(
        "tenant {} on tier {} (last run {})",
        row.id,
        row.tier,
        fmt_time(row.last_run_at)
    );
    Ok(())
}

/// List active tenants on a tier.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub(crate) async fn run_tenant_list(pool: &sqlx::PgPool, tier: &str) -> anyhow::Result<()> {
    let tenants = cadence_db::list_active_tenants_by_tier(pool, tier).await?;

    if tenants.is_empty() {
        println!("no active tenants on tier '{tier}'");
        return Ok(());
    }

    println!("{:<32}LAST RUN", "TENANT");
    for tenant in &tenants {
        println!("{:<32}{}", tenant.id, fmt_time(tenant.last_run_at));
    }
    Ok(())
}

/// Print the last persisted job status for a tenant.
///
/// Only the durable record is visible here; live queue positions belong to the
/// server process.
///
/// # Errors
///
/// Returns an error if the tenant does not exist or a query fails.
pub(crate) async fn run_status(pool: &sqlx::PgPool, tenant_id: &str) -> anyhow::Result<()> {
    let tenant = match cadence_db::get_tenant(pool, tenant_id).await {
        Ok(t) => t,
        Err(cadence_db::DbError::NotFound) => anyhow::bail!("tenant '{tenant_id}' not found"),
        Err(e) => return Err(e.into()),
    };

    println!("tenant:    {} ({})", tenant.id, tenant.tier);
    println!("last run:  {}", fmt_time(tenant.last_run_at));

    match cadence_db::get_job_status(pool, tenant_id).await? {
        None => println!("status:    idle"),
        Some(row) => {
            println!("status:    {}", row.status);
            println!("message:   {}", row.message);
            println!("updated:   {}", fmt_time(Some(row.updated_at)));
            if let Some(err) = row.last_error {
                println!("error:     {err}");
            }
            if let Some(summary) = row.result_summary {
                println!("summary:   {summary}");
            }
        }
    }
    Ok(())
}
