mod tenants;
mod tiers;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "cadence-cli")]
#[command(about = "Cadence tier scheduler command line interface")]
struct Cli {
    /// Postgres connection string (only needed for database commands)
    #[arg(long, env = "DATABASE_URL", global = true, hide_env_values = true)]
    database_url: Option<String>,

    /// YAML tier table; the built-in table is used when unset
    #[arg(long, env = "CADENCE_TIERS_PATH", global = true)]
    tiers: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the tier cadence table
    Tiers,
    /// Check whether a tenant on a tier would be due right now
    Due {
        /// Tier key (e.g., growth)
        #[arg(long)]
        tier: String,
        /// Last successful run as RFC 3339; omit for "never run"
        #[arg(long)]
        last_run: Option<String>,
    },
    /// Tenant administration
    Tenant {
        #[command(subcommand)]
        command: TenantCommands,
    },
    /// Show the last persisted job status for a tenant
    Status {
        /// Tenant id
        tenant: String,
    },
    /// Apply pending database migrations
    Migrate,
}

#[derive(Debug, Subcommand)]
enum TenantCommands {
    /// Add a tenant, or move an existing one to another tier
    Add {
        /// Tenant id
        id: String,
        /// Tier key
        tier: String,
    },
    /// List active tenants on a tier
    List {
        /// Tier key
        tier: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("warn"))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("cadence-cli: no command given; run with --help for usage");
        return Ok(());
    };

    let table = tiers::load_table(cli.tiers.as_deref())?;
    tracing::debug!(tiers = table.len(), "cli: tier table loaded");

    match command {
        Commands::Tiers => tiers::run_tiers(&table),
        Commands::Due { tier, last_run } => {
            tiers::run_due(&table, &tier, last_run.as_deref(), chrono::Utc::now());
        }
        Commands::Tenant { command } => {
            let pool = connect(cli.database_url.as_deref()).await?;
            match command {
                TenantCommands::Add { id, tier } => {
                    tenants::run_tenant_add(&pool, &table, &id, &tier).await?;
                }
                TenantCommands::List { tier } => tenants::run_tenant_list(&pool, &tier).await?,
            }
        }
        Commands::Status { tenant } => {
            let pool = connect(cli.database_url.as_deref()).await?;
            tenants::run_status(&pool, &tenant).await?;
        }
        Commands::Migrate => {
            let pool = connect(cli.database_url.as_deref()).await?;
            let applied = cadence_db::run_migrations(&pool).await?;
            println!("applied {applied} migration(s)");
        }
    }

    Ok(())
}

async fn connect(database_url: Option<&str>) -> anyhow::Result<sqlx::PgPool> {
    let url = database_url
        .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is required for this command"))?;
    let pool = cadence_db::connect_pool(url, cadence_db::PoolConfig::default()).await?;
    Ok(pool)
}

#[cfg(test)]
mod tests;
