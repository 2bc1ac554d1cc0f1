mod adapters;
mod api;
mod middleware;
mod scheduler;

use std::sync::Arc;

use cadence_core::{DispatchMode, TierCadenceTable};
use cadence_executor::{ExecutorSettings, HttpWorkExecutor};
use cadence_worker::{Dispatch, QueueSettings, TierScheduler, WorkExecutor, WorkQueue};
use tracing_subscriber::EnvFilter;

use crate::{
    adapters::{PgStatusStore, PgTenantDirectory},
    api::{build_app, default_rate_limit_state, AppState},
    middleware::AuthState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(cadence_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let tiers = Arc::new(match &config.tiers_path {
        Some(path) => cadence_core::load_tiers(path)?,
        None => TierCadenceTable::default(),
    });
    tracing::info!(
        env = %config.env,
        tiers = tiers.len(),
        dispatch = %config.dispatch_mode,
        "server: configuration loaded"
    );

    let pool_config = cadence_db::PoolConfig::from_app_config(&config);
    let pool = cadence_db::connect_pool(&config.database_url, pool_config).await?;
    let applied = cadence_db::run_migrations(&pool).await?;
    if applied > 0 {
        tracing::info!(applied, "server: applied database migrations");
    }

    let interrupted = cadence_db::mark_interrupted_jobs(&pool).await?;
    if interrupted > 0 {
        tracing::warn!(
            interrupted,
            "server: marked jobs left in progress by a previous process as failed"
        );
    }

    let executor: Arc<dyn WorkExecutor> = Arc::new(HttpWorkExecutor::new(
        &ExecutorSettings::from_app_config(&config),
    )?);
    let queue = WorkQueue::new(
        Arc::clone(&executor),
        Arc::new(PgStatusStore::new(pool.clone())),
        QueueSettings::from_app_config(&config),
    );
    let worker = queue.start()?;

    let dispatch = match config.dispatch_mode {
        DispatchMode::Queued => Dispatch::Queued(queue.clone()),
        DispatchMode::Direct => Dispatch::Direct(executor),
    };
    let directory = Arc::new(PgTenantDirectory::new(pool.clone()));
    let tier_scheduler = Arc::new(TierScheduler::new(
        Arc::clone(&tiers),
        directory.clone(),
        directory,
        dispatch,
    ));
    let mut cron = scheduler::build_scheduler(tier_scheduler).await?;

    let auth = AuthState::from_config(
        &config.api_keys,
        matches!(config.env, cadence_core::Environment::Development),
    )?;
    let app = build_app(
        AppState { pool, queue, tiers },
        auth,
        default_rate_limit_state(),
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "server: listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Err(e) = cron.shutdown().await {
        tracing::warn!(error = %e, "server: scheduler shutdown failed");
    }
    worker.stop().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
