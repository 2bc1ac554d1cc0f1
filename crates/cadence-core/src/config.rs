use crate::app_config::{AppConfig, DispatchMode, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let database_url = require("DATABASE_URL")?;
    let work_url = require("CADENCE_WORK_URL")?;

    let env = parse_environment(&or_default("CADENCE_ENV", "development"))?;

    let bind_addr = parse("CADENCE_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("CADENCE_LOG_LEVEL", "info");
    let tiers_path = lookup("CADENCE_TIERS_PATH")
        .ok()
        .filter(|p| !p.trim().is_empty())
        .map(PathBuf::from);
    let api_keys = parse_api_keys(&or_default("CADENCE_API_KEYS", ""));

    let db_max_connections = parse_u32("CADENCE_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("CADENCE_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("CADENCE_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let dispatch_mode = parse_dispatch_mode(&or_default("CADENCE_DISPATCH_MODE", "queued"))?;
    let queue_max_attempts = parse_u32("CADENCE_MAX_ATTEMPTS", "2")?;
    if queue_max_attempts == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "CADENCE_MAX_ATTEMPTS".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    let queue_retry_backoff_base_secs = parse_u64("CADENCE_RETRY_BACKOFF_BASE_SECS", "5")?;
    let queue_job_timeout_secs = parse_u64("CADENCE_JOB_TIMEOUT_SECS", "900")?;
    let queue_avg_job_secs = parse_u64("CADENCE_AVG_JOB_SECS", "60")?;

    let work_timeout_secs = parse_u64("CADENCE_WORK_TIMEOUT_SECS", "120")?;
    let work_max_retries = parse_u32("CADENCE_WORK_MAX_RETRIES", "2")?;
    let work_backoff_base_ms = parse_u64("CADENCE_WORK_BACKOFF_BASE_MS", "1000")?;
    let user_agent = or_default("CADENCE_USER_AGENT", "cadence/0.1 (feed-scheduler)");

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        tiers_path,
        api_keys,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        dispatch_mode,
        queue_max_attempts,
        queue_retry_backoff_base_secs,
        queue_job_timeout_secs,
        queue_avg_job_secs,
        work_url,
        work_timeout_secs,
        work_max_retries,
        work_backoff_base_ms,
        user_agent,
    })
}

/// Parse a string into an `Environment` variant.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidEnvVar`] for anything other than
/// `development`, `test`, or `production`.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "CADENCE_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

fn parse_dispatch_mode(s: &str) -> Result<DispatchMode, ConfigError> {
    match s.trim().to_ascii_lowercase().as_str() {
        "queued" => Ok(DispatchMode::Queued),
        "direct" => Ok(DispatchMode::Direct),
        other => Err(ConfigError::InvalidEnvVar {
            var: "CADENCE_DISPATCH_MODE".to_string(),
            reason: format!("expected 'queued' or 'direct', got '{other}'"),
        }),
    }
}

fn parse_api_keys(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
