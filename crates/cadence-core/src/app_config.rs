use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// How the tier scheduler hands due tenants to the work executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Enqueue on the background work queue and await each job's outcome.
    Queued,
    /// Call the executor inline, one tenant at a time, inside the tick.
    Direct,
}

impl std::fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchMode::Queued => write!(f, "queued"),
            DispatchMode::Direct => write!(f, "direct"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub tiers_path: Option<PathBuf>,
    pub api_keys: Vec<String>,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub dispatch_mode: DispatchMode,
    pub queue_max_attempts: u32,
    pub queue_retry_backoff_base_secs: u64,
    pub queue_job_timeout_secs: u64,
    pub queue_avg_job_secs: u64,
    pub work_url: String,
    pub work_timeout_secs: u64,
    pub work_max_retries: u32,
    pub work_backoff_base_ms: u64,
    pub user_agent: String,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("tiers_path", &self.tiers_path)
            .field("database_url", &"[redacted]")
            .field("api_keys", &format_args!("[{} redacted]", self.api_keys.len()))
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("dispatch_mode", &self.dispatch_mode)
            .field("queue_max_attempts", &self.queue_max_attempts)
            .field(
                "queue_retry_backoff_base_secs",
                &self.queue_retry_backoff_base_secs,
            )
            .field("queue_job_timeout_secs", &self.queue_job_timeout_secs)
            .field("queue_avg_job_secs", &self.queue_avg_job_secs)
            .field("work_url", &self.work_url)
            .field("work_timeout_secs", &self.work_timeout_secs)
            .field("work_max_retries", &self.work_max_retries)
            .field("work_backoff_base_ms", &self.work_backoff_base_ms)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}
