pub mod app_config;
pub mod config;
pub mod due;
pub mod tenant;
pub mod tiers;

use thiserror::Error;

pub use app_config::{AppConfig, DispatchMode, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use due::{elapsed_hours, is_due, is_due_raw, DUE_EPSILON_HOURS};
pub use tenant::Tenant;
pub use tiers::{load_tiers, TierCadence, TierCadenceTable};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read tiers file {path}: {source}")]
    TiersFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse tiers file: {0}")]
    TiersFileParse(#[from] serde_yaml::Error),

    #[error("invalid tier table: {0}")]
    Validation(String),
}
