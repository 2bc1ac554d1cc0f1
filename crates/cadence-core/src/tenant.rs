use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One customer account, scheduled independently of all others.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: String,
    pub tier: String,
    /// Completion time of the last successful run; `None` if it never ran.
    pub last_run_at: Option<DateTime<Utc>>,
}

impl Tenant {
    #[must_use]
    pub fn new(id: impl Into<String>, tier: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tier: tier.into(),
            last_run_at: None,
        }
    }

    #[must_use]
    pub fn with_last_run_at(mut self, last_run_at: DateTime<Utc>) -> Self {
        self.last_run_at = Some(last_run_at);
        self
    }
}
