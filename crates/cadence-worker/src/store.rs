use std::collections::HashMap;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::job::JobStatus;

/// Last known job state for a tenant, as persisted for the status surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub in_progress: bool,
    pub status: JobStatus,
    pub message: String,
    pub queued_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub result_summary: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Durable per-tenant status written by the queue and read by status queries.
pub trait StatusStore: Send + Sync {
    fn save<'a>(
        &'a self,
        tenant_id: &'a str,
        record: &'a StatusRecord,
    ) -> BoxFuture<'a, Result<(), StoreError>>;

    fn load<'a>(
        &'a self,
        tenant_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<StatusRecord>, StoreError>>;
}

/// Process-local [`StatusStore`]; records do not survive a restart.
#[derive(Debug, Default)]
pub struct MemoryStatusStore {
    records: Mutex<HashMap<String, StatusRecord>>,
}

impl MemoryStatusStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every record currently held, keyed by tenant.
    pub async fn records(&self) -> HashMap<String, StatusRecord> {
        self.records.lock().await.clone()
    }
}

impl StatusStore for MemoryStatusStore {
    fn save<'a>(
        &'a self,
        tenant_id: &'a str,
        record: &'a StatusRecord,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            self.records
                .lock()
                .await
                .insert(tenant_id.to_string(), record.clone());
            Ok(())
        })
    }

    fn load<'a>(
        &'a self,
        tenant_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<StatusRecord>, StoreError>> {
        Box::pin(async move { Ok(self.records.lock().await.get(tenant_id).cloned()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(status: JobStatus) -> StatusRecord {
        StatusRecord {
            in_progress: status.is_in_progress(),
            status,
            message: status.to_string(),
            queued_at: None,
            started_at: None,
            completed_at: None,
            failed_at: None,
            last_error: None,
            result_summary: None,
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn memory_store_overwrites_previous_record() {
        let store = MemoryStatusStore::new();
        store.save("shop-a", &record(JobStatus::Queued)).await.unwrap();
        store
            .save("shop-a", &record(JobStatus::Completed))
            .await
            .unwrap();

        let loaded = store.load("shop-a").await.unwrap().expect("record");
        assert_eq!(loaded.status, JobStatus::Completed);
        assert!(store.load("shop-b").await.unwrap().is_none());
    }
}
