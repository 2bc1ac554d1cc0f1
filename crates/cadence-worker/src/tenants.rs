use std::collections::{BTreeMap, HashSet};

use cadence_core::Tenant;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use tokio::sync::Mutex;

use crate::error::{ListError, StoreError};

/// Returns the tenants currently on a tier.
///
/// An empty tier is `Ok(vec![])`; errors are reserved for genuine fetch
/// failures.
pub trait TenantLister: Send + Sync {
    fn list_tenants<'a>(&'a self, tier: &'a str) -> BoxFuture<'a, Result<Vec<Tenant>, ListError>>;

    /// Returns the tenants whose tier is none of `known`.
    fn list_tenants_outside<'a>(
        &'a self,
        known: &'a [String],
    ) -> BoxFuture<'a, Result<Vec<Tenant>, ListError>>;
}

/// Persists the time of each tenant's last successful run.
pub trait RunLedger: Send + Sync {
    fn record_success<'a>(
        &'a self,
        tenant_id: &'a str,
        at: DateTime<Utc>,
    ) -> BoxFuture<'a, Result<(), StoreError>>;
}

/// Process-local tenant directory implementing both [`TenantLister`] and
/// [`RunLedger`]. Tiers can be marked unavailable to simulate listing outages.
#[derive(Debug, Default)]
pub struct InMemoryTenants {
    tenants: Mutex<BTreeMap<String, Tenant>>,
    unavailable_tiers: Mutex<HashSet<String>>,
}

impl InMemoryTenants {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, tenant: Tenant) {
        self.tenants.lock().await.insert(tenant.id.clone(), tenant);
    }

    pub async fn get(&self, tenant_id: &str) -> Option<Tenant> {
        self.tenants.lock().await.get(tenant_id).cloned()
    }

    /// Make listing for `tier` fail (or succeed again) until toggled back.
    pub async fn set_tier_unavailable(&self, tier: &str, unavailable: bool) {
        let mut tiers = self.unavailable_tiers.lock().await;
        if unavailable {
            tiers.insert(tier.to_string());
        } else {
            tiers.remove(tier);
        }
    }
}

impl TenantLister for InMemoryTenants {
    fn list_tenants<'a>(&'a self, tier: &'a str) -> BoxFuture<'a, Result<Vec<Tenant>, ListError>> {
        Box::pin(async move {
            if self.unavailable_tiers.lock().await.contains(tier) {
                return Err(ListError::new(tier, "tenant directory unavailable"));
            }
            Ok(self
                .tenants
                .lock()
                .await
                .values()
                .filter(|t| t.tier == tier)
                .cloned()
                .collect())
        })
    }

    fn list_tenants_outside<'a>(
        &'a self,
        known: &'a [String],
    ) -> BoxFuture<'a, Result<Vec<Tenant>, ListError>> {
        Box::pin(async move {
            Ok(self
                .tenants
                .lock()
                .await
                .values()
                .filter(|t| !known.contains(&t.tier))
                .cloned()
                .collect())
        })
    }
}

impl RunLedger for InMemoryTenants {
    fn record_success<'a>(
        &'a self,
        tenant_id: &'a str,
        at: DateTime<Utc>,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            match self.tenants.lock().await.get_mut(tenant_id) {
                Some(tenant) => {
                    tenant.last_run_at = tenant.last_run_at.max(Some(at));
                    Ok(())
                }
                None => Err(StoreError(format!("unknown tenant {tenant_id}"))),
            }
        })
    }
}
