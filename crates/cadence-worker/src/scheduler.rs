//! Per-tier due check and dispatch.
//!
//! One [`TierScheduler::tick`] call corresponds to one cron firing for one
//! tier. The tick lists the tier's tenants, keeps the ones whose last
//! successful run is at least the tier's minimum interval old, and dispatches
//! them. A tenant's last-run time advances only when its work succeeds.
//!
//! Tenants whose tier is not in the table are picked up by the fallback
//! tier's tick and scheduled on its cadence.

use std::collections::HashMap;
use std::sync::Arc;

use cadence_core::{is_due, Tenant, TierCadence, TierCadenceTable};
use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::error::ListError;
use crate::executor::{run_guarded, WorkExecutor};
use crate::job::JobOutcome;
use crate::queue::WorkQueue;
use crate::tenants::{RunLedger, TenantLister};

/// Where due tenants are sent.
#[derive(Clone)]
pub enum Dispatch {
    /// Enqueue on the work queue and await each job's outcome.
    Queued(WorkQueue),
    /// Call the executor inline, one tenant at a time.
    Direct(Arc<dyn WorkExecutor>),
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    TenantListing(#[from] ListError),
}

/// Counts from one tier tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub tier: String,
    pub listed: usize,
    pub due: usize,
    pub succeeded: usize,
    pub failed: usize,
}

pub struct TierScheduler {
    tiers: Arc<TierCadenceTable>,
    lister: Arc<dyn TenantLister>,
    ledger: Arc<dyn RunLedger>,
    dispatch: Dispatch,
    /// Successful runs observed by this process. Covers ledgers that lag or
    /// listers that do not report `last_run_at` at all.
    last_runs: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl TierScheduler {
    pub fn new(
        tiers: Arc<TierCadenceTable>,
        lister: Arc<dyn TenantLister>,
        ledger: Arc<dyn RunLedger>,
        dispatch: Dispatch,
    ) -> Self {
        Self {
            tiers,
            lister,
            ledger,
            dispatch,
            last_runs: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn tiers(&self) -> &TierCadenceTable {
        &self.tiers
    }

    /// Run one tick for `tier` at the current time.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::TenantListing`] if the tier's tenants cannot
    /// be listed. No work is dispatched in that case.
    pub async fn tick(&self, tier: &str) -> Result<TickReport, SchedulerError> {
        self.tick_at(tier, Utc::now()).await
    }

    /// Run one tick for `tier` as if the clock read `now`.
    ///
    /// # Errors
    ///
    /// See [`TierScheduler::tick`].
    pub async fn tick_at(
        &self,
        tier: &str,
        now: DateTime<Utc>,
    ) -> Result<TickReport, SchedulerError> {
        let cadence = self.resolve_cadence(tier);

        let mut tenants = match self.lister.list_tenants(tier).await {
            Ok(t) => t,
            Err(e) => {
                tracing::error!(tier, error = %e, "scheduler: failed to list tenants");
                return Err(e.into());
            }
        };
        if tier == self.tiers.fallback().key {
            tenants.extend(self.unknown_tier_tenants().await);
        }

        let mut report = TickReport {
            tier: tier.to_string(),
            listed: tenants.len(),
            ..TickReport::default()
        };

        let due = self.due_tenants(&tenants, cadence, now).await;
        report.due = due.len();

        if due.is_empty() {
            tracing::debug!(tier, listed = report.listed, "scheduler: no tenants due");
            return Ok(report);
        }

        tracing::info!(
            tier,
            listed = report.listed,
            due = report.due,
            "scheduler: dispatching due tenants"
        );

        match &self.dispatch {
            Dispatch::Direct(executor) => {
                for tenant_id in &due {
                    match run_guarded(executor.as_ref(), tenant_id).await {
                        Ok(_) => {
                            self.record_success(tenant_id, now).await;
                            report.succeeded += 1;
                        }
                        Err(e) => {
                            tracing::error!(
                                tier,
                                tenant_id = %tenant_id,
                                error = %e,
                                "scheduler: tenant run failed"
                            );
                            report.failed += 1;
                        }
                    }
                }
            }
            Dispatch::Queued(queue) => {
                let mut pending = FuturesUnordered::new();
                for tenant_id in &due {
                    let handle = queue.add_job(tenant_id).await.handle;
                    pending.push(async move { (tenant_id, handle.wait().await) });
                }

                // Record each success as soon as it lands so an overlapping
                // tick never sees a finished tenant as still due.
                while let Some((tenant_id, outcome)) = pending.next().await {
                    match outcome {
                        JobOutcome::Completed { .. } => {
                            self.record_success(tenant_id, now).await;
                            report.succeeded += 1;
                        }
                        JobOutcome::Failed { attempts, error } => {
                            tracing::error!(
                                tier,
                                tenant_id = %tenant_id,
                                attempts,
                                error = %error,
                                "scheduler: tenant job failed"
                            );
                            report.failed += 1;
                        }
                        JobOutcome::Abandoned => {
                            tracing::warn!(
                                tier,
                                tenant_id = %tenant_id,
                                "scheduler: tenant job abandoned before completion"
                            );
                            report.failed += 1;
                        }
                    }
                }
            }
        }

        tracing::info!(
            tier,
            succeeded = report.succeeded,
            failed = report.failed,
            "scheduler: tier tick complete"
        );
        Ok(report)
    }

    /// Tenants whose tier is missing from the table. They ride along with the
    /// fallback tier's tick and share its cadence. A listing failure here is
    /// logged and leaves the fallback tier's own tenants unaffected.
    async fn unknown_tier_tenants(&self) -> Vec<Tenant> {
        let known: Vec<String> = self.tiers.iter().map(|t| t.key.clone()).collect();
        match self.lister.list_tenants_outside(&known).await {
            Ok(orphans) => {
                for tenant in &orphans {
                    tracing::warn!(
                        tenant_id = %tenant.id,
                        tier = %tenant.tier,
                        fallback = %self.tiers.fallback().key,
                        "scheduler: tenant on unknown tier; using fallback cadence"
                    );
                }
                orphans
            }
            Err(e) => {
                tracing::error!(error = %e, "scheduler: failed to list tenants on unknown tiers");
                Vec::new()
            }
        }
    }

    fn resolve_cadence(&self, tier: &str) -> &TierCadence {
        if let Some(cadence) = self.tiers.get(tier) {
            return cadence;
        }
        let fallback = self.tiers.fallback();
        tracing::warn!(
            tier,
            fallback = %fallback.key,
            "scheduler: unknown tier; using fallback cadence"
        );
        fallback
    }

    async fn due_tenants(
        &self,
        tenants: &[Tenant],
        cadence: &TierCadence,
        now: DateTime<Utc>,
    ) -> Vec<String> {
        let last_runs = self.last_runs.lock().await;
        tenants
            .iter()
            .filter(|t| {
                let effective = t.last_run_at.max(last_runs.get(&t.id).copied());
                is_due(effective, cadence.min_interval_hours, now)
            })
            .map(|t| t.id.clone())
            .collect()
    }

    async fn record_success(&self, tenant_id: &str, at: DateTime<Utc>) {
        self.last_runs
            .lock()
            .await
            .entry(tenant_id.to_string())
            .and_modify(|last| *last = (*last).max(at))
            .or_insert(at);

        if let Err(e) = self.ledger.record_success(tenant_id, at).await {
            tracing::warn!(
                tenant_id,
                error = %e,
                "scheduler: failed to persist last run time"
            );
        }
    }
}
