use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{Instrument, debug, error, info};

use super::{OrderSyncService, SyncAttempt, SyncError};
use crate::tenants::{TenantDirectory, TenantScope};

/// Counts from one `run_all`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub tenants: usize,
    pub attempted: usize,
    pub synced: usize,
    pub retrying: usize,
    pub failed: usize,
    /// Storage failures (a record or a tenant's query); the run carried on.
    pub errors: usize,
}

/// Syncs every eligible record of every tenant, one at a time.
pub struct SyncRunner {
    service: Arc<OrderSyncService>,
    tenants: Arc<dyn TenantDirectory>,
}

impl SyncRunner {
    pub fn new(service: Arc<OrderSyncService>, tenants: Arc<dyn TenantDirectory>) -> Self {
        Self { service, tenants }
    }

    pub async fn run_all(&self) -> Result<RunSummary, SyncError> {
        if !self.service.policy().enabled {
            debug!("order sync disabled; run skipped");
            return Ok(RunSummary::default());
        }

        let _guard = self.service.lock_run().await;
        let started = Instant::now();
        let tenants = self.tenants.list().await?;
        let mut summary = RunSummary::default();

        for ctx in tenants {
            summary.tenants += 1;
            let scope = self.tenants.enter(&ctx);
            let span = scope.span().clone();
            self.run_tenant(&scope, &mut summary).instrument(span).await;
        }

        info!(
            tenants = summary.tenants,
            attempted = summary.attempted,
            synced = summary.synced,
            retrying = summary.retrying,
            failed = summary.failed,
            errors = summary.errors,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "order sync run finished"
        );
        Ok(summary)
    }

    async fn run_tenant(&self, scope: &TenantScope, summary: &mut RunSummary) {
        let ctx = scope.context();
        let max_attempts = self.service.policy().max_attempts;

        let records = match self.service.records().find_eligible(ctx.tenant_id, max_attempts).await {
            Ok(records) => records,
            Err(e) => {
                error!(tenant_id = %ctx.tenant_id, error = %e, "failed to load eligible sync records");
                summary.errors += 1;
                return;
            }
        };
        debug!(tenant_id = %ctx.tenant_id, eligible = records.len(), "eligible sync records loaded");

        for mut record in records {
            match self.service.attempt_sync(ctx, &mut record, None).await {
                Ok(SyncAttempt::Skipped) => {}
                Ok(SyncAttempt::Synced { .. }) => {
                    summary.attempted += 1;
                    summary.synced += 1;
                }
                Ok(SyncAttempt::Retrying { .. }) => {
                    summary.attempted += 1;
                    summary.retrying += 1;
                }
                Ok(SyncAttempt::Failed { .. }) => {
                    summary.attempted += 1;
                    summary.failed += 1;
                }
                Err(e) => {
                    error!(
                        tenant_id = %ctx.tenant_id,
                        sync_order_id = %record.id(),
                        error = %e,
                        "sync attempt could not be persisted"
                    );
                    summary.attempted += 1;
                    summary.errors += 1;
                }
            }
        }
    }
}
