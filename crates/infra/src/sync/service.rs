//! A single sync attempt and the interactive entry points around it.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

use shipsync_core::DomainError;
use shipsync_sales::{SalesOrder, SalesOrderId};
use shipsync_shipping::{
    RequestBuildError, SyncOrder, SyncPolicy, SyncStatus, TenantContext, TrackingNumber, build_order_request,
};

use super::{SyncAttempt, SyncError};
use crate::carrier::{CarrierClient, CarrierError};
use crate::notify::NotificationSink;
use crate::store::{Registered, SalesOrderRepository, StoreError, SyncOrderStore};

/// Why an attempt failed. Always turned into a failed attempt, never returned.
#[derive(Debug, thiserror::Error)]
enum AttemptFailure {
    #[error("sales order {0} not found")]
    MissingOrder(SalesOrderId),
    #[error(transparent)]
    Build(#[from] RequestBuildError),
    #[error(transparent)]
    Carrier(#[from] CarrierError),
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut chain = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        chain.push_str(": ");
        chain.push_str(&cause.to_string());
        source = cause.source();
    }
    chain
}

/// Applies the sync policy to records.
///
/// Shared between the scheduler and the HTTP API; `run_lock` keeps full runs
/// and interactive syncs from overlapping.
pub struct OrderSyncService {
    policy: SyncPolicy,
    carrier_name: String,
    records: Arc<dyn SyncOrderStore>,
    orders: Arc<dyn SalesOrderRepository>,
    carrier: Arc<dyn CarrierClient>,
    run_lock: Mutex<()>,
}

impl OrderSyncService {
    pub fn new(
        policy: SyncPolicy,
        carrier_name: impl Into<String>,
        records: Arc<dyn SyncOrderStore>,
        orders: Arc<dyn SalesOrderRepository>,
        carrier: Arc<dyn CarrierClient>,
    ) -> Self {
        Self {
            policy,
            carrier_name: carrier_name.into(),
            records,
            orders,
            carrier,
            run_lock: Mutex::new(()),
        }
    }

    pub fn policy(&self) -> &SyncPolicy {
        &self.policy
    }

    pub fn carrier_name(&self) -> &str {
        &self.carrier_name
    }

    pub fn records(&self) -> &Arc<dyn SyncOrderStore> {
        &self.records
    }

    pub fn orders(&self) -> &Arc<dyn SalesOrderRepository> {
        &self.orders
    }

    pub(crate) async fn lock_run(&self) -> MutexGuard<'_, ()> {
        self.run_lock.lock().await
    }

    /// Queue an order for sync. Returns the existing record if there is one.
    pub async fn register_order(&self, ctx: &TenantContext, order_id: SalesOrderId) -> Result<Registered, SyncError> {
        let order = self
            .orders
            .get(ctx.tenant_id, order_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("sales order {order_id}")))?;

        if let Some(existing) = self.records.find_by_order(ctx.tenant_id, order_id).await? {
            return Ok(Registered {
                record: existing,
                created: false,
            });
        }

        if !order.is_ready_to_ship() {
            return Err(DomainError::validation(format!(
                "order {} is {}, not ready to ship",
                order.increment_id(),
                order.state().as_str()
            ))
            .into());
        }

        let registered = self.records.register(SyncOrder::pending(ctx.tenant_id, order_id)).await?;
        if registered.created {
            info!(
                tenant_id = %ctx.tenant_id,
                order_id = %order_id,
                sync_order_id = %registered.record.id(),
                "order queued for carrier sync"
            );
        }
        Ok(registered)
    }

    /// Interactive sync of one order, with notifications.
    ///
    /// Returns the attempt and the record as it stands afterwards. With sync
    /// disabled nothing is read and the attempt is `Skipped` with no record.
    pub async fn sync_order(
        &self,
        ctx: &TenantContext,
        order_id: SalesOrderId,
        notifications: Option<&dyn NotificationSink>,
    ) -> Result<(SyncAttempt, Option<SyncOrder>), SyncError> {
        if !self.policy.enabled {
            debug!(tenant_id = %ctx.tenant_id, order_id = %order_id, "order sync disabled; sync skipped");
            return Ok((SyncAttempt::Skipped, None));
        }
        let _guard = self.lock_run().await;

        let mut record = self
            .records
            .find_by_order(ctx.tenant_id, order_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("sync record for order {order_id}")))?;

        let attempt = self.attempt_sync(ctx, &mut record, notifications).await?;
        Ok((attempt, Some(record)))
    }

    /// One sync attempt on `record`.
    ///
    /// The attempt is counted and persisted before the carrier is called.
    /// Request-build and carrier failures end as `Retrying` or `Failed`;
    /// only storage failures and terminal records return `Err`.
    pub async fn attempt_sync(
        &self,
        ctx: &TenantContext,
        record: &mut SyncOrder,
        notifications: Option<&dyn NotificationSink>,
    ) -> Result<SyncAttempt, SyncError> {
        if !self.policy.enabled {
            debug!(sync_order_id = %record.id(), "order sync disabled; attempt skipped");
            return Ok(SyncAttempt::Skipped);
        }
        if record.tenant_id() != ctx.tenant_id {
            return Err(StoreError::TenantIsolation.into());
        }

        let attempt_count = record.begin_attempt()?;
        self.records.save(record).await?;

        let order = self.orders.get(ctx.tenant_id, record.order_id()).await?;

        match self.submit(ctx, record.order_id(), order.as_ref()).await {
            Ok(tracking_number) => {
                // Present when submit succeeds.
                let Some(mut order) = order else {
                    return Err(DomainError::invariant("order disappeared after submission").into());
                };
                self.complete(ctx, record, &mut order, tracking_number, notifications)
                    .await
            }
            Err(failure) => {
                self.fail(ctx, record, order.as_ref(), attempt_count, failure, notifications)
                    .await
            }
        }
    }

    async fn submit(
        &self,
        ctx: &TenantContext,
        order_id: SalesOrderId,
        order: Option<&SalesOrder>,
    ) -> Result<TrackingNumber, AttemptFailure> {
        let order = order.ok_or(AttemptFailure::MissingOrder(order_id))?;
        let request = build_order_request(ctx, order)?;
        let response = self.carrier.send_order(&request).await?;
        Ok(response.tracking_number)
    }

    async fn complete(
        &self,
        ctx: &TenantContext,
        record: &mut SyncOrder,
        order: &mut SalesOrder,
        tracking_number: TrackingNumber,
        notifications: Option<&dyn NotificationSink>,
    ) -> Result<SyncAttempt, SyncError> {
        record.mark_synced(tracking_number.clone(), Utc::now())?;
        order.add_status_history_comment(
            format!("Order synced with {} - {}", self.carrier_name, tracking_number),
            false,
        )?;
        // Record first: if it fails the order carries no "synced" comment.
        self.records.save(record).await?;
        self.orders.save(order).await?;

        info!(
            tenant_id = %ctx.tenant_id,
            order_id = %record.order_id(),
            sync_order_id = %record.id(),
            attempt_count = record.attempt_count(),
            tracking_number = %tracking_number,
            "order synced with carrier"
        );
        if let Some(sink) = notifications {
            sink.success(&format!(
                "Order {} synced with {} - {}",
                order.increment_id(),
                self.carrier_name,
                tracking_number
            ));
        }

        Ok(SyncAttempt::Synced {
            tracking_number: tracking_number.to_string(),
        })
    }

    async fn fail(
        &self,
        ctx: &TenantContext,
        record: &mut SyncOrder,
        order: Option<&SalesOrder>,
        attempt_count: u32,
        failure: AttemptFailure,
        notifications: Option<&dyn NotificationSink>,
    ) -> Result<SyncAttempt, SyncError> {
        let message = failure.to_string();
        let retryable = match &failure {
            AttemptFailure::Carrier(e) => e.is_retryable(),
            _ => false,
        };
        warn!(
            tenant_id = %ctx.tenant_id,
            order_id = %record.order_id(),
            sync_order_id = %record.id(),
            attempt_count,
            retryable,
            error = %error_chain(&failure),
            "carrier sync attempt failed"
        );

        let status = record.record_failure(message.clone(), &self.policy)?;
        self.records.save(record).await?;

        if let Some(sink) = notifications {
            let label = order
                .map(|o| o.increment_id().to_string())
                .unwrap_or_else(|| record.order_id().to_string());
            sink.error(&format!(
                "Order {} was not synced with {} - {}",
                label, self.carrier_name, message
            ));
        }

        if status == SyncStatus::Failed {
            error!(
                tenant_id = %ctx.tenant_id,
                order_id = %record.order_id(),
                sync_order_id = %record.id(),
                attempt_count,
                max_attempts = self.policy.max_attempts,
                "order sync gave up after exceeding max attempts"
            );
            Ok(SyncAttempt::Failed {
                attempt_count,
                error: message,
            })
        } else {
            Ok(SyncAttempt::Retrying {
                attempt_count,
                error: message,
            })
        }
    }
}
