//! Persistence for sync records and the sales orders they point at.

mod in_memory;
mod postgres;

use std::sync::Arc;

use async_trait::async_trait;

use shipsync_core::{DomainError, TenantId};
use shipsync_sales::{SalesOrder, SalesOrderId};
use shipsync_shipping::{SyncOrder, SyncOrderId, SyncStatus};

pub use in_memory::InMemoryShippingStore;
pub use postgres::PostgresShippingStore;
pub(crate) use postgres::map_sqlx_error;

/// Store error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("tenant isolation violation")]
    TenantIsolation,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("failed to decode stored row: {0}")]
    Decode(String),
}

impl From<DomainError> for StoreError {
    fn from(err: DomainError) -> Self {
        StoreError::Decode(err.to_string())
    }
}

/// Outcome of registering an order for sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registered {
    pub record: SyncOrder,
    /// `false` when the order already had a record.
    pub created: bool,
}

/// Sync record store.
///
/// Every method is scoped by tenant; one record per `(tenant_id, order_id)`.
#[async_trait]
pub trait SyncOrderStore: Send + Sync {
    /// Insert `record` unless its order already has one; the existing record wins.
    async fn register(&self, record: SyncOrder) -> Result<Registered, StoreError>;

    async fn get(&self, tenant_id: TenantId, id: SyncOrderId) -> Result<Option<SyncOrder>, StoreError>;

    async fn find_by_order(
        &self,
        tenant_id: TenantId,
        order_id: SalesOrderId,
    ) -> Result<Option<SyncOrder>, StoreError>;

    /// Upsert by id.
    async fn save(&self, record: &SyncOrder) -> Result<(), StoreError>;

    /// Pending records under the attempt limit whose order is processing, oldest first.
    async fn find_eligible(&self, tenant_id: TenantId, max_attempts: u32) -> Result<Vec<SyncOrder>, StoreError>;

    /// Audit listing, oldest first.
    async fn list(
        &self,
        tenant_id: TenantId,
        status: Option<SyncStatus>,
        limit: usize,
    ) -> Result<Vec<SyncOrder>, StoreError>;
}

/// Sales order access.
#[async_trait]
pub trait SalesOrderRepository: Send + Sync {
    async fn get(&self, tenant_id: TenantId, id: SalesOrderId) -> Result<Option<SalesOrder>, StoreError>;

    /// Upsert by id.
    async fn save(&self, order: &SalesOrder) -> Result<(), StoreError>;
}

#[async_trait]
impl<S> SyncOrderStore for Arc<S>
where
    S: SyncOrderStore + ?Sized,
{
    async fn register(&self, record: SyncOrder) -> Result<Registered, StoreError> {
        (**self).register(record).await
    }

    async fn get(&self, tenant_id: TenantId, id: SyncOrderId) -> Result<Option<SyncOrder>, StoreError> {
        (**self).get(tenant_id, id).await
    }

    async fn find_by_order(
        &self,
        tenant_id: TenantId,
        order_id: SalesOrderId,
    ) -> Result<Option<SyncOrder>, StoreError> {
        (**self).find_by_order(tenant_id, order_id).await
    }

    async fn save(&self, record: &SyncOrder) -> Result<(), StoreError> {
        (**self).save(record).await
    }

    async fn find_eligible(&self, tenant_id: TenantId, max_attempts: u32) -> Result<Vec<SyncOrder>, StoreError> {
        (**self).find_eligible(tenant_id, max_attempts).await
    }

    async fn list(
        &self,
        tenant_id: TenantId,
        status: Option<SyncStatus>,
        limit: usize,
    ) -> Result<Vec<SyncOrder>, StoreError> {
        (**self).list(tenant_id, status, limit).await
    }
}

#[async_trait]
impl<S> SalesOrderRepository for Arc<S>
where
    S: SalesOrderRepository + ?Sized,
{
    async fn get(&self, tenant_id: TenantId, id: SalesOrderId) -> Result<Option<SalesOrder>, StoreError> {
        (**self).get(tenant_id, id).await
    }

    async fn save(&self, order: &SalesOrder) -> Result<(), StoreError> {
        (**self).save(order).await
    }
}
