use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use shipsync_core::TenantId;
use shipsync_sales::{SalesOrder, SalesOrderId};
use shipsync_shipping::{SyncOrder, SyncOrderId, SyncPolicy, SyncStatus};

use super::{Registered, SalesOrderRepository, StoreError, SyncOrderStore};

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Storage("lock poisoned".to_string())
}

/// In-memory sync records and sales orders for tests/dev.
///
/// Both live in one struct so the eligibility query can see order state,
/// the same way the Postgres query joins the two tables.
#[derive(Debug, Default)]
pub struct InMemoryShippingStore {
    orders: RwLock<HashMap<SalesOrderId, SalesOrder>>,
    records: RwLock<HashMap<SyncOrderId, SyncOrder>>,
}

impl InMemoryShippingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl SalesOrderRepository for InMemoryShippingStore {
    async fn get(&self, tenant_id: TenantId, id: SalesOrderId) -> Result<Option<SalesOrder>, StoreError> {
        let orders = self.orders.read().map_err(poisoned)?;
        // Another tenant's order is invisible, same as the Postgres query.
        Ok(orders.get(&id).filter(|o| o.tenant_id() == tenant_id).cloned())
    }

    async fn save(&self, order: &SalesOrder) -> Result<(), StoreError> {
        let mut orders = self.orders.write().map_err(poisoned)?;
        if let Some(existing) = orders.get(&order.id()) {
            if existing.tenant_id() != order.tenant_id() {
                return Err(StoreError::TenantIsolation);
            }
        }
        orders.insert(order.id(), order.clone());
        Ok(())
    }
}

#[async_trait]
impl SyncOrderStore for InMemoryShippingStore {
    async fn register(&self, record: SyncOrder) -> Result<Registered, StoreError> {
        let mut records = self.records.write().map_err(poisoned)?;
        let existing = records
            .values()
            .find(|r| r.tenant_id() == record.tenant_id() && r.order_id() == record.order_id());
        if let Some(existing) = existing {
            return Ok(Registered {
                record: existing.clone(),
                created: false,
            });
        }
        if records.contains_key(&record.id()) {
            return Err(StoreError::Conflict(format!("sync record {} already exists", record.id())));
        }
        records.insert(record.id(), record.clone());
        Ok(Registered { record, created: true })
    }

    async fn get(&self, tenant_id: TenantId, id: SyncOrderId) -> Result<Option<SyncOrder>, StoreError> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records.get(&id).filter(|r| r.tenant_id() == tenant_id).cloned())
    }

    async fn find_by_order(
        &self,
        tenant_id: TenantId,
        order_id: SalesOrderId,
    ) -> Result<Option<SyncOrder>, StoreError> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records
            .values()
            .find(|r| r.tenant_id() == tenant_id && r.order_id() == order_id)
            .cloned())
    }

    async fn save(&self, record: &SyncOrder) -> Result<(), StoreError> {
        let mut records = self.records.write().map_err(poisoned)?;
        if let Some(existing) = records.get(&record.id()) {
            if existing.tenant_id() != record.tenant_id() {
                return Err(StoreError::TenantIsolation);
            }
        } else if records
            .values()
            .any(|r| r.tenant_id() == record.tenant_id() && r.order_id() == record.order_id())
        {
            return Err(StoreError::Conflict(format!(
                "order {} already has a sync record",
                record.order_id()
            )));
        }
        records.insert(record.id(), record.clone());
        Ok(())
    }

    async fn find_eligible(&self, tenant_id: TenantId, max_attempts: u32) -> Result<Vec<SyncOrder>, StoreError> {
        let policy = SyncPolicy::default().with_max_attempts(max_attempts);
        let orders = self.orders.read().map_err(poisoned)?;
        let records = self.records.read().map_err(poisoned)?;

        let mut eligible: Vec<SyncOrder> = records
            .values()
            .filter(|r| {
                orders
                    .get(&r.order_id())
                    .filter(|o| o.tenant_id() == tenant_id)
                    .is_some_and(|o| policy.is_eligible(r, tenant_id, o.state()))
            })
            .cloned()
            .collect();

        eligible.sort_by_key(|r| (r.created_at(), r.id()));
        Ok(eligible)
    }

    async fn list(
        &self,
        tenant_id: TenantId,
        status: Option<SyncStatus>,
        limit: usize,
    ) -> Result<Vec<SyncOrder>, StoreError> {
        let records = self.records.read().map_err(poisoned)?;
        let mut result: Vec<SyncOrder> = records
            .values()
            .filter(|r| r.tenant_id() == tenant_id && status.is_none_or(|s| r.status() == s))
            .cloned()
            .collect();

        result.sort_by_key(|r| (r.created_at(), r.id()));
        result.truncate(limit);
        Ok(result)
    }
}
