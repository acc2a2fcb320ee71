//! Postgres-backed shipping store.
//!
//! Sync records live in `sync_orders`, orders in `sales_orders` (order body as
//! JSONB with `state` copied into an indexed column so the eligibility query
//! can join on it). Every query carries `tenant_id` in its WHERE clause.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (check violation) | `23514` | `Storage` |
//! | Database (other) | Any other | `Storage` |
//! | PoolClosed / Other | N/A | `Storage` |

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use shipsync_core::{AggregateId, TenantId};
use shipsync_sales::{SalesOrder, SalesOrderId};
use shipsync_shipping::{SyncOrder, SyncOrderId, SyncOrderParts, SyncStatus, TrackingNumber};

use super::{Registered, SalesOrderRepository, StoreError, SyncOrderStore};

const SCHEMA: &str = include_str!("../../migrations/0001_shipping.sql");

const SYNC_ORDER_COLUMNS: &str = "s.id, s.tenant_id, s.order_id, s.status, s.attempt_count, \
     s.tracking_number, s.synced_at, s.last_error, s.created_at, s.updated_at";

#[derive(Debug, Clone)]
pub struct PostgresShippingStore {
    pool: Arc<PgPool>,
}

impl PostgresShippingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    /// Apply the idempotent schema.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }

    async fn fetch_by(
        &self,
        operation: &str,
        condition: &str,
        tenant_id: TenantId,
        key: Uuid,
    ) -> Result<Option<SyncOrder>, StoreError> {
        let sql = format!("SELECT {SYNC_ORDER_COLUMNS} FROM sync_orders s WHERE s.tenant_id = $1 AND {condition}");
        let row = sqlx::query(&sql)
            .bind(tenant_id.as_uuid())
            .bind(key)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;

        row.map(|r| SyncOrderRow::decode(&r)?.into_domain()).transpose()
    }
}

#[async_trait]
impl SyncOrderStore for PostgresShippingStore {
    #[instrument(
        skip(self, record),
        fields(tenant_id = %record.tenant_id(), order_id = %record.order_id()),
        err
    )]
    async fn register(&self, record: SyncOrder) -> Result<Registered, StoreError> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO sync_orders
                (id, tenant_id, order_id, status, attempt_count, tracking_number,
                 synced_at, last_error, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (tenant_id, order_id) DO NOTHING
            "#,
        )
        .bind(record.id().0)
        .bind(record.tenant_id().as_uuid())
        .bind(record.order_id().0.as_uuid())
        .bind(record.status().as_str())
        .bind(attempts_to_db(record.attempt_count())?)
        .bind(record.tracking_number().map(|t| t.as_str()))
        .bind(record.synced_at())
        .bind(record.last_error())
        .bind(record.created_at())
        .bind(record.updated_at())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("register_sync_order", e))?;

        if inserted.rows_affected() == 1 {
            return Ok(Registered { record, created: true });
        }

        let existing = self
            .find_by_order(record.tenant_id(), record.order_id())
            .await?
            .ok_or_else(|| StoreError::Storage("sync record vanished after conflicting insert".to_string()))?;
        Ok(Registered {
            record: existing,
            created: false,
        })
    }

    async fn get(&self, tenant_id: TenantId, id: SyncOrderId) -> Result<Option<SyncOrder>, StoreError> {
        self.fetch_by("get_sync_order", "s.id = $2", tenant_id, id.0).await
    }

    async fn find_by_order(
        &self,
        tenant_id: TenantId,
        order_id: SalesOrderId,
    ) -> Result<Option<SyncOrder>, StoreError> {
        self.fetch_by("find_sync_order_by_order", "s.order_id = $2", tenant_id, *order_id.0.as_uuid())
            .await
    }

    #[instrument(
        skip(self, record),
        fields(
            tenant_id = %record.tenant_id(),
            sync_order_id = %record.id(),
            status = %record.status(),
            attempt_count = record.attempt_count()
        ),
        err
    )]
    async fn save(&self, record: &SyncOrder) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO sync_orders
                (id, tenant_id, order_id, status, attempt_count, tracking_number,
                 synced_at, last_error, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                attempt_count = EXCLUDED.attempt_count,
                tracking_number = EXCLUDED.tracking_number,
                synced_at = EXCLUDED.synced_at,
                last_error = EXCLUDED.last_error,
                updated_at = EXCLUDED.updated_at
            WHERE sync_orders.tenant_id = EXCLUDED.tenant_id
            "#,
        )
        .bind(record.id().0)
        .bind(record.tenant_id().as_uuid())
        .bind(record.order_id().0.as_uuid())
        .bind(record.status().as_str())
        .bind(attempts_to_db(record.attempt_count())?)
        .bind(record.tracking_number().map(|t| t.as_str()))
        .bind(record.synced_at())
        .bind(record.last_error())
        .bind(record.created_at())
        .bind(record.updated_at())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("save_sync_order", e))?;

        // The conditional update matched nothing: the id belongs to another tenant.
        if result.rows_affected() == 0 {
            return Err(StoreError::TenantIsolation);
        }
        Ok(())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn find_eligible(&self, tenant_id: TenantId, max_attempts: u32) -> Result<Vec<SyncOrder>, StoreError> {
        let sql = format!(
            r#"
            SELECT {SYNC_ORDER_COLUMNS}
            FROM sync_orders s
            JOIN sales_orders o ON o.id = s.order_id AND o.tenant_id = s.tenant_id
            WHERE s.tenant_id = $1
                AND s.status = 'pending'
                AND s.attempt_count < $2
                AND o.state = 'processing'
            ORDER BY s.created_at ASC, s.id ASC
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(tenant_id.as_uuid())
            .bind(i64::from(max_attempts))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_eligible", e))?;

        rows.iter().map(|r| SyncOrderRow::decode(r)?.into_domain()).collect()
    }

    async fn list(
        &self,
        tenant_id: TenantId,
        status: Option<SyncStatus>,
        limit: usize,
    ) -> Result<Vec<SyncOrder>, StoreError> {
        let sql = format!(
            r#"
            SELECT {SYNC_ORDER_COLUMNS}
            FROM sync_orders s
            WHERE s.tenant_id = $1
                AND ($2::text IS NULL OR s.status = $2)
            ORDER BY s.created_at ASC, s.id ASC
            LIMIT $3
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(tenant_id.as_uuid())
            .bind(status.map(|s| s.as_str()))
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_sync_orders", e))?;

        rows.iter().map(|r| SyncOrderRow::decode(r)?.into_domain()).collect()
    }
}

#[async_trait]
impl SalesOrderRepository for PostgresShippingStore {
    async fn get(&self, tenant_id: TenantId, id: SalesOrderId) -> Result<Option<SalesOrder>, StoreError> {
        let row = sqlx::query("SELECT body FROM sales_orders WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id.as_uuid())
            .bind(id.0.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_sales_order", e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let body: serde_json::Value = row
            .try_get("body")
            .map_err(|e| StoreError::Decode(format!("sales_orders.body: {e}")))?;
        let order: SalesOrder =
            serde_json::from_value(body).map_err(|e| StoreError::Decode(format!("sales order {id}: {e}")))?;
        Ok(Some(order))
    }

    #[instrument(
        skip(self, order),
        fields(tenant_id = %order.tenant_id(), order_id = %order.id()),
        err
    )]
    async fn save(&self, order: &SalesOrder) -> Result<(), StoreError> {
        let body = serde_json::to_value(order).map_err(|e| StoreError::Storage(format!("encode sales order: {e}")))?;
        let result = sqlx::query(
            r#"
            INSERT INTO sales_orders (id, tenant_id, increment_id, state, body, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                state = EXCLUDED.state,
                body = EXCLUDED.body,
                updated_at = EXCLUDED.updated_at
            WHERE sales_orders.tenant_id = EXCLUDED.tenant_id
            "#,
        )
        .bind(order.id().0.as_uuid())
        .bind(order.tenant_id().as_uuid())
        .bind(order.increment_id())
        .bind(order.state().as_str())
        .bind(body)
        .bind(order.created_at())
        .bind(order.updated_at())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("save_sales_order", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::TenantIsolation);
        }
        Ok(())
    }
}

fn attempts_to_db(attempt_count: u32) -> Result<i32, StoreError> {
    i32::try_from(attempt_count).map_err(|_| StoreError::Storage(format!("attempt_count {attempt_count} out of range")))
}

pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                _ => StoreError::Storage(msg),
            }
        }
        sqlx::Error::PoolClosed => StoreError::Storage(format!("connection pool closed in {}", operation)),
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StoreError::Decode(format!("{}: {}", operation, err))
        }
        _ => StoreError::Storage(format!("sqlx error in {}: {}", operation, err)),
    }
}

// SQLx row types

#[derive(Debug)]
struct SyncOrderRow {
    id: Uuid,
    tenant_id: Uuid,
    order_id: Uuid,
    status: String,
    attempt_count: i32,
    tracking_number: Option<String>,
    synced_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SyncOrderRow {
    fn decode(row: &sqlx::postgres::PgRow) -> Result<Self, StoreError> {
        let get_err = |e: sqlx::Error| StoreError::Decode(e.to_string());
        Ok(Self {
            id: row.try_get("id").map_err(get_err)?,
            tenant_id: row.try_get("tenant_id").map_err(get_err)?,
            order_id: row.try_get("order_id").map_err(get_err)?,
            status: row.try_get("status").map_err(get_err)?,
            attempt_count: row.try_get("attempt_count").map_err(get_err)?,
            tracking_number: row.try_get("tracking_number").map_err(get_err)?,
            synced_at: row.try_get("synced_at").map_err(get_err)?,
            last_error: row.try_get("last_error").map_err(get_err)?,
            created_at: row.try_get("created_at").map_err(get_err)?,
            updated_at: row.try_get("updated_at").map_err(get_err)?,
        })
    }

    fn into_domain(self) -> Result<SyncOrder, StoreError> {
        let attempt_count = u32::try_from(self.attempt_count)
            .map_err(|_| StoreError::Decode(format!("negative attempt_count on {}", self.id)))?;
        let tracking_number = self.tracking_number.map(TrackingNumber::new).transpose()?;

        Ok(SyncOrder::from_parts(SyncOrderParts {
            id: SyncOrderId::from_uuid(self.id),
            tenant_id: TenantId::from_uuid(self.tenant_id),
            order_id: SalesOrderId::new(AggregateId::from_uuid(self.order_id)),
            status: SyncStatus::parse(&self.status)?,
            attempt_count,
            tracking_number,
            synced_at: self.synced_at,
            last_error: self.last_error,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })?)
    }
}
