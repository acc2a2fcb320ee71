//! Tenant (store) directory and scoped tenant execution context.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::{debug, info_span};

use shipsync_core::TenantId;
use shipsync_shipping::{TenantContext, WeightUnit};

use crate::store::StoreError;
use crate::store::map_sqlx_error;

/// Guard for a tenant's execution context.
///
/// Entering sets up the tenant span; dropping the guard releases the context,
/// on every exit path.
#[derive(Debug)]
pub struct TenantScope {
    ctx: TenantContext,
    span: tracing::Span,
    entered_at: Instant,
    active: Arc<AtomicUsize>,
}

impl TenantScope {
    fn enter(ctx: &TenantContext, active: Arc<AtomicUsize>) -> Self {
        active.fetch_add(1, Ordering::SeqCst);
        let span = info_span!("tenant", tenant_id = %ctx.tenant_id, store = %ctx.code);
        debug!(tenant_id = %ctx.tenant_id, store = %ctx.code, locale = %ctx.locale, "tenant context entered");
        Self {
            ctx: ctx.clone(),
            span,
            entered_at: Instant::now(),
            active,
        }
    }

    pub fn context(&self) -> &TenantContext {
        &self.ctx
    }

    pub fn tenant_id(&self) -> TenantId {
        self.ctx.tenant_id
    }

    /// Span to instrument work done inside this tenant.
    pub fn span(&self) -> &tracing::Span {
        &self.span
    }
}

impl Drop for TenantScope {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        debug!(
            tenant_id = %self.ctx.tenant_id,
            store = %self.ctx.code,
            elapsed_ms = self.entered_at.elapsed().as_millis() as u64,
            "tenant context released"
        );
    }
}

/// Source of tenants the sync runs for.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    /// All active tenants, in a stable order.
    async fn list(&self) -> Result<Vec<TenantContext>, StoreError>;

    async fn get(&self, tenant_id: TenantId) -> Result<Option<TenantContext>, StoreError>;

    /// Enter the tenant's execution context.
    fn enter(&self, ctx: &TenantContext) -> TenantScope;

    /// Scopes entered and not yet released.
    fn active_scopes(&self) -> usize;
}

#[async_trait]
impl<D> TenantDirectory for Arc<D>
where
    D: TenantDirectory + ?Sized,
{
    async fn list(&self) -> Result<Vec<TenantContext>, StoreError> {
        (**self).list().await
    }

    async fn get(&self, tenant_id: TenantId) -> Result<Option<TenantContext>, StoreError> {
        (**self).get(tenant_id).await
    }

    fn enter(&self, ctx: &TenantContext) -> TenantScope {
        (**self).enter(ctx)
    }

    fn active_scopes(&self) -> usize {
        (**self).active_scopes()
    }
}

/// Fixed tenant list, for tests/dev and single-store deployments.
#[derive(Debug, Default)]
pub struct StaticTenantDirectory {
    tenants: RwLock<BTreeMap<String, TenantContext>>,
    active: Arc<AtomicUsize>,
}

impl StaticTenantDirectory {
    pub fn new(tenants: impl IntoIterator<Item = TenantContext>) -> Self {
        let directory = Self::default();
        if let Ok(mut map) = directory.tenants.write() {
            for ctx in tenants {
                map.insert(ctx.code.clone(), ctx);
            }
        }
        directory
    }

    pub fn insert(&self, ctx: TenantContext) {
        if let Ok(mut map) = self.tenants.write() {
            map.insert(ctx.code.clone(), ctx);
        }
    }
}

#[async_trait]
impl TenantDirectory for StaticTenantDirectory {
    async fn list(&self) -> Result<Vec<TenantContext>, StoreError> {
        let map = self
            .tenants
            .read()
            .map_err(|_| StoreError::Storage("lock poisoned".to_string()))?;
        Ok(map.values().cloned().collect())
    }

    async fn get(&self, tenant_id: TenantId) -> Result<Option<TenantContext>, StoreError> {
        let map = self
            .tenants
            .read()
            .map_err(|_| StoreError::Storage("lock poisoned".to_string()))?;
        Ok(map.values().find(|c| c.tenant_id == tenant_id).cloned())
    }

    fn enter(&self, ctx: &TenantContext) -> TenantScope {
        TenantScope::enter(ctx, self.active.clone())
    }

    fn active_scopes(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

/// Tenants from the `stores` table.
#[derive(Debug, Clone)]
pub struct PostgresTenantDirectory {
    pool: Arc<PgPool>,
    active: Arc<AtomicUsize>,
}

impl PostgresTenantDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Insert or update a store row.
    pub async fn upsert(&self, ctx: &TenantContext) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO stores (tenant_id, code, name, locale, currency, weight_unit)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (tenant_id) DO UPDATE SET
                code = EXCLUDED.code,
                name = EXCLUDED.name,
                locale = EXCLUDED.locale,
                currency = EXCLUDED.currency,
                weight_unit = EXCLUDED.weight_unit
            "#,
        )
        .bind(ctx.tenant_id.as_uuid())
        .bind(&ctx.code)
        .bind(&ctx.name)
        .bind(&ctx.locale)
        .bind(&ctx.currency)
        .bind(ctx.weight_unit.as_str())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("upsert_store", e))?;
        Ok(())
    }
}

fn decode_store(row: &sqlx::postgres::PgRow) -> Result<TenantContext, StoreError> {
    let get_err = |e: sqlx::Error| StoreError::Decode(e.to_string());
    let tenant_id: uuid::Uuid = row.try_get("tenant_id").map_err(get_err)?;
    let weight_unit: String = row.try_get("weight_unit").map_err(get_err)?;

    Ok(TenantContext {
        tenant_id: TenantId::from_uuid(tenant_id),
        code: row.try_get("code").map_err(get_err)?,
        name: row.try_get("name").map_err(get_err)?,
        locale: row.try_get("locale").map_err(get_err)?,
        currency: row.try_get("currency").map_err(get_err)?,
        weight_unit: WeightUnit::parse(&weight_unit)?,
    })
}

#[async_trait]
impl TenantDirectory for PostgresTenantDirectory {
    async fn list(&self) -> Result<Vec<TenantContext>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT tenant_id, code, name, locale, currency, weight_unit
            FROM stores
            WHERE is_active
            ORDER BY code ASC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_stores", e))?;

        rows.iter().map(decode_store).collect()
    }

    async fn get(&self, tenant_id: TenantId) -> Result<Option<TenantContext>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT tenant_id, code, name, locale, currency, weight_unit
            FROM stores
            WHERE tenant_id = $1 AND is_active
            "#,
        )
        .bind(tenant_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_store", e))?;

        row.as_ref().map(decode_store).transpose()
    }

    fn enter(&self, ctx: &TenantContext) -> TenantScope {
        TenantScope::enter(ctx, self.active.clone())
    }

    fn active_scopes(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}
