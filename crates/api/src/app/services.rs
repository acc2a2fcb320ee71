//! Service wiring: stores, carrier client, tenant directory and the sync engine.

use std::sync::Arc;

use anyhow::Context;
use sqlx::PgPool;

use shipsync_core::TenantId;
use shipsync_infra::{
    AppConfig, CarrierClient, HttpCarrierClient, InMemoryCarrierClient, InMemoryShippingStore, OrderSyncService,
    PostgresShippingStore, PostgresTenantDirectory, SalesOrderRepository, StaticTenantDirectory, SyncOrderStore,
    SyncRunner, TenantDirectory,
};
use shipsync_shipping::SyncPolicy;

/// Everything the handlers (and the scheduler) share.
#[derive(Clone)]
pub struct AppServices {
    pub sync: Arc<OrderSyncService>,
    pub runner: Arc<SyncRunner>,
    pub tenants: Arc<dyn TenantDirectory>,
}

impl AppServices {
    pub fn new(
        policy: SyncPolicy,
        carrier_name: impl Into<String>,
        records: Arc<dyn SyncOrderStore>,
        orders: Arc<dyn SalesOrderRepository>,
        carrier: Arc<dyn CarrierClient>,
        tenants: Arc<dyn TenantDirectory>,
    ) -> Self {
        let sync = Arc::new(OrderSyncService::new(policy, carrier_name, records, orders, carrier));
        let runner = Arc::new(SyncRunner::new(sync.clone(), tenants.clone()));
        Self { sync, runner, tenants }
    }

    /// In-memory stores (dev/test).
    pub fn in_memory(
        policy: SyncPolicy,
        carrier_name: impl Into<String>,
        carrier: Arc<dyn CarrierClient>,
        tenants: Arc<dyn TenantDirectory>,
    ) -> Self {
        let store = InMemoryShippingStore::arc();
        Self::new(policy, carrier_name, store.clone(), store, carrier, tenants)
    }

    pub fn orders(&self) -> &Arc<dyn SalesOrderRepository> {
        self.sync.orders()
    }
}

/// Wire services from configuration.
///
/// Postgres when `database_url` is set (schema applied on startup), in-memory otherwise.
pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let carrier = build_carrier(config)?;

    match &config.database_url {
        Some(url) => {
            let pool = PgPool::connect(url).await.context("failed to connect to Postgres")?;
            let store = Arc::new(PostgresShippingStore::new(pool.clone()));
            store.migrate().await.context("failed to apply shipping schema")?;
            let directory = PostgresTenantDirectory::new(pool);
            match config.tenant.context() {
                Some(ctx) => {
                    directory
                        .upsert(&ctx)
                        .await
                        .with_context(|| format!("failed to provision tenant {}", ctx.tenant_id))?;
                    tracing::info!(tenant_id = %ctx.tenant_id, store = %ctx.code, "tenant provisioned");
                }
                None => tracing::info!("SHIPSYNC_TENANT_ID not set; serving tenants already in the stores table"),
            }
            let tenants: Arc<dyn TenantDirectory> = Arc::new(directory);
            tracing::info!("using Postgres stores");
            Ok(AppServices::new(
                config.policy,
                config.carrier.name.clone(),
                store.clone(),
                store,
                carrier,
                tenants,
            ))
        }
        None => {
            let ctx = config
                .tenant
                .context()
                .unwrap_or_else(|| config.tenant.context_for(TenantId::new()));
            tracing::warn!(tenant_id = %ctx.tenant_id, "DATABASE_URL not set; using in-memory stores");
            let tenants: Arc<dyn TenantDirectory> = Arc::new(StaticTenantDirectory::new([ctx]));
            Ok(AppServices::in_memory(
                config.policy,
                config.carrier.name.clone(),
                carrier,
                tenants,
            ))
        }
    }
}

fn build_carrier(config: &AppConfig) -> anyhow::Result<Arc<dyn CarrierClient>> {
    match (&config.carrier.api_url, &config.carrier.api_key) {
        (Some(url), Some(key)) => {
            let client = HttpCarrierClient::new(url.clone(), key.clone(), config.carrier.timeout)
                .context("failed to build carrier HTTP client")?;
            Ok(Arc::new(client))
        }
        _ => {
            tracing::warn!("carrier API URL not set; orders go to the in-memory carrier");
            Ok(Arc::new(InMemoryCarrierClient::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shipsync_infra::TenantSettings;

    #[tokio::test]
    async fn in_memory_services_serve_the_configured_tenant() {
        let tenant_id = TenantId::new();
        let config = AppConfig {
            tenant: TenantSettings {
                id: Some(tenant_id),
                code: "nz".to_string(),
                name: Some("Kiwi Outdoors".to_string()),
                currency: Some("NZD".to_string()),
                ..TenantSettings::default()
            },
            ..AppConfig::default()
        };

        let services = build_services(&config).await.unwrap();
        let ctx = services.tenants.get(tenant_id).await.unwrap().unwrap();
        assert_eq!(ctx.name, "Kiwi Outdoors");
        assert_eq!(ctx.currency, "NZD");
        assert_eq!(services.tenants.list().await.unwrap().len(), 1);
    }
}
