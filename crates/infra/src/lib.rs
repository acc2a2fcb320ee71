//! Infrastructure layer: config, storage, the carrier client, tenants and the sync engine.

pub mod carrier;
pub mod config;
pub mod notify;
pub mod store;
pub mod sync;
pub mod tenants;


pub use carrier::{CarrierClient, CarrierError, CarrierResponse, HttpCarrierClient, InMemoryCarrierClient};
pub use config::{AppConfig, CarrierConfig, ConfigError, TenantSettings};
pub use notify::{InMemoryNotificationSink, Notification, NotificationLevel, NotificationSink, TracingNotificationSink};
pub use store::{
    InMemoryShippingStore, PostgresShippingStore, Registered, SalesOrderRepository, StoreError, SyncOrderStore,
};
pub use sync::{OrderSyncService, RunSummary, SyncAttempt, SyncError, SyncRunner, SyncScheduler, SyncSchedulerHandle};
pub use tenants::{PostgresTenantDirectory, StaticTenantDirectory, TenantDirectory, TenantScope};
