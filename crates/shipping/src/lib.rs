//! Shipping sync domain module.
//!
//! Sync records, the retry policy, per-tenant request context and the carrier
//! order payload. Pure domain logic; storage, HTTP and scheduling live in
//! `shipsync-infra`.

pub mod policy;
pub mod request;
pub mod sync_order;
pub mod tenant;

pub use policy::{DEFAULT_MAX_ATTEMPTS, SyncPolicy};
pub use request::{OrderRequest, RequestBuildError, build_order_request};
pub use sync_order::{SyncOrder, SyncOrderId, SyncOrderParts, SyncStatus, TrackingNumber};
pub use tenant::{TenantContext, WeightUnit};
