use axum::Router;

pub mod sales;
pub mod shipping;
pub mod system;

/// Router for all tenant-scoped endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/shipping", shipping::router())
        .nest("/sales", sales::router())
}
