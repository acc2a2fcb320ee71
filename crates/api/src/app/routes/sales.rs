use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};

use shipsync_infra::SalesOrderRepository;
use shipsync_sales::{SalesOrder, SalesOrderId};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::RequestTenant;

pub fn router() -> Router {
    Router::new().nest("/orders", orders_router())
}

fn orders_router() -> Router {
    Router::new()
        .route("/", post(create_sales_order))
        .route("/:id", get(get_sales_order))
        .route("/:id/state", put(update_sales_order_state))
}

/// Ingest a storefront order.
pub async fn create_sales_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<RequestTenant>,
    Json(body): Json<dto::CreateSalesOrderRequest>,
) -> axum::response::Response {
    let order = match SalesOrder::new(body.into_new_order(tenant.tenant_id())) {
        Ok(o) => o,
        Err(e) => return errors::domain_error_to_response(e),
    };

    if let Err(e) = services.orders().save(&order).await {
        return errors::store_error_to_response(e);
    }

    tracing::info!(
        tenant_id = %tenant.tenant_id(),
        order_id = %order.id(),
        increment_id = order.increment_id(),
        "sales order ingested"
    );
    (StatusCode::CREATED, Json(order)).into_response()
}

pub async fn get_sales_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<RequestTenant>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id: SalesOrderId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid order id"),
    };

    match services.orders().get(tenant.tenant_id(), order_id).await {
        Ok(Some(order)) => (StatusCode::OK, Json(order)).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "sales order not found"),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// Storefront state change (e.g. shipped outside the sync, or canceled).
///
/// Records of orders that leave `processing` stop being eligible for sync.
pub async fn update_sales_order_state(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<RequestTenant>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateOrderStateRequest>,
) -> axum::response::Response {
    let order_id: SalesOrderId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid order id"),
    };

    let mut order = match services.orders().get(tenant.tenant_id(), order_id).await {
        Ok(Some(order)) => order,
        Ok(None) => return errors::json_error(StatusCode::NOT_FOUND, "not_found", "sales order not found"),
        Err(e) => return errors::store_error_to_response(e),
    };

    let from = order.state();
    if let Err(e) = order.set_state(body.state) {
        return errors::domain_error_to_response(e);
    }
    if let Err(e) = services.orders().save(&order).await {
        return errors::store_error_to_response(e);
    }

    tracing::info!(
        tenant_id = %tenant.tenant_id(),
        order_id = %order.id(),
        from = from.as_str(),
        to = order.state().as_str(),
        "sales order state changed"
    );
    (StatusCode::OK, Json(order)).into_response()
}
