use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use shipsync_infra::{InMemoryNotificationSink, SyncOrderStore};
use shipsync_sales::SalesOrderId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::RequestTenant;

pub fn router() -> Router {
    Router::new()
        .route("/orders/:order_id/register", post(register_order))
        .route("/orders/:order_id/sync", post(sync_order))
        .route("/sync-orders", get(list_sync_orders))
        .route("/sync", post(run_sync))
}

fn parse_order_id(raw: &str) -> Result<SalesOrderId, axum::response::Response> {
    raw.parse()
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid order id"))
}

pub async fn register_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<RequestTenant>,
    Path(order_id): Path<String>,
) -> axum::response::Response {
    let order_id = match parse_order_id(&order_id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services.sync.register_order(tenant.context(), order_id).await {
        Ok(registered) => {
            let status = if registered.created { StatusCode::CREATED } else { StatusCode::OK };
            (status, Json(registered.record)).into_response()
        }
        Err(e) => errors::sync_error_to_response(e),
    }
}

/// Interactive sync: one attempt, with the notifications it produced.
pub async fn sync_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<RequestTenant>,
    Path(order_id): Path<String>,
) -> axum::response::Response {
    let order_id = match parse_order_id(&order_id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    let sink = InMemoryNotificationSink::new();
    match services.sync.sync_order(tenant.context(), order_id, Some(&sink)).await {
        Ok((attempt, record)) => {
            let body = dto::SyncOrderResponse {
                synced: attempt.succeeded(),
                attempt,
                record,
                notifications: sink.all(),
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => errors::sync_error_to_response(e),
    }
}

pub async fn list_sync_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<RequestTenant>,
    Query(query): Query<dto::SyncOrdersQuery>,
) -> axum::response::Response {
    let status = match query.status() {
        Ok(s) => s,
        Err(res) => return res,
    };

    match services.sync.records().list(tenant.tenant_id(), status, query.limit()).await {
        Ok(items) => (StatusCode::OK, Json(dto::SyncOrderList { items })).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// Full run across every tenant, same as a scheduler tick.
pub async fn run_sync(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.runner.run_all().await {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => errors::sync_error_to_response(e),
    }
}
