use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use shipsync_core::DomainError;
use shipsync_infra::{StoreError, SyncError};

pub fn sync_error_to_response(err: SyncError) -> axum::response::Response {
    match err {
        SyncError::Store(e) => store_error_to_response(e),
        SyncError::Domain(e) => domain_error_to_response(e),
        SyncError::SchedulerStopped => json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "scheduler_stopped",
            "sync scheduler is not running",
        ),
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DomainError::NotFound(msg) => json_error(StatusCode::NOT_FOUND, "not_found", format!("{msg} not found")),
        DomainError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
    }
}

pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    match err {
        StoreError::NotFound(what) => json_error(StatusCode::NOT_FOUND, "not_found", format!("{what} not found")),
        StoreError::TenantIsolation => {
            json_error(StatusCode::FORBIDDEN, "tenant_isolation", "tenant isolation violation")
        }
        StoreError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        e @ (StoreError::Storage(_) | StoreError::Decode(_)) => {
            tracing::error!(error = %e, "store failure while handling request");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string())
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
