use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use shipsync_core::TenantId;
use shipsync_infra::TenantDirectory;

use crate::app::errors;
use crate::context::RequestTenant;

pub const TENANT_HEADER: &str = "x-tenant-id";

#[derive(Clone)]
pub struct TenantState {
    pub directory: Arc<dyn TenantDirectory>,
}

/// Resolve the request's tenant and attach it as a [`RequestTenant`] extension.
pub async fn tenant_middleware(
    State(state): State<TenantState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let tenant_id = extract_tenant_id(req.headers())?;

    let ctx = match state.directory.get(tenant_id).await {
        Ok(Some(ctx)) => ctx,
        Ok(None) => {
            return Err(errors::json_error(
                StatusCode::NOT_FOUND,
                "unknown_tenant",
                format!("tenant {tenant_id} is not configured"),
            ));
        }
        Err(e) => return Err(errors::store_error_to_response(e)),
    };

    req.extensions_mut().insert(RequestTenant::new(ctx));
    Ok(next.run(req).await)
}

fn extract_tenant_id(headers: &HeaderMap) -> Result<TenantId, Response> {
    let missing = || {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "missing_tenant",
            format!("{TENANT_HEADER} header is required"),
        )
    };

    let value = headers.get(TENANT_HEADER).ok_or_else(missing)?;
    let value = value.to_str().map_err(|_| missing())?;
    if value.trim().is_empty() {
        return Err(missing());
    }

    value
        .parse()
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid tenant id"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn tenant_header_is_required() {
        let headers = HeaderMap::new();
        let res = extract_tenant_id(&headers).unwrap_err();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn tenant_header_must_be_a_uuid() {
        let mut headers = HeaderMap::new();
        headers.insert(TENANT_HEADER, HeaderValue::from_static("store-1"));
        let res = extract_tenant_id(&headers).unwrap_err();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn tenant_header_is_parsed() {
        let tenant_id = TenantId::new();
        let mut headers = HeaderMap::new();
        headers.insert(TENANT_HEADER, HeaderValue::from_str(&format!(" {tenant_id} ")).unwrap());
        assert_eq!(extract_tenant_id(&headers).unwrap(), tenant_id);
    }
}
