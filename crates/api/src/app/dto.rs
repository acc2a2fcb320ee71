use serde::{Deserialize, Serialize};

use shipsync_core::TenantId;
use shipsync_infra::{Notification, SyncAttempt};
use shipsync_sales::{Customer, NewSalesOrder, OrderLine, OrderState, ShippingAddress};
use shipsync_shipping::{SyncOrder, SyncStatus};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateSalesOrderRequest {
    pub increment_id: String,
    #[serde(default = "default_order_state")]
    pub state: OrderState,
    pub customer: Customer,
    pub shipping_address: ShippingAddress,
    pub lines: Vec<OrderLine>,
    #[serde(default)]
    pub delivery_instructions: Option<String>,
    #[serde(default)]
    pub authority_to_leave: bool,
}

fn default_order_state() -> OrderState {
    OrderState::Processing
}

impl CreateSalesOrderRequest {
    pub fn into_new_order(self, tenant_id: TenantId) -> NewSalesOrder {
        NewSalesOrder {
            tenant_id,
            increment_id: self.increment_id,
            state: self.state,
            customer: self.customer,
            shipping_address: self.shipping_address,
            lines: self.lines,
            delivery_instructions: self.delivery_instructions,
            authority_to_leave: self.authority_to_leave,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrderStateRequest {
    pub state: OrderState,
}

#[derive(Debug, Default, Deserialize)]
pub struct SyncOrdersQuery {
    pub status: Option<String>,
    pub limit: Option<usize>,
}

pub const DEFAULT_LIST_LIMIT: usize = 100;
pub const MAX_LIST_LIMIT: usize = 1000;

impl SyncOrdersQuery {
    pub fn status(&self) -> Result<Option<SyncStatus>, axum::response::Response> {
        match self.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            None => Ok(None),
            Some(s) => SyncStatus::parse(s).map(Some).map_err(|_| {
                errors::json_error(
                    axum::http::StatusCode::BAD_REQUEST,
                    "invalid_status",
                    "status must be one of: pending, synced, failed",
                )
            }),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT)
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct SyncOrderResponse {
    pub synced: bool,
    #[serde(flatten)]
    pub attempt: SyncAttempt,
    /// `None` when sync is disabled.
    pub record: Option<SyncOrder>,
    pub notifications: Vec<Notification>,
}

#[derive(Debug, Serialize)]
pub struct SyncOrderList {
    pub items: Vec<SyncOrder>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_query_defaults_and_clamps() {
        let q = SyncOrdersQuery::default();
        assert_eq!(q.limit(), DEFAULT_LIST_LIMIT);
        assert!(q.status().unwrap().is_none());

        let q = SyncOrdersQuery {
            status: Some("failed".into()),
            limit: Some(50_000),
        };
        assert_eq!(q.limit(), MAX_LIST_LIMIT);
        assert_eq!(q.status().unwrap(), Some(SyncStatus::Failed));
    }

    #[test]
    fn unknown_status_is_rejected() {
        let q = SyncOrdersQuery {
            status: Some("shipped".into()),
            limit: None,
        };
        let res = q.status().unwrap_err();
        assert_eq!(res.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn order_state_defaults_to_processing() {
        let body = serde_json::json!({
            "increment_id": "100000001",
            "customer": {"email": "a@example.com", "first_name": "A", "last_name": "B"},
            "shipping_address": {
                "street": "1 Main St", "suburb": "Sydney", "postcode": "2000",
                "region": "NSW", "country_code": "AU", "phone": null
            },
            "lines": [{"sku": "S", "name": "Shoe", "quantity": 1, "weight": 1.0, "unit_price": 1000}]
        });
        let req: CreateSalesOrderRequest = serde_json::from_value(body).unwrap();
        assert_eq!(req.state, OrderState::Processing);
        assert!(!req.authority_to_leave);
    }
}
