//! Outbound carrier order request.
//!
//! Builds the carrier payload from a sales order inside a tenant context.
//! Weights are always sent in kilograms; prices as decimal strings in the
//! tenant currency.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use shipsync_core::TenantId;
use shipsync_sales::SalesOrder;

use crate::tenant::TenantContext;

#[derive(Debug, Error, PartialEq)]
pub enum RequestBuildError {
    #[error("order belongs to tenant {order_tenant}, context is tenant {context_tenant}")]
    TenantMismatch {
        order_tenant: TenantId,
        context_tenant: TenantId,
    },

    #[error("order {0} has no lines to ship")]
    NoLines(String),

    #[error("order {increment_id} is missing {field}")]
    MissingField {
        increment_id: String,
        field: &'static str,
    },

    #[error("order {increment_id} has invalid parcel weight {weight_kg}kg")]
    InvalidWeight { increment_id: String, weight_kg: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAttributes {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParcelAttributes {
    pub qty: u32,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestItem {
    pub sku: String,
    pub title: String,
    pub quantity: u32,
    pub price: String,
    pub weight: f64,
}

/// Carrier order payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub retailer_invoice: String,
    pub retailer_reference: String,
    pub authority_to_leave: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_instructions: Option<String>,
    pub user_attributes: UserAttributes,
    pub receiver_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver_contact_number: Option<String>,
    pub delivery_address: String,
    pub delivery_suburb: String,
    pub delivery_postcode: String,
    pub delivery_state: String,
    pub delivery_country_code: String,
    pub parcel_attributes: Vec<ParcelAttributes>,
    pub items: Vec<RequestItem>,
    pub product_currency: String,
}

fn require(value: &str, increment_id: &str, field: &'static str) -> Result<String, RequestBuildError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(RequestBuildError::MissingField {
            increment_id: increment_id.to_string(),
            field,
        });
    }
    Ok(trimmed.to_string())
}

/// Format a minor-unit amount with the currency's decimal places.
pub fn format_price(minor_units: u64, decimals: u32) -> String {
    if decimals == 0 {
        return minor_units.to_string();
    }
    let scale = 10u64.pow(decimals);
    format!(
        "{}.{:0width$}",
        minor_units / scale,
        minor_units % scale,
        width = decimals as usize
    )
}

fn round_kg(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Build the carrier request for `order` within `ctx`.
pub fn build_order_request(ctx: &TenantContext, order: &SalesOrder) -> Result<OrderRequest, RequestBuildError> {
    if order.tenant_id() != ctx.tenant_id {
        return Err(RequestBuildError::TenantMismatch {
            order_tenant: order.tenant_id(),
            context_tenant: ctx.tenant_id,
        });
    }

    let increment_id = order.increment_id();
    if order.lines().is_empty() {
        return Err(RequestBuildError::NoLines(increment_id.to_string()));
    }

    let customer = order.customer();
    let address = order.shipping_address();
    let email = require(&customer.email, increment_id, "customer email")?;
    let street = require(&address.street, increment_id, "delivery street")?;
    let suburb = require(&address.suburb, increment_id, "delivery suburb")?;
    let postcode = require(&address.postcode, increment_id, "delivery postcode")?;
    let country = require(&address.country_code, increment_id, "delivery country")?;

    let total_kg = round_kg(ctx.weight_unit.to_kg(order.total_weight()));
    if !total_kg.is_finite() || total_kg <= 0.0 {
        return Err(RequestBuildError::InvalidWeight {
            increment_id: increment_id.to_string(),
            weight_kg: total_kg,
        });
    }

    let decimals = ctx.currency_decimals();
    let items = order
        .lines()
        .iter()
        .map(|line| RequestItem {
            sku: line.sku.clone(),
            title: line.name.clone(),
            quantity: line.quantity,
            price: format_price(line.unit_price, decimals),
            weight: round_kg(ctx.weight_unit.to_kg(line.weight)),
        })
        .collect();

    let receiver_name = format!("{} {}", customer.first_name.trim(), customer.last_name.trim())
        .trim()
        .to_string();

    Ok(OrderRequest {
        retailer_invoice: increment_id.to_string(),
        retailer_reference: order.id().to_string(),
        authority_to_leave: if order.authority_to_leave() { "Yes" } else { "No" }.to_string(),
        delivery_instructions: order
            .delivery_instructions()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        user_attributes: UserAttributes {
            email,
            first_name: customer.first_name.trim().to_string(),
            last_name: customer.last_name.trim().to_string(),
        },
        receiver_name,
        receiver_contact_number: address.phone.clone().filter(|p| !p.trim().is_empty()),
        delivery_address: street,
        delivery_suburb: suburb,
        delivery_postcode: postcode,
        delivery_state: address.region.trim().to_string(),
        delivery_country_code: country.to_ascii_uppercase(),
        parcel_attributes: vec![ParcelAttributes {
            qty: 1,
            weight: total_kg,
        }],
        items,
        product_currency: ctx.currency.to_ascii_uppercase(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use shipsync_sales::{Customer, NewSalesOrder, OrderLine, OrderState, ShippingAddress};

    use crate::tenant::WeightUnit;

    fn order_for(tenant_id: TenantId, lines: Vec<OrderLine>) -> SalesOrder {
        SalesOrder::new(NewSalesOrder {
            tenant_id,
            increment_id: "100000042".to_string(),
            state: OrderState::Processing,
            customer: Customer {
                email: "jo@example.com".to_string(),
                first_name: "Jo".to_string(),
                last_name: "Citizen".to_string(),
            },
            shipping_address: ShippingAddress {
                street: "1 George St".to_string(),
                suburb: "Sydney".to_string(),
                postcode: "2000".to_string(),
                region: "NSW".to_string(),
                country_code: "au".to_string(),
                phone: Some("0400000000".to_string()),
            },
            lines,
            delivery_instructions: Some("  leave at door ".to_string()),
            authority_to_leave: true,
        })
        .unwrap()
    }

    fn line(sku: &str, quantity: u32, weight: f64, unit_price: u64) -> OrderLine {
        OrderLine {
            sku: sku.to_string(),
            name: format!("{sku} item"),
            quantity,
            weight,
            unit_price,
        }
    }

    #[test]
    fn builds_request_from_processing_order() {
        let tenant = TenantId::new();
        let ctx = TenantContext::new(tenant, "default");
        let order = order_for(tenant, vec![line("TEE", 2, 0.25, 2500), line("MUG", 1, 0.5, 1200)]);

        let request = build_order_request(&ctx, &order).unwrap();

        assert_eq!(request.retailer_invoice, "100000042");
        assert_eq!(request.retailer_reference, order.id().to_string());
        assert_eq!(request.authority_to_leave, "Yes");
        assert_eq!(request.delivery_instructions.as_deref(), Some("leave at door"));
        assert_eq!(request.receiver_name, "Jo Citizen");
        assert_eq!(request.delivery_country_code, "AU");
        assert_eq!(request.parcel_attributes, vec![ParcelAttributes { qty: 1, weight: 1.0 }]);
        assert_eq!(request.items.len(), 2);
        assert_eq!(request.items[0].price, "25.00");
        assert_eq!(request.product_currency, "AUD");
    }

    #[test]
    fn converts_grams_to_kilograms() {
        let tenant = TenantId::new();
        let ctx = TenantContext::new(tenant, "eu").with_weight_unit(WeightUnit::Grams);
        let order = order_for(tenant, vec![line("BOX", 3, 200.0, 999)]);

        let request = build_order_request(&ctx, &order).unwrap();
        assert_eq!(request.parcel_attributes[0].weight, 0.6);
        assert_eq!(request.items[0].weight, 0.2);
    }

    #[test]
    fn zero_decimal_currency_prices() {
        let tenant = TenantId::new();
        let ctx = TenantContext::new(tenant, "jp").with_currency("jpy");
        let order = order_for(tenant, vec![line("CUP", 1, 0.3, 1500)]);

        let request = build_order_request(&ctx, &order).unwrap();
        assert_eq!(request.items[0].price, "1500");
        assert_eq!(request.product_currency, "JPY");
    }

    #[test]
    fn rejects_other_tenant() {
        let ctx = TenantContext::new(TenantId::new(), "a");
        let order = order_for(TenantId::new(), vec![line("TEE", 1, 0.2, 100)]);
        assert!(matches!(
            build_order_request(&ctx, &order),
            Err(RequestBuildError::TenantMismatch { .. })
        ));
    }

    #[test]
    fn rejects_weightless_parcel() {
        let tenant = TenantId::new();
        let ctx = TenantContext::new(tenant, "default");
        let order = order_for(tenant, vec![line("EBOOK", 1, 0.0, 500)]);
        assert!(matches!(
            build_order_request(&ctx, &order),
            Err(RequestBuildError::InvalidWeight { .. })
        ));
    }

    #[test]
    fn price_formatting() {
        assert_eq!(format_price(0, 2), "0.00");
        assert_eq!(format_price(5, 2), "0.05");
        assert_eq!(format_price(123456, 2), "1234.56");
        assert_eq!(format_price(42, 0), "42");
    }

    #[test]
    fn payload_serializes_without_empty_optionals() {
        let tenant = TenantId::new();
        let ctx = TenantContext::new(tenant, "default");
        let order = order_for(tenant, vec![line("TEE", 1, 0.2, 100)]);
        let mut request = build_order_request(&ctx, &order).unwrap();
        request.delivery_instructions = None;

        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("delivery_instructions").is_none());
        assert_eq!(json["parcel_attributes"][0]["qty"], 1);
    }
}
