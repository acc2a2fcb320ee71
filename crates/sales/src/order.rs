use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shipsync_core::{AggregateId, DomainError, DomainResult, TenantId};

/// Sales order identifier (tenant-scoped via the order's `tenant_id`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SalesOrderId(pub AggregateId);

impl SalesOrderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }

    pub fn generate() -> Self {
        Self(AggregateId::new())
    }
}

impl core::fmt::Display for SalesOrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl core::str::FromStr for SalesOrderId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Order processing state as reported by the storefront platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    New,
    PendingPayment,
    /// Paid and ready to ship.
    Processing,
    Complete,
    Closed,
    Canceled,
    Holded,
}

impl OrderState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderState::New => "new",
            OrderState::PendingPayment => "pending_payment",
            OrderState::Processing => "processing",
            OrderState::Complete => "complete",
            OrderState::Closed => "closed",
            OrderState::Canceled => "canceled",
            OrderState::Holded => "holded",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        match s {
            "new" => Ok(OrderState::New),
            "pending_payment" => Ok(OrderState::PendingPayment),
            "processing" => Ok(OrderState::Processing),
            "complete" => Ok(OrderState::Complete),
            "closed" => Ok(OrderState::Closed),
            "canceled" => Ok(OrderState::Canceled),
            "holded" => Ok(OrderState::Holded),
            other => Err(DomainError::validation(format!("unknown order state: {other}"))),
        }
    }

    /// Closed and canceled orders never change state again.
    pub fn is_final(&self) -> bool {
        matches!(self, OrderState::Closed | OrderState::Canceled)
    }
}

/// Customer the order ships to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

/// Delivery address of the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub street: String,
    pub suburb: String,
    pub postcode: String,
    /// State/province/region code.
    pub region: String,
    /// ISO 3166-1 alpha-2.
    pub country_code: String,
    pub phone: Option<String>,
}

/// Order line as needed for parcel construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub sku: String,
    pub name: String,
    pub quantity: u32,
    /// Unit weight in the store's configured weight unit.
    pub weight: f64,
    /// Price in smallest currency unit (e.g., cents).
    pub unit_price: u64,
}

/// Audit comment appended to an order's status history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusHistoryComment {
    pub comment: String,
    pub visible_on_front: bool,
    pub created_at: DateTime<Utc>,
}

/// Input for [`SalesOrder::new`].
#[derive(Debug, Clone)]
pub struct NewSalesOrder {
    pub tenant_id: TenantId,
    pub increment_id: String,
    pub state: OrderState,
    pub customer: Customer,
    pub shipping_address: ShippingAddress,
    pub lines: Vec<OrderLine>,
    pub delivery_instructions: Option<String>,
    pub authority_to_leave: bool,
}

/// A storefront sales order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesOrder {
    id: SalesOrderId,
    tenant_id: TenantId,
    increment_id: String,
    state: OrderState,
    customer: Customer,
    shipping_address: ShippingAddress,
    lines: Vec<OrderLine>,
    delivery_instructions: Option<String>,
    authority_to_leave: bool,
    status_history: Vec<StatusHistoryComment>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SalesOrder {
    /// Create a validated order with a fresh identifier.
    pub fn new(input: NewSalesOrder) -> DomainResult<Self> {
        Self::with_id(SalesOrderId::generate(), input)
    }

    /// Create a validated order with a caller-supplied identifier.
    pub fn with_id(id: SalesOrderId, input: NewSalesOrder) -> DomainResult<Self> {
        if input.increment_id.trim().is_empty() {
            return Err(DomainError::validation("increment_id must not be empty"));
        }
        for line in &input.lines {
            validate_line(line)?;
        }

        let now = Utc::now();
        Ok(Self {
            id,
            tenant_id: input.tenant_id,
            increment_id: input.increment_id,
            state: input.state,
            customer: input.customer,
            shipping_address: input.shipping_address,
            lines: input.lines,
            delivery_instructions: input.delivery_instructions,
            authority_to_leave: input.authority_to_leave,
            status_history: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn id(&self) -> SalesOrderId {
        self.id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn increment_id(&self) -> &str {
        &self.increment_id
    }

    pub fn state(&self) -> OrderState {
        self.state
    }

    pub fn customer(&self) -> &Customer {
        &self.customer
    }

    pub fn shipping_address(&self) -> &ShippingAddress {
        &self.shipping_address
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn delivery_instructions(&self) -> Option<&str> {
        self.delivery_instructions.as_deref()
    }

    pub fn authority_to_leave(&self) -> bool {
        self.authority_to_leave
    }

    pub fn status_history(&self) -> &[StatusHistoryComment] {
        &self.status_history
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Orders in `processing` are paid and waiting to be shipped.
    pub fn is_ready_to_ship(&self) -> bool {
        self.state == OrderState::Processing
    }

    /// Total weight across all lines, in the store's weight unit.
    pub fn total_weight(&self) -> f64 {
        self.lines
            .iter()
            .map(|l| l.weight * f64::from(l.quantity))
            .sum()
    }

    /// Move the order to another processing state.
    pub fn set_state(&mut self, state: OrderState) -> DomainResult<()> {
        if self.state.is_final() && self.state != state {
            return Err(DomainError::invariant(format!(
                "order {} is {} and cannot change state",
                self.increment_id,
                self.state.as_str()
            )));
        }
        self.state = state;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Append an audit comment to the status history.
    ///
    /// History is append-only; returns a copy of the entry just added.
    pub fn add_status_history_comment(
        &mut self,
        comment: impl Into<String>,
        visible_on_front: bool,
    ) -> DomainResult<StatusHistoryComment> {
        let comment = comment.into();
        if comment.trim().is_empty() {
            return Err(DomainError::validation("comment must not be empty"));
        }

        let now = Utc::now();
        let entry = StatusHistoryComment {
            comment,
            visible_on_front,
            created_at: now,
        };
        self.status_history.push(entry.clone());
        self.updated_at = now;

        Ok(entry)
    }
}

fn validate_line(line: &OrderLine) -> DomainResult<()> {
    if line.sku.trim().is_empty() {
        return Err(DomainError::validation("line sku must not be empty"));
    }
    if line.quantity == 0 {
        return Err(DomainError::validation("quantity must be positive"));
    }
    if !line.weight.is_finite() || line.weight < 0.0 {
        return Err(DomainError::validation("weight must be a non-negative number"));
    }
    Ok(())
}
