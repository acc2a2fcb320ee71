//! Carrier API client: submit an order, receive a tracking number.

mod http;
mod in_memory;

use std::sync::Arc;

use async_trait::async_trait;

use shipsync_shipping::{OrderRequest, TrackingNumber};

pub use http::HttpCarrierClient;
pub use in_memory::InMemoryCarrierClient;

/// Successful carrier submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarrierResponse {
    pub tracking_number: TrackingNumber,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CarrierError {
    #[error("carrier request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("carrier rejected the order (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("malformed carrier response: {0}")]
    MalformedResponse(String),
}

impl CarrierError {
    /// Whether a later attempt could plausibly succeed without changing the order.
    pub fn is_retryable(&self) -> bool {
        match self {
            CarrierError::Timeout | CarrierError::Network(_) => true,
            CarrierError::Rejected { status, .. } => *status == 429 || *status >= 500,
            CarrierError::MalformedResponse(_) => false,
        }
    }
}

#[async_trait]
pub trait CarrierClient: Send + Sync {
    /// Submit one order. A single call; retries are the sync policy's job.
    async fn send_order(&self, request: &OrderRequest) -> Result<CarrierResponse, CarrierError>;
}

#[async_trait]
impl<C> CarrierClient for Arc<C>
where
    C: CarrierClient + ?Sized,
{
    async fn send_order(&self, request: &OrderRequest) -> Result<CarrierResponse, CarrierError> {
        (**self).send_order(request).await
    }
}
