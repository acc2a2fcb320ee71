use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use shipsync_shipping::{OrderRequest, TrackingNumber};

use super::{CarrierClient, CarrierError, CarrierResponse};

/// Scripted carrier for tests/dev.
///
/// Queued outcomes are consumed first; once the queue is empty every call
/// succeeds with a generated `MEM-<n>` tracking number.
#[derive(Debug, Default)]
pub struct InMemoryCarrierClient {
    script: Mutex<VecDeque<Result<String, CarrierError>>>,
    sent: Mutex<Vec<OrderRequest>>,
    counter: AtomicU64,
}

impl InMemoryCarrierClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response with this tracking number.
    pub fn push_success(&self, tracking_number: impl Into<String>) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Ok(tracking_number.into()));
        }
    }

    /// Queue a failure.
    pub fn push_failure(&self, error: CarrierError) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Err(error));
        }
    }

    /// Requests received so far, in order.
    pub fn sent(&self) -> Vec<OrderRequest> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CarrierClient for InMemoryCarrierClient {
    async fn send_order(&self, request: &OrderRequest) -> Result<CarrierResponse, CarrierError> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(request.clone());
        }

        let scripted = self.script.lock().ok().and_then(|mut s| s.pop_front());
        let tracking = match scripted {
            Some(outcome) => outcome?,
            None => format!("MEM-{}", self.counter.fetch_add(1, Ordering::SeqCst) + 1),
        };

        let tracking_number = TrackingNumber::new(tracking)
            .map_err(|_| CarrierError::MalformedResponse("empty tracking_number".to_string()))?;
        Ok(CarrierResponse { tracking_number })
    }
}
