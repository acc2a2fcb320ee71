//! reqwest-backed carrier client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use shipsync_shipping::{OrderRequest, TrackingNumber};

use super::{CarrierClient, CarrierError, CarrierResponse};

const MAX_ERROR_BODY: usize = 512;

#[derive(Serialize)]
struct SendOrderBody<'a> {
    order: &'a OrderRequest,
}

#[derive(Deserialize)]
struct SendOrderEnvelope {
    response: Option<SendOrderResult>,
}

#[derive(Deserialize)]
struct SendOrderResult {
    tracking_number: Option<String>,
}

/// Carrier client speaking the `POST {base}/orders` JSON API with a bearer key.
#[derive(Debug, Clone)]
pub struct HttpCarrierClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpCarrierClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Result<Self, CarrierError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CarrierError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(client, base_url, api_key))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    fn orders_url(&self) -> String {
        format!("{}/orders", self.base_url)
    }
}

fn map_reqwest_error(err: reqwest::Error) -> CarrierError {
    if err.is_timeout() {
        CarrierError::Timeout
    } else {
        CarrierError::Network(err.to_string())
    }
}

fn truncate(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}

#[async_trait]
impl CarrierClient for HttpCarrierClient {
    async fn send_order(&self, request: &OrderRequest) -> Result<CarrierResponse, CarrierError> {
        debug!(url = %self.orders_url(), retailer_invoice = %request.retailer_invoice, "sending order to carrier");

        let response = self
            .client
            .post(self.orders_url())
            .bearer_auth(&self.api_key)
            .json(&SendOrderBody { order: request })
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        let body = response.text().await.map_err(map_reqwest_error)?;

        if !status.is_success() {
            warn!(status = status.as_u16(), retailer_invoice = %request.retailer_invoice, "carrier rejected order");
            return Err(CarrierError::Rejected {
                status: status.as_u16(),
                body: truncate(body),
            });
        }

        let envelope: SendOrderEnvelope =
            serde_json::from_str(&body).map_err(|e| CarrierError::MalformedResponse(e.to_string()))?;
        let tracking = envelope
            .response
            .and_then(|r| r.tracking_number)
            .ok_or_else(|| CarrierError::MalformedResponse("response has no tracking_number".to_string()))?;
        let tracking_number =
            TrackingNumber::new(tracking).map_err(|_| CarrierError::MalformedResponse("empty tracking_number".to_string()))?;

        Ok(CarrierResponse { tracking_number })
    }
}
