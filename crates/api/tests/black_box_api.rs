use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::json;

use shipsync_api::app::{build_app, AppServices};
use shipsync_core::TenantId;
use shipsync_infra::{CarrierError, InMemoryCarrierClient, StaticTenantDirectory};
use shipsync_sales::SalesOrderId;
use shipsync_shipping::{SyncPolicy, TenantContext};

struct TestServer {
    base_url: String,
    carrier: Arc<InMemoryCarrierClient>,
    tenant1: TenantId,
    tenant2: TenantId,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let tenant1 = TenantId::new();
        let tenant2 = TenantId::new();
        let tenants = Arc::new(StaticTenantDirectory::new([
            TenantContext::new(tenant1, "au"),
            TenantContext::new(tenant2, "nz").with_currency("NZD"),
        ]));
        let carrier = Arc::new(InMemoryCarrierClient::new());
        let services = AppServices::in_memory(
            SyncPolicy::default().with_max_attempts(2),
            "Shippit",
            carrier.clone(),
            tenants,
        );

        // Same router as prod, bound to an ephemeral port.
        let app = build_app(services);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            carrier,
            tenant1,
            tenant2,
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn order_body(increment_id: &str, state: &str) -> serde_json::Value {
    json!({
        "increment_id": increment_id,
        "state": state,
        "customer": {"email": "sam@example.com", "first_name": "Sam", "last_name": "Lee"},
        "shipping_address": {
            "street": "1 George St",
            "suburb": "Sydney",
            "postcode": "2000",
            "region": "NSW",
            "country_code": "au",
            "phone": "0400000000"
        },
        "lines": [
            {"sku": "TEE-M", "name": "T-shirt", "quantity": 2, "weight": 0.25, "unit_price": 2500}
        ],
        "authority_to_leave": true
    })
}

async fn create_order(client: &reqwest::Client, srv: &TestServer, tenant: TenantId, increment_id: &str, state: &str) -> String {
    let res = client
        .post(srv.url("/sales/orders"))
        .header("x-tenant-id", tenant.to_string())
        .json(&order_body(increment_id, state))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: serde_json::Value = res.json().await.unwrap();
    created["id"].as_str().unwrap().to_string()
}

async fn register(client: &reqwest::Client, srv: &TestServer, tenant: TenantId, order_id: &str) -> reqwest::Response {
    client
        .post(srv.url(&format!("/shipping/orders/{order_id}/register")))
        .header("x-tenant-id", tenant.to_string())
        .send()
        .await
        .unwrap()
}

async fn sync(client: &reqwest::Client, srv: &TestServer, tenant: TenantId, order_id: &str) -> reqwest::Response {
    client
        .post(srv.url(&format!("/shipping/orders/{order_id}/sync")))
        .header("x-tenant-id", tenant.to_string())
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn health_needs_no_tenant() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(srv.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn tenant_header_is_required_and_must_be_known() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client.get(srv.url("/shipping/sync-orders")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "missing_tenant");

    let res = client
        .get(srv.url("/shipping/sync-orders"))
        .header("x-tenant-id", TenantId::new().to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "unknown_tenant");
}

#[tokio::test]
async fn register_then_sync_lifecycle() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let order_id = create_order(&client, &srv, srv.tenant1, "100000042", "processing").await;

    // Register (created), then again (existing record)
    let res = register(&client, &srv, srv.tenant1, &order_id).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let first: serde_json::Value = res.json().await.unwrap();
    assert_eq!(first["status"], "pending");
    assert_eq!(first["attempt_count"], 0);

    let res = register(&client, &srv, srv.tenant1, &order_id).await;
    assert_eq!(res.status(), StatusCode::OK);
    let second: serde_json::Value = res.json().await.unwrap();
    assert_eq!(second["id"], first["id"]);

    // Carrier failure: still pending, error notification
    srv.carrier.push_failure(CarrierError::Rejected {
        status: 422,
        body: "postcode invalid".to_string(),
    });
    let res = sync(&client, &srv, srv.tenant1, &order_id).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["synced"], false);
    assert_eq!(body["outcome"], "retrying");
    assert_eq!(body["attempt_count"], 1);
    assert_eq!(body["record"]["status"], "pending");
    assert_eq!(body["notifications"][0]["level"], "error");
    assert!(
        body["notifications"][0]["message"]
            .as_str()
            .unwrap()
            .starts_with("Order 100000042 was not synced with Shippit - ")
    );

    // Success
    srv.carrier.push_success("ABC123");
    let res = sync(&client, &srv, srv.tenant1, &order_id).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["synced"], true);
    assert_eq!(body["outcome"], "synced");
    assert_eq!(body["tracking_number"], "ABC123");
    assert_eq!(body["record"]["status"], "synced");
    assert_eq!(body["record"]["attempt_count"], 2);
    assert_eq!(body["record"]["tracking_number"], "ABC123");
    assert_eq!(body["notifications"][0]["level"], "success");
    assert_eq!(body["notifications"][0]["message"], "Order 100000042 synced with Shippit - ABC123");

    // Carrier payload built from the order
    let sent = srv.carrier.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].retailer_invoice, "100000042");
    assert_eq!(sent[1].delivery_country_code, "AU");

    // Audit comment on the order
    let res = client
        .get(srv.url(&format!("/sales/orders/{order_id}")))
        .header("x-tenant-id", srv.tenant1.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let order: serde_json::Value = res.json().await.unwrap();
    assert_eq!(order["status_history"][0]["comment"], "Order synced with Shippit - ABC123");

    // A synced record cannot be synced again
    let res = sync(&client, &srv, srv.tenant1, &order_id).await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    // Audit list
    let res = client
        .get(srv.url("/shipping/sync-orders?status=synced"))
        .header("x-tenant-id", srv.tenant1.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let list: serde_json::Value = res.json().await.unwrap();
    assert_eq!(list["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn register_rejects_unknown_and_unready_orders() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = register(&client, &srv, srv.tenant1, "not-a-uuid").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = register(&client, &srv, srv.tenant1, &SalesOrderId::generate().to_string()).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let order_id = create_order(&client, &srv, srv.tenant1, "100000043", "pending_payment").await;
    let res = register(&client, &srv, srv.tenant1, &order_id).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");
}

async fn set_state(client: &reqwest::Client, srv: &TestServer, tenant: TenantId, order_id: &str, state: &str) -> reqwest::Response {
    client
        .put(srv.url(&format!("/sales/orders/{order_id}/state")))
        .header("x-tenant-id", tenant.to_string())
        .json(&json!({ "state": state }))
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn orders_leaving_processing_drop_out_of_the_run() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let order_id = create_order(&client, &srv, srv.tenant1, "100000045", "processing").await;
    assert_eq!(register(&client, &srv, srv.tenant1, &order_id).await.status(), StatusCode::CREATED);

    let res = set_state(&client, &srv, srv.tenant1, &order_id, "complete").await;
    assert_eq!(res.status(), StatusCode::OK);
    let order: serde_json::Value = res.json().await.unwrap();
    assert_eq!(order["state"], "complete");

    let res = client
        .post(srv.url("/shipping/sync"))
        .header("x-tenant-id", srv.tenant1.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let summary: serde_json::Value = res.json().await.unwrap();
    assert_eq!(summary["attempted"], 0);
    assert!(srv.carrier.sent().is_empty());

    assert_eq!(set_state(&client, &srv, srv.tenant1, &order_id, "canceled").await.status(), StatusCode::OK);
    let res = set_state(&client, &srv, srv.tenant1, &order_id, "processing").await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invariant_violation");

    let res = set_state(&client, &srv, srv.tenant2, &order_id, "canceled").await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = set_state(&client, &srv, srv.tenant1, &SalesOrderId::generate().to_string(), "canceled").await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn run_all_syncs_every_tenant_and_respects_the_attempt_limit() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let au = create_order(&client, &srv, srv.tenant1, "AU-1", "processing").await;
    let nz = create_order(&client, &srv, srv.tenant2, "NZ-1", "processing").await;
    assert_eq!(register(&client, &srv, srv.tenant1, &au).await.status(), StatusCode::CREATED);
    assert_eq!(register(&client, &srv, srv.tenant2, &nz).await.status(), StatusCode::CREATED);

    // max_attempts = 2: two failing runs leave both records at the limit.
    for _ in 0..4 {
        srv.carrier.push_failure(CarrierError::Timeout);
    }

    // Any known tenant can trigger the run; it covers all tenants.
    let res = client
        .post(srv.url("/shipping/sync"))
        .header("x-tenant-id", srv.tenant1.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let summary: serde_json::Value = res.json().await.unwrap();
    assert_eq!(summary["tenants"], 2);
    assert_eq!(summary["attempted"], 2);
    assert_eq!(summary["retrying"], 2);

    let res = client
        .post(srv.url("/shipping/sync"))
        .header("x-tenant-id", srv.tenant1.to_string())
        .send()
        .await
        .unwrap();
    let summary: serde_json::Value = res.json().await.unwrap();
    assert_eq!(summary["attempted"], 2);

    // Both records sit at attempt_count == max: no longer eligible.
    let res = client
        .post(srv.url("/shipping/sync"))
        .header("x-tenant-id", srv.tenant1.to_string())
        .send()
        .await
        .unwrap();
    let summary: serde_json::Value = res.json().await.unwrap();
    assert_eq!(summary["attempted"], 0);
    assert_eq!(srv.carrier.sent().len(), 4);

    // Unknown tenant cannot trigger anything.
    let res = client
        .post(srv.url("/shipping/sync"))
        .header("x-tenant-id", TenantId::new().to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .get(srv.url("/shipping/sync-orders?status=pending"))
        .header("x-tenant-id", srv.tenant2.to_string())
        .send()
        .await
        .unwrap();
    let list: serde_json::Value = res.json().await.unwrap();
    assert_eq!(list["items"][0]["attempt_count"], 2);
}

#[tokio::test]
async fn tenant_isolation_blocks_cross_tenant_access() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let order_id = create_order(&client, &srv, srv.tenant1, "100000044", "processing").await;

    let res = register(&client, &srv, srv.tenant2, &order_id).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .get(srv.url(&format!("/sales/orders/{order_id}")))
        .header("x-tenant-id", srv.tenant2.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    assert_eq!(register(&client, &srv, srv.tenant1, &order_id).await.status(), StatusCode::CREATED);
    let res = sync(&client, &srv, srv.tenant2, &order_id).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert!(srv.carrier.sent().is_empty());
}
