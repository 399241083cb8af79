use fieldkit_api::config::ApiConfig;
use fieldkit_core::TenantId;
use reqwest::StatusCode;
use rust_decimal_macros::dec;
use serde_json::json;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(config: ApiConfig) -> Self {
        // Same router as prod, bound to an ephemeral port.
        let app = fieldkit_api::app::build_app(config).await;
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    async fn spawn_default() -> Self {
        Self::spawn(ApiConfig {
            reorder_buffer_quantity: dec!(2),
            ..ApiConfig::default()
        })
        .await
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn get_json_eventually(
    client: &reqwest::Client,
    url: &str,
    tenant_id: TenantId,
    ready: impl Fn(&serde_json::Value) -> bool,
) -> serde_json::Value {
    // The API is eventually consistent (command path vs projection update);
    // poll briefly until the projection catches up.
    for _ in 0..100 {
        let res = client
            .get(url)
            .header("x-tenant-id", tenant_id.to_string())
            .send()
            .await
            .unwrap();

        if res.status() == StatusCode::OK {
            let body: serde_json::Value = res.json().await.unwrap();
            if ready(&body) {
                return body;
            }
        }

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    panic!("projection did not catch up within timeout for {url}");
}

async fn stock_item(
    client: &reqwest::Client,
    base_url: &str,
    tenant_id: TenantId,
    kit_id: &str,
    box_id: &str,
    part_number: &str,
    quantity: i64,
    minimum: Option<i64>,
) -> reqwest::Response {
    client
        .post(format!("{}/api/kits/{}/items", base_url, kit_id))
        .header("x-tenant-id", tenant_id.to_string())
        .json(&json!({
            "box_id": box_id,
            "part_number": part_number,
            "description": "test part",
            "item_type": "expendable",
            "quantity": quantity,
            "minimum_stock_level": minimum,
        }))
        .send()
        .await
        .unwrap()
}

fn new_id() -> String {
    fieldkit_core::AggregateId::new().to_string()
}

#[tokio::test]
async fn tenant_header_is_required() {
    let srv = TestServer::spawn_default().await;

    let client = reqwest::Client::new();
    let res = client
        .get(format!("{}/api/tools", srv.base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(format!("{}/api/tools", srv.base_url))
        .header("x-tenant-id", "not-a-uuid")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn_default().await;

    let client = reqwest::Client::new();
    let res = client
        .get(format!("{}/health", srv.base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn kit_item_lifecycle_stock_issue_query() {
    let srv = TestServer::spawn_default().await;
    let tenant_id = TenantId::new();
    let client = reqwest::Client::new();

    let kit_id = new_id();
    let box_id = new_id();

    let res = stock_item(&client, &srv.base_url, tenant_id, &kit_id, &box_id, "PN-100", 5, Some(3)).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: serde_json::Value = res.json().await.unwrap();
    let item_id = created["id"].as_str().unwrap().to_string();

    let item = get_json_eventually(
        &client,
        &format!("{}/api/kit-items/{}", srv.base_url, item_id),
        tenant_id,
        |_| true,
    )
    .await;
    assert_eq!(item["part_number"], "PN-100");
    assert_eq!(item["stock_status"], "available");

    let res = client
        .post(format!("{}/api/kit-items/{}/issue", srv.base_url, item_id))
        .header("x-tenant-id", tenant_id.to_string())
        .json(&json!({ "quantity": 3 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let item = get_json_eventually(
        &client,
        &format!("{}/api/kit-items/{}", srv.base_url, item_id),
        tenant_id,
        |v| v["quantity"] == "2",
    )
    .await;
    assert_eq!(item["stock_status"], "low_stock");

    // Over-issue is rejected deterministically.
    let res = client
        .post(format!("{}/api/kit-items/{}/issue", srv.base_url, item_id))
        .header("x-tenant-id", tenant_id.to_string())
        .json(&json!({ "quantity": 10 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "insufficient_stock");
}

#[tokio::test]
async fn duplicate_part_in_same_box_is_rejected() {
    let srv = TestServer::spawn_default().await;
    let tenant_id = TenantId::new();
    let client = reqwest::Client::new();

    let kit_id = new_id();
    let box_id = new_id();

    let res = stock_item(&client, &srv.base_url, tenant_id, &kit_id, &box_id, "PN-DUP", 1, None).await;
    assert_eq!(res.status(), StatusCode::CREATED);

    // Wait for the read model so the guard can see the first row.
    get_json_eventually(
        &client,
        &format!("{}/api/kits/{}/items", srv.base_url, kit_id),
        tenant_id,
        |v| v.as_array().is_some_and(|a| a.len() == 1),
    )
    .await;

    let res = stock_item(&client, &srv.base_url, tenant_id, &kit_id, &box_id, "PN-DUP", 1, None).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "duplicate_part");
}

#[tokio::test]
async fn low_stock_issue_opens_an_automatic_reorder() {
    let srv = TestServer::spawn_default().await;
    let tenant_id = TenantId::new();
    let client = reqwest::Client::new();

    let kit_id = new_id();
    let box_id = new_id();

    let res = stock_item(&client, &srv.base_url, tenant_id, &kit_id, &box_id, "PN-AUTO", 5, Some(3)).await;
    let created: serde_json::Value = res.json().await.unwrap();
    let item_id = created["id"].as_str().unwrap().to_string();

    // 5 -> 2 crosses the minimum of 3.
    let res = client
        .post(format!("{}/api/kit-items/{}/issue", srv.base_url, item_id))
        .header("x-tenant-id", tenant_id.to_string())
        .json(&json!({ "quantity": 3 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let requests = get_json_eventually(
        &client,
        &format!("{}/api/reorder-requests?kit_id={}", srv.base_url, kit_id),
        tenant_id,
        |v| v.as_array().is_some_and(|a| !a.is_empty()),
    )
    .await;

    let request = &requests.as_array().unwrap()[0];
    assert_eq!(request["is_automatic"], true);
    assert_eq!(request["status"], "pending");
    assert_eq!(request["part_number"], "PN-AUTO");
    // Shortfall 1 plus the configured buffer of 2.
    assert_eq!(request["quantity_requested"], "3");

    // The pending automatic request shows up in the alert feed alongside
    // the low stock alert itself.
    let alerts = get_json_eventually(
        &client,
        &format!("{}/api/alerts", srv.base_url),
        tenant_id,
        |v| {
            v.as_array().is_some_and(|a| {
                a.iter().any(|x| x["kind"] == "pending_reorder")
                    && a.iter().any(|x| x["kind"] == "low_stock")
            })
        },
    )
    .await;
    assert!(alerts.as_array().unwrap().len() >= 2);
}

#[tokio::test]
async fn manual_reorder_full_lifecycle() {
    let srv = TestServer::spawn_default().await;
    let tenant_id = TenantId::new();
    let client = reqwest::Client::new();

    let kit_id = new_id();
    let box_id = new_id();
    let approver = new_id();

    let res = client
        .post(format!("{}/api/kits/{}/reorder", srv.base_url, kit_id))
        .header("x-tenant-id", tenant_id.to_string())
        .json(&json!({
            "part_number": "PN-MANUAL",
            "description": "ordered by hand",
            "item_type": "expendable",
            "quantity_requested": 4,
            "priority": "high",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: serde_json::Value = res.json().await.unwrap();
    let request_id = created["id"].as_str().unwrap().to_string();

    // Fulfilling before the request is ordered is rejected.
    let res = client
        .put(format!(
            "{}/api/reorder-requests/{}/fulfill",
            srv.base_url, request_id
        ))
        .header("x-tenant-id", tenant_id.to_string())
        .json(&json!({ "destination_box_id": box_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = client
        .put(format!(
            "{}/api/reorder-requests/{}/approve",
            srv.base_url, request_id
        ))
        .header("x-tenant-id", tenant_id.to_string())
        .json(&json!({ "approved_by": approver }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .put(format!(
            "{}/api/reorder-requests/{}/order",
            srv.base_url, request_id
        ))
        .header("x-tenant-id", tenant_id.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .put(format!(
            "{}/api/reorder-requests/{}/fulfill",
            srv.base_url, request_id
        ))
        .header("x-tenant-id", tenant_id.to_string())
        .json(&json!({ "destination_box_id": box_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let request = get_json_eventually(
        &client,
        &format!("{}/api/reorder-requests/{}", srv.base_url, request_id),
        tenant_id,
        |v| v["status"] == "fulfilled",
    )
    .await;
    assert!(request["item_id"].is_string());

    // The fulfillment created a kit item holding the delivered quantity.
    let items = get_json_eventually(
        &client,
        &format!("{}/api/kits/{}/items", srv.base_url, kit_id),
        tenant_id,
        |v| v.as_array().is_some_and(|a| a.len() == 1),
    )
    .await;
    assert_eq!(items[0]["part_number"], "PN-MANUAL");
    assert_eq!(items[0]["quantity"], "4");
}

#[tokio::test]
async fn tool_checkout_and_checkin_flow() {
    let srv = TestServer::spawn_default().await;
    let tenant_id = TenantId::new();
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/api/tools", srv.base_url))
        .header("x-tenant-id", tenant_id.to_string())
        .json(&json!({
            "name": "Torque wrench",
            "serial_number": "TW-001",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: serde_json::Value = res.json().await.unwrap();
    let tool_id = created["id"].as_str().unwrap().to_string();

    let res = client
        .post(format!("{}/api/tool-checkout", srv.base_url))
        .header("x-tenant-id", tenant_id.to_string())
        .json(&json!({
            "tool_id": tool_id,
            "user_id": new_id(),
            "condition_at_checkout": "good",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let checkout: serde_json::Value = res.json().await.unwrap();
    let checkout_id = checkout["checkout_id"].as_str().unwrap().to_string();

    // A second checkout of the same tool is rejected.
    let res = client
        .post(format!("{}/api/tool-checkout", srv.base_url))
        .header("x-tenant-id", tenant_id.to_string())
        .json(&json!({
            "tool_id": tool_id,
            "user_id": new_id(),
            "condition_at_checkout": "good",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "tool_unavailable");

    let availability = get_json_eventually(
        &client,
        &format!("{}/api/tools/{}/availability", srv.base_url, tool_id),
        tenant_id,
        |v| v["available"] == false,
    )
    .await;
    assert_eq!(availability["status"], "checked_out");

    // Checkin routes through the checkout index; poll until it has the row.
    let mut checked_in = false;
    for _ in 0..100 {
        let res = client
            .post(format!(
                "{}/api/tool-checkout/{}/checkin",
                srv.base_url, checkout_id
            ))
            .header("x-tenant-id", tenant_id.to_string())
            .json(&json!({ "condition_at_return": "good" }))
            .send()
            .await
            .unwrap();
        if res.status() == StatusCode::OK {
            checked_in = true;
            break;
        }
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(checked_in, "checkin never succeeded");

    get_json_eventually(
        &client,
        &format!("{}/api/tools/{}/availability", srv.base_url, tool_id),
        tenant_id,
        |v| v["available"] == true,
    )
    .await;
}

#[tokio::test]
async fn damage_report_requires_severity_and_forces_maintenance() {
    let srv = TestServer::spawn_default().await;
    let tenant_id = TenantId::new();
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/api/tools", srv.base_url))
        .header("x-tenant-id", tenant_id.to_string())
        .json(&json!({ "name": "Multimeter", "serial_number": "MM-7" }))
        .send()
        .await
        .unwrap();
    let tool_id: String = res.json::<serde_json::Value>().await.unwrap()["id"]
        .as_str()
        .unwrap()
        .to_string();

    let res = client
        .post(format!("{}/api/tool-checkout", srv.base_url))
        .header("x-tenant-id", tenant_id.to_string())
        .json(&json!({
            "tool_id": tool_id,
            "user_id": new_id(),
            "condition_at_checkout": "good",
        }))
        .send()
        .await
        .unwrap();
    let checkout_id: String = res.json::<serde_json::Value>().await.unwrap()["checkout_id"]
        .as_str()
        .unwrap()
        .to_string();

    // Wait for the checkout index before exercising checkin.
    get_json_eventually(
        &client,
        &format!("{}/api/tools/{}/availability", srv.base_url, tool_id),
        tenant_id,
        |v| v["available"] == false,
    )
    .await;

    let res = client
        .post(format!(
            "{}/api/tool-checkout/{}/checkin",
            srv.base_url, checkout_id
        ))
        .header("x-tenant-id", tenant_id.to_string())
        .json(&json!({ "damage_reported": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "damage_severity_required");

    let res = client
        .post(format!(
            "{}/api/tool-checkout/{}/checkin",
            srv.base_url, checkout_id
        ))
        .header("x-tenant-id", tenant_id.to_string())
        .json(&json!({ "damage_reported": true, "damage_severity": "severe" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    get_json_eventually(
        &client,
        &format!("{}/api/tools/{}/availability", srv.base_url, tool_id),
        tenant_id,
        |v| v["status"] == "maintenance",
    )
    .await;

    let res = client
        .post(format!(
            "{}/api/tools/{}/return-to-service",
            srv.base_url, tool_id
        ))
        .header("x-tenant-id", tenant_id.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    get_json_eventually(
        &client,
        &format!("{}/api/tools/{}/availability", srv.base_url, tool_id),
        tenant_id,
        |v| v["available"] == true,
    )
    .await;
}

#[tokio::test]
async fn tenants_are_isolated() {
    let srv = TestServer::spawn_default().await;
    let tenant_a = TenantId::new();
    let tenant_b = TenantId::new();
    let client = reqwest::Client::new();

    let kit_id = new_id();
    let box_id = new_id();

    let res = stock_item(&client, &srv.base_url, tenant_a, &kit_id, &box_id, "PN-ISO", 1, None).await;
    let item_id: String = res.json::<serde_json::Value>().await.unwrap()["id"]
        .as_str()
        .unwrap()
        .to_string();

    get_json_eventually(
        &client,
        &format!("{}/api/kit-items/{}", srv.base_url, item_id),
        tenant_a,
        |_| true,
    )
    .await;

    let res = client
        .get(format!("{}/api/kit-items/{}", srv.base_url, item_id))
        .header("x-tenant-id", tenant_b.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn warehouse_receipts_accumulate_per_part() {
    let srv = TestServer::spawn_default().await;
    let tenant_id = TenantId::new();
    let client = reqwest::Client::new();

    let warehouse_id = new_id();

    for _ in 0..2 {
        let res = client
            .post(format!("{}/api/warehouse-stock", srv.base_url))
            .header("x-tenant-id", tenant_id.to_string())
            .json(&json!({
                "warehouse_id": warehouse_id,
                "part_number": "CHEM-9",
                "quantity": 10,
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);

        // Let the projection land so the second receipt reuses the stream.
        get_json_eventually(
            &client,
            &format!("{}/api/warehouse-stock", srv.base_url),
            tenant_id,
            |v| v.as_array().is_some_and(|a| !a.is_empty()),
        )
        .await;
    }

    let rows = get_json_eventually(
        &client,
        &format!("{}/api/warehouse-stock", srv.base_url),
        tenant_id,
        |v| v.as_array().is_some_and(|a| a.len() == 1 && a[0]["quantity"] == "20"),
    )
    .await;
    assert_eq!(rows[0]["part_number"], "CHEM-9");
}
