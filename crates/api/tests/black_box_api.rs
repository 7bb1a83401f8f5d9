use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use procureflow_api::app::{build_app, services::AppServices};
use procureflow_approvals::AuthorizationMatrix;
use reqwest::StatusCode;
use serde_json::{json, Value};
use uuid::Uuid;

struct TestServer {
    base_url: String,
    services: Arc<AppServices>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, bound to an ephemeral port.
        let services = Arc::new(
            AppServices::in_memory(AuthorizationMatrix::default()).expect("failed to start services"),
        );
        let app = build_app(services.clone());
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
            services,
            handle,
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
        self.services.shutdown();
    }
}

/// A caller identified by the upstream headers.
#[derive(Clone)]
struct User {
    id: String,
    name: String,
    roles: String,
}

impl User {
    fn new(name: &str, roles: &str) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            name: name.to_string(),
            roles: roles.to_string(),
        }
    }
}

struct Api {
    client: reqwest::Client,
    base_url: String,
}

impl Api {
    fn new(srv: &TestServer) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: format!("{}/api", srv.base_url),
        }
    }

    fn request(&self, method: reqwest::Method, user: &User, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .header("X-User-Id", &user.id)
            .header("X-User-Name", &user.name)
            .header("X-User-Roles", &user.roles)
    }

    async fn get(&self, user: &User, path: &str) -> (StatusCode, Value) {
        let res = self.request(reqwest::Method::GET, user, path).send().await.unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }

    async fn post(&self, user: &User, path: &str, body: Value) -> (StatusCode, Value) {
        let res = self
            .request(reqwest::Method::POST, user, path)
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }

    async fn put(&self, user: &User, path: &str, body: Value) -> (StatusCode, Value) {
        let res = self
            .request(reqwest::Method::PUT, user, path)
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }

    /// POST `body` verbatim; `content_type` of `None` sends no header.
    async fn post_raw(&self, user: &User, path: &str, body: &'static str, content_type: Option<&str>) -> StatusCode {
        let mut req = self.request(reqwest::Method::POST, user, path).body(body);
        if let Some(content_type) = content_type {
            req = req.header("Content-Type", content_type);
        }
        req.send().await.unwrap().status()
    }

    /// Poll `path` until `check` accepts the body. Read models and the
    /// procurement flow are updated asynchronously after each command.
    async fn eventually(&self, user: &User, path: &str, check: impl Fn(&Value) -> bool) -> Value {
        for _ in 0..200 {
            let (status, body) = self.get(user, path).await;
            if status == StatusCode::OK && check(&body) {
                return body;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("{path} did not reach the expected state within timeout");
    }

    async fn mr_status(&self, user: &User, mr_id: &str, expected: &str) -> Value {
        self.eventually(user, &format!("/mrs/{mr_id}"), |mr| mr["status"] == expected)
            .await
    }
}

fn id_of(body: &Value) -> String {
    body["id"].as_str().expect("response has an id").to_string()
}

async fn register_supplier(api: &Api, buyer: &User, code: &str) -> String {
    let (status, body) = api
        .post(
            buyer,
            "/suppliers",
            json!({ "code": code, "name": format!("{code} Trading"), "email": "sales@example.com" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    id_of(&body)
}

/// Submitted MR with an RFQ sent to every supplier and one quote per
/// `(supplier, unit price)`; returns the MR, RFQ and quote ids once the MR
/// has reached `quotes_received`.
async fn quoted_request(
    api: &Api,
    requester: &User,
    buyer: &User,
    offers: &[(&str, u64)],
) -> (String, String, Vec<String>) {
    let (status, mr) = api
        .post(
            requester,
            "/mrs",
            json!({
                "title": "Safety boots",
                "department": "ops",
                "required_by": (Utc::now() + ChronoDuration::days(20)).date_naive(),
                "lines": [{ "description": "Boots size 42", "quantity": 4, "unit": "pair" }]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{mr}");
    let mr_id = id_of(&mr);
    api.post(requester, &format!("/mrs/{mr_id}/submit"), json!({})).await;

    let supplier_ids: Vec<&str> = offers.iter().map(|(supplier, _)| *supplier).collect();
    let (status, rfq) = api
        .post(
            buyer,
            "/rfqs",
            json!({
                "mr_id": mr_id,
                "supplier_ids": supplier_ids,
                "response_due": Utc::now() + ChronoDuration::days(5)
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{rfq}");
    let rfq_id = id_of(&rfq);
    api.post(buyer, &format!("/rfqs/{rfq_id}/send"), json!({})).await;

    let mut quote_ids = Vec::new();
    for (supplier, unit_price_minor) in offers {
        let (status, quote) = api
            .post(
                buyer,
                "/quotes",
                json!({
                    "rfq_id": rfq_id,
                    "supplier_id": supplier,
                    "currency": "USD",
                    "valid_until": (Utc::now() + ChronoDuration::days(10)).date_naive(),
                    "lines": [{ "description": "Boots size 42", "quantity": 4, "unit_price_minor": unit_price_minor }]
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{quote}");
        quote_ids.push(id_of(&quote));
    }
    api.mr_status(requester, &mr_id, "quotes_received").await;
    (mr_id, rfq_id, quote_ids)
}

#[tokio::test]
async fn identity_required_for_api_endpoints() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/api/whoami", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(format!("{}/api/whoami", srv.base_url))
        .header("X-User-Id", "not-a-uuid")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client.get(format!("{}/health", srv.base_url)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn whoami_reflects_identity_headers() {
    let srv = TestServer::spawn().await;
    let api = Api::new(&srv);
    let buyer = User::new("Bea Buyer", "Buyer, requester");

    let (status, body) = api.get(&buyer, "/whoami").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], buyer.id.as_str());
    assert_eq!(body["name"], "Bea Buyer");
    let roles = body["roles"].as_array().unwrap();
    assert!(roles.iter().any(|r| r == "buyer"));
    assert!(roles.iter().any(|r| r == "requester"));
    let permissions = body["permissions"].as_array().unwrap();
    assert!(permissions.iter().any(|p| p == "rfqs.manage"));
    assert!(permissions.iter().any(|p| p == "mrs.create"));
}

#[tokio::test]
async fn request_errors_map_to_status_codes() {
    let srv = TestServer::spawn().await;
    let api = Api::new(&srv);
    let buyer = User::new("buyer", "buyer");
    let requester = User::new("requester", "requester");

    // Missing required field.
    let (status, body) = api.post(&buyer, "/suppliers", json!({ "code": "ACME" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    // Malformed id.
    let (status, body) = api.get(&buyer, "/mrs/not-an-id").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_id");

    // Unknown id.
    let (status, _) = api.get(&buyer, &format!("/rfqs/{}", Uuid::now_v7())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Unknown status filter.
    let (status, _) = api.get(&buyer, "/prs?status=shipped").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = api.get(&buyer, "/quote-approvals?status=shipped").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, body) = api.get(&buyer, "/quote-approvals?status=pending").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());

    // Requesters cannot manage suppliers.
    let (status, body) = api
        .post(&requester, "/suppliers", json!({ "code": "ACME", "name": "Acme" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");
}

#[tokio::test]
async fn duplicate_supplier_code_is_a_conflict() {
    let srv = TestServer::spawn().await;
    let api = Api::new(&srv);
    let buyer = User::new("buyer", "buyer");

    register_supplier(&api, &buyer, "ACME").await;
    api.eventually(&buyer, "/suppliers", |list| {
        list.as_array().is_some_and(|l| l.iter().any(|s| s["code"] == "ACME"))
    })
    .await;

    let (status, body) = api
        .post(&buyer, "/suppliers", json!({ "code": " acme ", "name": "Other Acme" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");
}

#[tokio::test]
async fn inactive_supplier_cannot_be_invited() {
    let srv = TestServer::spawn().await;
    let api = Api::new(&srv);
    let buyer = User::new("buyer", "buyer");
    let requester = User::new("requester", "requester");

    let supplier_id = register_supplier(&api, &buyer, "GONE").await;
    let (status, body) = api
        .post(&buyer, &format!("/suppliers/{supplier_id}/deactivate"), json!({ "reason": "closed" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "inactive");

    let (_, mr) = api
        .post(
            &requester,
            "/mrs",
            json!({
                "title": "Cables",
                "department": "ops",
                "required_by": (Utc::now() + ChronoDuration::days(30)).date_naive(),
                "lines": [{ "description": "Cat6 cable", "quantity": 100, "unit": "m" }]
            }),
        )
        .await;
    let mr_id = id_of(&mr);
    api.post(&requester, &format!("/mrs/{mr_id}/submit"), json!({})).await;

    let (status, _) = api
        .post(
            &buyer,
            "/rfqs",
            json!({
                "mr_id": mr_id,
                "supplier_ids": [supplier_id],
                "response_due": Utc::now() + ChronoDuration::days(7)
            }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn authorization_matrix_can_be_read_replaced_and_resolved() {
    let srv = TestServer::spawn().await;
    let api = Api::new(&srv);
    let admin = User::new("admin", "admin");
    let buyer = User::new("buyer", "buyer");

    let (status, matrix) = api.get(&buyer, "/authorization-matrix").await;
    assert_eq!(status, StatusCode::OK);
    assert!(!matrix["rules"].as_array().unwrap().is_empty());

    let replacement = json!({
        "rules": [
            {
                "document_type": "purchase_requisition",
                "department": "it",
                "min_amount_minor": 0,
                "levels": ["director"]
            },
            {
                "document_type": "purchase_requisition",
                "min_amount_minor": 0,
                "levels": ["procurement_manager"]
            },
            {
                "document_type": "quote_approval",
                "min_amount_minor": 0,
                "levels": ["procurement_manager"]
            }
        ]
    });

    let (status, _) = api.put(&buyer, "/authorization-matrix", replacement.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = api.put(&admin, "/authorization-matrix", replacement).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["rules"].as_array().unwrap().len(), 3);

    let (status, resolved) = api
        .post(
            &buyer,
            "/authorization-matrix/resolve",
            json!({ "document_type": "purchase_requisition", "department": "it", "amount_minor": 5_000 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resolved["levels"], json!(["director"]));

    let (_, resolved) = api
        .post(
            &buyer,
            "/authorization-matrix/resolve",
            json!({ "document_type": "purchase_requisition", "department": "ops", "amount_minor": 5_000 }),
        )
        .await;
    assert_eq!(resolved["levels"], json!(["procurement_manager"]));

    // A rule without levels is rejected and the previous matrix stays.
    let (status, _) = api
        .put(
            &admin,
            "/authorization-matrix",
            json!({ "rules": [{ "document_type": "quote_approval", "min_amount_minor": 0, "levels": [] }] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (_, matrix) = api.get(&buyer, "/authorization-matrix").await;
    assert_eq!(matrix["rules"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn material_request_to_fulfilled_purchase_order() {
    let srv = TestServer::spawn().await;
    let api = Api::new(&srv);

    let requester = User::new("Rita Requester", "requester");
    let buyer = User::new("Bob Buyer", "buyer");
    let pm = User::new("Paula Manager", "procurement_manager");
    let director = User::new("Dan Director", "director");
    let finance = User::new("Fiona Finance", "finance_manager");

    let acme = register_supplier(&api, &buyer, "ACME").await;
    let globex = register_supplier(&api, &buyer, "GLOBEX").await;

    // Material request.
    let (status, mr) = api
        .post(
            &requester,
            "/mrs",
            json!({
                "title": "Site laptops",
                "department": "engineering",
                "required_by": (Utc::now() + ChronoDuration::days(30)).date_naive(),
                "priority": "high",
                "lines": [{ "description": "Laptop 14in", "quantity": 2, "unit": "pcs" }]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{mr}");
    assert_eq!(mr["status"], "draft");
    assert!(mr["mr_number"].as_str().unwrap().starts_with("MR-"));
    let mr_id = id_of(&mr);

    let (status, mr) = api.post(&requester, &format!("/mrs/{mr_id}/submit"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mr["status"], "submitted");

    // RFQ to ACME, then GLOBEX invited before sending.
    let (status, rfq) = api
        .post(
            &buyer,
            "/rfqs",
            json!({
                "mr_id": mr_id,
                "supplier_ids": [acme],
                "response_due": Utc::now() + ChronoDuration::days(7)
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{rfq}");
    assert_eq!(rfq["title"], "Site laptops");
    let rfq_id = id_of(&rfq);

    let (status, _) = api
        .post(&buyer, &format!("/rfqs/{rfq_id}/suppliers"), json!({ "supplier_id": globex }))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, rfq) = api.post(&buyer, &format!("/rfqs/{rfq_id}/send"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rfq["status"], "sent");
    api.mr_status(&requester, &mr_id, "rfq_sent").await;

    // Quotes: ACME is cheaper (2 x 40,000.00), GLOBEX is faster.
    let valid_until = (Utc::now() + ChronoDuration::days(14)).date_naive();
    let (status, acme_quote) = api
        .post(
            &buyer,
            "/quotes",
            json!({
                "rfq_id": rfq_id,
                "supplier_id": acme,
                "currency": "usd",
                "valid_until": valid_until,
                "lines": [{ "description": "Laptop 14in", "quantity": 2, "unit_price_minor": 4_000_000, "lead_time_days": 10 }]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{acme_quote}");
    let acme_quote_id = id_of(&acme_quote);
    assert_eq!(acme_quote["total"]["amount_minor"], 8_000_000);

    let (status, globex_quote) = api
        .post(
            &buyer,
            "/quotes",
            json!({
                "rfq_id": rfq_id,
                "supplier_id": globex,
                "currency": "USD",
                "valid_until": valid_until,
                "lines": [{ "description": "Laptop 14in", "quantity": 2, "unit_price_minor": 4_500_000, "lead_time_days": 3 }]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{globex_quote}");
    let globex_quote_id = id_of(&globex_quote);

    // One quote per supplier.
    let (status, _) = api
        .post(
            &buyer,
            "/quotes",
            json!({
                "rfq_id": rfq_id,
                "supplier_id": acme,
                "currency": "USD",
                "valid_until": valid_until,
                "lines": [{ "description": "Laptop 14in", "quantity": 2, "unit_price_minor": 3_900_000 }]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    api.mr_status(&requester, &mr_id, "quotes_received").await;

    // Quote pack and comparison.
    let (status, pack) = api.post(&buyer, &format!("/rfqs/{rfq_id}/quote-pack"), json!({})).await;
    assert_eq!(status, StatusCode::CREATED, "{pack}");
    let pack_id = id_of(&pack);
    assert_eq!(pack["entries"].as_array().unwrap().len(), 2);
    assert_eq!(pack["comparison"]["lowest_total"], acme_quote_id.as_str());
    assert_eq!(pack["comparison"]["fastest"], globex_quote_id.as_str());
    assert_eq!(pack["comparison"]["ranked"][0]["rank"], 1);
    assert_eq!(pack["comparison"]["ranked"][1]["delta_to_lowest_minor"], 1_000_000);

    // Quote approval: 80,000.00 routes through procurement manager, then director.
    let (status, approval) = api
        .post(
            &buyer,
            &format!("/quote-packs/{pack_id}/approval"),
            json!({ "quote_id": acme_quote_id }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{approval}");
    let approval_id = id_of(&approval);
    assert_eq!(approval["status"], "pending");
    assert_eq!(approval["chain"]["levels"].as_array().unwrap().len(), 2);

    // The pack is locked while the approval is pending.
    let (status, _) = api
        .post(&buyer, &format!("/quotes/{acme_quote_id}/withdraw"), json!({}))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    // Director cannot decide level 1.
    let (status, _) = api
        .post(&director, &format!("/quote-approvals/{approval_id}/approve"), json!({}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let pending = api
        .eventually(&pm, "/approvals/pending", |items| {
            items.as_array().is_some_and(|l| l.iter().any(|i| i["document_id"] == approval_id.as_str()))
        })
        .await;
    assert_eq!(pending[0]["document_type"], "quote_approval");

    let (status, approval) = api
        .post(
            &pm,
            &format!("/quote-approvals/{approval_id}/approve"),
            json!({ "comment": "cheapest compliant offer" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{approval}");
    assert_eq!(approval["status"], "pending");

    let (status, approval) = api
        .post(&director, &format!("/quote-approvals/{approval_id}/approve"), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK, "{approval}");
    assert_eq!(approval["status"], "approved");

    api.mr_status(&requester, &mr_id, "quote_approved").await;
    api.eventually(&buyer, &format!("/quotes/{acme_quote_id}"), |q| q["status"] == "accepted")
        .await;
    api.eventually(&buyer, &format!("/quotes/{globex_quote_id}"), |q| q["status"] == "rejected")
        .await;

    // Requisition created by the flow: 80,000.00 needs procurement manager and finance.
    let prs = api
        .eventually(&buyer, "/prs?status=pending_approval", |list| {
            list.as_array().is_some_and(|l| l.iter().any(|pr| pr["mr_id"] == mr_id.as_str()))
        })
        .await;
    let pr = prs
        .as_array()
        .unwrap()
        .iter()
        .find(|pr| pr["mr_id"] == mr_id.as_str())
        .unwrap()
        .clone();
    let pr_id = id_of(&pr);
    assert_eq!(pr["amount"]["amount_minor"], 8_000_000);
    assert_eq!(pr["chain"]["levels"].as_array().unwrap().len(), 2);

    let (status, pr) = api.post(&pm, &format!("/prs/{pr_id}/approve"), json!({})).await;
    assert_eq!(status, StatusCode::OK, "{pr}");
    let (status, pr) = api.post(&finance, &format!("/prs/{pr_id}/approve"), json!({})).await;
    assert_eq!(status, StatusCode::OK, "{pr}");
    assert_eq!(pr["status"], "approved");
    api.mr_status(&requester, &mr_id, "pr_approved").await;

    // Draft purchase order.
    let pos = api
        .eventually(&buyer, "/pos", |list| {
            list.as_array().is_some_and(|l| l.iter().any(|po| po["mr_id"] == mr_id.as_str()))
        })
        .await;
    let po = pos
        .as_array()
        .unwrap()
        .iter()
        .find(|po| po["mr_id"] == mr_id.as_str())
        .unwrap()
        .clone();
    let po_id = id_of(&po);
    assert_eq!(po["status"], "draft");
    assert_eq!(po["supplier_id"], acme.as_str());

    let (status, po) = api.post(&buyer, &format!("/pos/{po_id}/send"), json!({})).await;
    assert_eq!(status, StatusCode::OK, "{po}");
    assert_eq!(po["status"], "sent");
    api.mr_status(&requester, &mr_id, "po_issued").await;

    let (status, po) = api
        .post(&buyer, &format!("/pos/{po_id}/acknowledge"), json!({ "supplier_reference": "SO-991" }))
        .await;
    assert_eq!(status, StatusCode::OK, "{po}");
    assert_eq!(po["status"], "acknowledged");

    let (status, po) = api
        .post(
            &buyer,
            &format!("/pos/{po_id}/receive"),
            json!({ "receipts": [{ "line_no": 1, "quantity": 1 }] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{po}");
    assert_eq!(po["status"], "partially_received");

    // Over-receipt is refused.
    let (status, body) = api
        .post(
            &buyer,
            &format!("/pos/{po_id}/receive"),
            json!({ "receipts": [{ "line_no": 1, "quantity": 5 }] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["error"], "validation_error");

    let (status, po) = api
        .post(
            &buyer,
            &format!("/pos/{po_id}/receive"),
            json!({ "receipts": [{ "line_no": 1, "quantity": 1 }] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{po}");
    assert_eq!(po["status"], "received");

    api.mr_status(&requester, &mr_id, "fulfilled").await;

    // Audit trail for the material request.
    let history = api
        .eventually(&requester, &format!("/history/{mr_id}"), |h| {
            h.as_array().is_some_and(|l| l.iter().any(|e| e["to"] == "fulfilled"))
        })
        .await;
    let statuses: Vec<&str> = history
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["to"].as_str().unwrap())
        .collect();
    assert_eq!(
        statuses,
        vec![
            "draft",
            "submitted",
            "rfq_sent",
            "quotes_received",
            "quote_approved",
            "pr_approved",
            "po_issued",
            "fulfilled"
        ]
    );

    let (status, _) = api.get(&requester, &format!("/history/{}", Uuid::now_v7())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn rejected_quote_approval_rejects_the_pack() {
    let srv = TestServer::spawn().await;
    let api = Api::new(&srv);

    let requester = User::new("requester", "requester");
    let buyer = User::new("buyer", "buyer");
    let pm = User::new("pm", "procurement_manager");

    let acme = register_supplier(&api, &buyer, "ACME").await;

    let (_, mr) = api
        .post(
            &requester,
            "/mrs",
            json!({
                "title": "Paper",
                "department": "admin",
                "required_by": (Utc::now() + ChronoDuration::days(10)).date_naive(),
                "lines": [{ "description": "A4 paper", "quantity": 10, "unit": "box" }]
            }),
        )
        .await;
    let mr_id = id_of(&mr);
    api.post(&requester, &format!("/mrs/{mr_id}/submit"), json!({})).await;

    let (_, rfq) = api
        .post(
            &buyer,
            "/rfqs",
            json!({
                "mr_id": mr_id,
                "supplier_ids": [acme],
                "response_due": Utc::now() + ChronoDuration::days(3)
            }),
        )
        .await;
    let rfq_id = id_of(&rfq);
    api.post(&buyer, &format!("/rfqs/{rfq_id}/send"), json!({})).await;

    let (status, quote) = api
        .post(
            &buyer,
            "/quotes",
            json!({
                "rfq_id": rfq_id,
                "supplier_id": acme,
                "currency": "EUR",
                "valid_until": (Utc::now() + ChronoDuration::days(5)).date_naive(),
                "lines": [{ "description": "A4 paper", "quantity": 10, "unit_price_minor": 2_500 }]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{quote}");
    let quote_id = id_of(&quote);
    api.mr_status(&requester, &mr_id, "quotes_received").await;

    let (_, pack) = api.post(&buyer, &format!("/rfqs/{rfq_id}/quote-pack"), json!({})).await;
    let pack_id = id_of(&pack);

    let (status, approval) = api
        .post(&buyer, &format!("/quote-packs/{pack_id}/approval"), json!({ "quote_id": quote_id }))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{approval}");
    let approval_id = id_of(&approval);

    // A second approval cannot start while one is pending.
    let (status, _) = api
        .post(&buyer, &format!("/quote-packs/{pack_id}/approval"), json!({ "quote_id": quote_id }))
        .await;
    assert!(status.is_client_error(), "{status}");

    // A reason is required.
    let (status, _) = api
        .post(&pm, &format!("/quote-approvals/{approval_id}/reject"), json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, approval) = api
        .post(
            &pm,
            &format!("/quote-approvals/{approval_id}/reject"),
            json!({ "reason": "price above budget" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{approval}");
    assert_eq!(approval["status"], "rejected");

    api.eventually(&buyer, &format!("/quote-packs/{pack_id}"), |p| p["status"] == "rejected")
        .await;

    // Nothing was requisitioned.
    let (_, prs) = api.get(&buyer, "/prs").await;
    assert!(prs.as_array().unwrap().iter().all(|pr| pr["mr_id"] != mr_id.as_str()));
}

#[tokio::test]
async fn supplier_details_can_be_updated_and_reactivated() {
    let srv = TestServer::spawn().await;
    let api = Api::new(&srv);
    let buyer = User::new("buyer", "buyer");

    let supplier_id = register_supplier(&api, &buyer, "INITECH").await;
    let path = format!("/suppliers/{supplier_id}");

    let (status, supplier) = api
        .put(
            &buyer,
            &path,
            json!({ "name": "Initech Europe", "phone": "+49 30 1234", "categories": ["printers"] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{supplier}");
    assert_eq!(supplier["name"], "Initech Europe");
    assert_eq!(supplier["code"], "INITECH");
    assert_eq!(supplier["contact"]["phone"], "+49 30 1234");
    assert_eq!(supplier["contact"]["email"], "sales@example.com");
    assert_eq!(supplier["categories"], json!(["printers"]));

    // An omitted body is fine; a malformed one is not.
    let status = api
        .post_raw(&buyer, &format!("{path}/deactivate"), "{\"reason\":", Some("application/json"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let status = api.post_raw(&buyer, &format!("{path}/deactivate"), "", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = api.put(&buyer, &path, json!({ "name": "Initech Asia" })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, supplier) = api.post(&buyer, &format!("{path}/reactivate"), json!({})).await;
    assert_eq!(status, StatusCode::OK, "{supplier}");
    assert_eq!(supplier["status"], "active");
    let (status, _) = api.post(&buyer, &format!("{path}/reactivate"), json!({})).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, supplier) = api.get(&buyer, &path).await;
    assert_eq!(supplier["name"], "Initech Europe");
    assert_eq!(supplier["status"], "active");
}

#[tokio::test]
async fn withdrawn_quote_cannot_be_put_up_for_approval() {
    let srv = TestServer::spawn().await;
    let api = Api::new(&srv);
    let requester = User::new("requester", "requester");
    let buyer = User::new("buyer", "buyer");

    let acme = register_supplier(&api, &buyer, "ACME").await;
    let globex = register_supplier(&api, &buyer, "GLOBEX").await;
    let (_, rfq_id, quotes) = quoted_request(&api, &requester, &buyer, &[(acme.as_str(), 5_000), (globex.as_str(), 6_000)]).await;
    let (cheap, dear) = (&quotes[0], &quotes[1]);

    let (status, pack) = api.post(&buyer, &format!("/rfqs/{rfq_id}/quote-pack"), json!({})).await;
    assert_eq!(status, StatusCode::CREATED, "{pack}");
    let pack_id = id_of(&pack);

    let (status, quote) = api
        .post(&buyer, &format!("/quotes/{cheap}/withdraw"), json!({ "reason": "price error" }))
        .await;
    assert_eq!(status, StatusCode::OK, "{quote}");
    assert_eq!(quote["status"], "withdrawn");

    let (status, body) = api
        .post(&buyer, &format!("/quote-packs/{pack_id}/approval"), json!({ "quote_id": cheap }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{body}");
    assert_eq!(body["error"], "invariant_violation");

    // With the cheaper quote gone, the remaining one is the lowest and needs no justification.
    let (status, approval) = api
        .post(&buyer, &format!("/quote-packs/{pack_id}/approval"), json!({ "quote_id": dear }))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{approval}");
    assert_eq!(approval["selected_quote_id"], dear.as_str());
    assert!(approval["justification"].is_null());
}

#[tokio::test]
async fn cancelled_request_cannot_start_a_quote_approval() {
    let srv = TestServer::spawn().await;
    let api = Api::new(&srv);
    let requester = User::new("requester", "requester");
    let buyer = User::new("buyer", "buyer");

    let acme = register_supplier(&api, &buyer, "ACME").await;
    let (mr_id, rfq_id, quotes) = quoted_request(&api, &requester, &buyer, &[(acme.as_str(), 5_000)]).await;

    let (status, pack) = api.post(&buyer, &format!("/rfqs/{rfq_id}/quote-pack"), json!({})).await;
    assert_eq!(status, StatusCode::CREATED, "{pack}");
    let pack_id = id_of(&pack);

    let (status, mr) = api
        .post(&requester, &format!("/mrs/{mr_id}/cancel"), json!({ "reason": "project dropped" }))
        .await;
    assert_eq!(status, StatusCode::OK, "{mr}");
    assert_eq!(mr["status"], "cancelled");

    let (status, body) = api
        .post(&buyer, &format!("/quote-packs/{pack_id}/approval"), json!({ "quote_id": quotes[0] }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{body}");

    let (_, approvals) = api.get(&buyer, "/quote-approvals").await;
    assert!(approvals.as_array().unwrap().is_empty());
    let (_, pack) = api.get(&buyer, &format!("/quote-packs/{pack_id}")).await;
    assert_eq!(pack["status"], "open");
}

#[tokio::test]
async fn malformed_optional_bodies_are_rejected() {
    let srv = TestServer::spawn().await;
    let api = Api::new(&srv);
    let pm = User::new("pm", "procurement_manager");
    let missing = Uuid::now_v7();

    for path in [
        format!("/quote-approvals/{missing}/approve"),
        format!("/prs/{missing}/approve"),
        format!("/quotes/{missing}/withdraw"),
        format!("/pos/{missing}/acknowledge"),
    ] {
        let status = api.post_raw(&pm, &path, "not json", Some("application/json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{path}");
    }
}
