use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use cspserver::api_router::build_router;
use cspserver::core::config::AppConfig;
use chrono::{Duration, Utc};
use cspserver::core::shared::models::{
    Csp, CspStatus, NewCsp, NewTransaction, NewUser, Role, Transaction, TransactionStatus,
    TransactionType, User, UserStatus,
};
use cspserver::core::storage::MemoryStore;
use cspserver::security::password::{Argon2Config, PasswordHasher, PasswordPolicy};
use cspserver::security::session::SessionStore;
use cspserver::AppState;

const PASSWORD: &str = "portal-pass-1";

struct TestApp {
    state: Arc<AppState>,
    router: Router,
}

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Reply {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }

    fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl TestApp {
    fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    fn with_config(config: AppConfig) -> Self {
        Self::from_state(AppState::in_memory(config).unwrap())
    }

    fn from_state(state: AppState) -> Self {
        let state = Arc::new(state);
        let router = build_router(Arc::clone(&state));
        Self { state, router }
    }

    fn seed_user(&self, username: &str, role: Role, status: UserStatus) -> User {
        self.state
            .store()
            .create_user(NewUser {
                username: username.to_string(),
                password_hash: self.state.passwords.hash(PASSWORD).unwrap(),
                email: format!("{username}@portal.test"),
                full_name: format!("{username} tester"),
                phone: None,
                role,
                status,
            })
            .unwrap()
    }

    fn seed_csp(&self, user_id: i32) -> Csp {
        self.state
            .store()
            .create_csp(NewCsp {
                user_id,
                address: "12 Market Road".into(),
                city: "Nashik".into(),
                state: "Maharashtra".into(),
                pincode: "422001".into(),
                aadhaar_number: "123412341234".into(),
                pan_number: None,
                education: None,
                photo_url: None,
                location: json!({}),
                score: 80,
                status: CspStatus::Active,
                working_capital: 50_000.0,
            })
            .unwrap()
    }

    fn seed_transaction(&self, csp_id: i32, amount: f64) -> Transaction {
        self.state
            .store()
            .create_transaction(NewTransaction {
                csp_id,
                kind: TransactionType::Deposit,
                amount,
                status: TransactionStatus::Completed,
                customer_phone: None,
                customer_name: None,
                location: None,
                risk_score: 0,
                flagged: false,
                flag_reason: None,
            })
            .unwrap()
    }

    async fn send(&self, method: Method, uri: &str, cookie: Option<&str>, body: Option<Value>) -> Reply {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec();
        Reply { status, headers, body }
    }

    async fn get(&self, uri: &str, cookie: &str) -> Reply {
        self.send(Method::GET, uri, Some(cookie), None).await
    }

    async fn post(&self, uri: &str, cookie: Option<&str>, body: Value) -> Reply {
        self.send(Method::POST, uri, cookie, Some(body)).await
    }

    async fn patch(&self, uri: &str, cookie: &str, body: Value) -> Reply {
        self.send(Method::PATCH, uri, Some(cookie), Some(body)).await
    }

    async fn login(&self, username: &str, role: &str) -> String {
        let reply = self
            .post(
                "/api/auth/login",
                None,
                json!({ "username": username, "password": PASSWORD, "role": role }),
            )
            .await;
        assert_eq!(reply.status, StatusCode::OK, "login failed: {}", reply.text());
        let set_cookie = reply
            .headers
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }
}

#[tokio::test]
async fn test_login_and_me() {
    let app = TestApp::new();
    let admin = app.seed_user("admin", Role::Admin, UserStatus::Active);

    let cookie = app.login("admin", "admin").await;
    assert!(cookie.starts_with("csp_session="));

    let me = app.get("/api/auth/me", &cookie).await;
    assert_eq!(me.status, StatusCode::OK);
    let body = me.json();
    assert_eq!(body["user"]["id"], admin.id);
    assert_eq!(body["user"]["fullName"], "admin tester");
    assert!(body["user"].get("passwordHash").is_none());

    let logs = app.get("/api/activity-logs?action=login", &cookie).await.json();
    assert_eq!(logs["activityLogs"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_login_failures() {
    let app = TestApp::new();
    app.seed_user("agent", Role::Csp, UserStatus::Active);
    app.seed_user("dormant", Role::Csp, UserStatus::Suspended);

    let missing = app.post("/api/auth/login", None, json!({ "username": "agent" })).await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
    assert_eq!(missing.json()["message"], "Username, password and role are required");

    let wrong_password = app
        .post(
            "/api/auth/login",
            None,
            json!({ "username": "agent", "password": "nope-nope", "role": "csp" }),
        )
        .await;
    assert_eq!(wrong_password.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password.json()["message"], "Invalid credentials");

    let unknown = app
        .post(
            "/api/auth/login",
            None,
            json!({ "username": "ghost", "password": PASSWORD, "role": "csp" }),
        )
        .await;
    assert_eq!(unknown.status, StatusCode::UNAUTHORIZED);

    let wrong_role = app
        .post(
            "/api/auth/login",
            None,
            json!({ "username": "agent", "password": PASSWORD, "role": "admin" }),
        )
        .await;
    assert_eq!(wrong_role.status, StatusCode::FORBIDDEN);
    assert_eq!(wrong_role.json()["message"], "Invalid role for this user");

    let inactive = app
        .post(
            "/api/auth/login",
            None,
            json!({ "username": "dormant", "password": PASSWORD, "role": "csp" }),
        )
        .await;
    assert_eq!(inactive.status, StatusCode::FORBIDDEN);
    assert_eq!(inactive.json()["message"], "Account is not active");
}

#[tokio::test]
async fn test_missing_session_and_wrong_role() {
    let app = TestApp::new();
    app.seed_user("agent", Role::Csp, UserStatus::Active);

    let anonymous = app.send(Method::GET, "/api/users", None, None).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let stale = app.get("/api/auth/me", "csp_session=not-a-session").await;
    assert_eq!(stale.status, StatusCode::UNAUTHORIZED);

    let cookie = app.login("agent", "csp").await;
    let forbidden = app.get("/api/users", &cookie).await;
    assert_eq!(forbidden.status, StatusCode::FORBIDDEN);
    assert_eq!(forbidden.json()["message"], "Unauthorized");
}

#[tokio::test]
async fn test_logout_ends_session() {
    let app = TestApp::new();
    app.seed_user("bank", Role::Bank, UserStatus::Active);
    let cookie = app.login("bank", "bank").await;

    let reply = app.post("/api/auth/logout", Some(&cookie), json!({})).await;
    assert_eq!(reply.status, StatusCode::OK);
    let cleared = reply.headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(cleared.contains("Max-Age=0"));

    assert_eq!(app.get("/api/auth/me", &cookie).await.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_application_flow() {
    let app = TestApp::new();
    app.seed_user("admin", Role::Admin, UserStatus::Active);

    let created = app
        .post(
            "/api/applications",
            None,
            json!({
                "firstName": "Ravi",
                "lastName": "Patil",
                "email": "ravi@example.in",
                "phone": "9876543210",
                "aadhaarNumber": "123456789012",
                "address": "5 Temple Street, Pune",
                "education": "graduate",
                "status": "approved"
            }),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    let application = &created.json()["application"];
    assert_eq!(application["status"], "pending");
    let id = application["id"].as_i64().unwrap();

    let invalid = app
        .post("/api/applications", None, json!({ "firstName": "Ravi", "aadhaarNumber": "12" }))
        .await;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);
    assert!(!invalid.json()["errors"].as_array().unwrap().is_empty());

    let cookie = app.login("admin", "admin").await;
    let pending = app.get("/api/applications?status=pending", &cookie).await.json();
    assert_eq!(pending["applications"].as_array().unwrap().len(), 1);

    let bad_status = app
        .patch(&format!("/api/applications/{id}"), &cookie, json!({ "status": "pending" }))
        .await;
    assert_eq!(bad_status.status, StatusCode::BAD_REQUEST);

    let missing = app
        .patch("/api/applications/999", &cookie, json!({ "status": "approved" }))
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);

    let reviewed = app
        .patch(
            &format!("/api/applications/{id}"),
            &cookie,
            json!({ "status": "approved", "notes": "Documents verified" }),
        )
        .await;
    assert_eq!(reviewed.status, StatusCode::OK);
    let body = reviewed.json();
    assert_eq!(body["application"]["status"], "approved");
    assert!(body["application"]["reviewedBy"].is_number());
}

#[tokio::test]
async fn test_csp_profile_creation() {
    let app = TestApp::new();
    app.seed_user("admin", Role::Admin, UserStatus::Active);
    let agent = app.seed_user("agent", Role::Csp, UserStatus::Active);
    let auditor = app.seed_user("auditor", Role::Auditor, UserStatus::Active);
    let cookie = app.login("admin", "admin").await;

    let profile = |user_id: i32| {
        json!({
            "userId": user_id,
            "address": "12 Market Road",
            "city": "Nashik",
            "state": "Maharashtra",
            "pincode": "422001",
            "aadhaarNumber": "123412341234"
        })
    };

    let created = app.post("/api/csps", Some(&cookie), profile(agent.id)).await;
    assert_eq!(created.status, StatusCode::CREATED);
    let csp = &created.json()["csp"];
    assert_eq!(csp["status"], "pending");
    assert_eq!(csp["score"], 100);

    let duplicate = app.post("/api/csps", Some(&cookie), profile(agent.id)).await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);

    let not_csp = app.post("/api/csps", Some(&cookie), profile(auditor.id)).await;
    assert_eq!(not_csp.status, StatusCode::BAD_REQUEST);

    let found = app.get("/api/csps?search=nashik", &cookie).await.json();
    assert_eq!(found["csps"].as_array().unwrap().len(), 1);
    assert_eq!(app.get("/api/csps/42", &cookie).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_csp_status_change_notifies_owner() {
    let app = TestApp::new();
    app.seed_user("bank", Role::Bank, UserStatus::Active);
    let agent = app.seed_user("agent", Role::Csp, UserStatus::Active);
    let csp = app.seed_csp(agent.id);

    let bank = app.login("bank", "bank").await;
    let updated = app
        .patch(&format!("/api/csps/{}", csp.id), &bank, json!({ "status": "suspended" }))
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.json()["csp"]["status"], "suspended");

    let agent_cookie = app.login("agent", "csp").await;
    let notifications = app.get("/api/notifications", &agent_cookie).await.json();
    let list = notifications["notifications"].as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["title"], "CSP Status Updated");
}

#[tokio::test]
async fn test_transactions_are_scoped_to_own_csp() {
    let app = TestApp::new();
    app.seed_user("admin", Role::Admin, UserStatus::Active);
    let agent = app.seed_user("agent", Role::Csp, UserStatus::Active);
    let other = app.seed_user("other", Role::Csp, UserStatus::Active);
    app.seed_user("newbie", Role::Csp, UserStatus::Active);
    let own_csp = app.seed_csp(agent.id);
    let other_csp = app.seed_csp(other.id);

    let cookie = app.login("agent", "csp").await;
    let created = app
        .post(
            "/api/transactions",
            Some(&cookie),
            json!({ "cspId": own_csp.id, "type": "deposit", "amount": 1500.0 }),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.json()["transaction"]["status"], "completed");

    let foreign = app
        .post(
            "/api/transactions",
            Some(&cookie),
            json!({ "cspId": other_csp.id, "type": "deposit", "amount": 10.0 }),
        )
        .await;
    assert_eq!(foreign.status, StatusCode::FORBIDDEN);
    assert_eq!(foreign.json()["message"], "Cannot create transactions for other CSPs");

    let admin = app.login("admin", "admin").await;
    let admin_tx = app
        .post(
            "/api/transactions",
            Some(&admin),
            json!({ "cspId": other_csp.id, "type": "withdrawal", "amount": 200.0, "flagged": true }),
        )
        .await;
    assert_eq!(admin_tx.status, StatusCode::CREATED);

    let own = app.get("/api/transactions", &cookie).await.json();
    let own = own["transactions"].as_array().unwrap();
    assert_eq!(own.len(), 1);
    assert_eq!(own[0]["cspId"], own_csp.id);

    let all = app.get("/api/transactions", &admin).await.json();
    assert_eq!(all["transactions"].as_array().unwrap().len(), 2);

    let newbie = app.login("newbie", "csp").await;
    let none = app.get("/api/transactions", &newbie).await.json();
    assert!(none["transactions"].as_array().unwrap().is_empty());
    let no_profile = app
        .post(
            "/api/transactions",
            Some(&newbie),
            json!({ "cspId": own_csp.id, "type": "deposit", "amount": 1.0 }),
        )
        .await;
    assert_eq!(no_profile.status, StatusCode::FORBIDDEN);

    let stats = app.get("/api/stats/transactions", &admin).await.json();
    assert_eq!(stats["total"], 2);
    assert_eq!(stats["totalAmount"], 1700.0);
    assert_eq!(stats["flagged"], 1);
    assert_eq!(stats["byType"]["deposit"], 1);
}

#[tokio::test]
async fn test_audit_assignment_and_completion() {
    let app = TestApp::new();
    app.seed_user("admin", Role::Admin, UserStatus::Active);
    let agent = app.seed_user("agent", Role::Csp, UserStatus::Active);
    let auditor = app.seed_user("auditor", Role::Auditor, UserStatus::Active);
    app.seed_user("auditor2", Role::Auditor, UserStatus::Active);
    let csp = app.seed_csp(agent.id);

    let admin = app.login("admin", "admin").await;
    let created = app
        .post(
            "/api/audits",
            Some(&admin),
            json!({ "cspId": csp.id, "auditorId": auditor.id, "scheduledDate": "2024-06-01" }),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    let audit_id = created.json()["audit"]["id"].as_i64().unwrap();

    let wrong_auditor = app
        .post(
            "/api/audits",
            Some(&admin),
            json!({ "cspId": csp.id, "auditorId": agent.id, "scheduledDate": "2024-06-01" }),
        )
        .await;
    assert_eq!(wrong_auditor.status, StatusCode::BAD_REQUEST);

    let auditor_cookie = app.login("auditor", "auditor").await;
    let inbox = app.get("/api/notifications?status=unread", &auditor_cookie).await.json();
    let inbox = inbox["notifications"].as_array().unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0]["title"], "New Audit Assignment");
    assert_eq!(
        inbox[0]["message"],
        "You have been assigned a new audit scheduled for 2024-06-01"
    );

    let other = app.login("auditor2", "auditor").await;
    let stolen = app
        .patch(&format!("/api/audits/{audit_id}"), &other, json!({ "status": "completed" }))
        .await;
    assert_eq!(stolen.status, StatusCode::FORBIDDEN);
    assert!(app.get("/api/audits", &other).await.json()["audits"]
        .as_array()
        .unwrap()
        .is_empty());

    let done = app
        .patch(
            &format!("/api/audits/{audit_id}"),
            &auditor_cookie,
            json!({ "status": "completed", "rating": 4, "notes": "All registers in order" }),
        )
        .await;
    assert_eq!(done.status, StatusCode::OK);
    let audit = &done.json()["audit"];
    assert_eq!(audit["status"], "completed");
    assert!(audit["completedDate"].is_string());

    let admin_inbox = app.get("/api/notifications", &admin).await.json();
    let admin_inbox = admin_inbox["notifications"].as_array().unwrap();
    assert_eq!(admin_inbox.len(), 1);
    assert_eq!(admin_inbox[0]["title"], "Audit Completed");
    assert_eq!(
        admin_inbox[0]["message"],
        format!("Audit #{audit_id} has been completed by auditor tester")
    );

    let stats = app.get("/api/stats/audits", &admin).await.json();
    assert_eq!(stats["total"], 1);
    assert_eq!(stats["completed"], 1);
}

#[tokio::test]
async fn test_alert_review() {
    let app = TestApp::new();
    let fi = app.seed_user("fi", Role::Fi, UserStatus::Active);
    app.seed_user("bank", Role::Bank, UserStatus::Active);
    let agent = app.seed_user("agent", Role::Csp, UserStatus::Active);
    let csp = app.seed_csp(agent.id);

    let fi_cookie = app.login("fi", "fi").await;
    let created = app
        .post(
            "/api/alerts",
            Some(&fi_cookie),
            json!({ "type": "fraud", "severity": "high", "message": "Burst of withdrawals", "cspId": csp.id }),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    let alert_id = created.json()["alert"]["id"].as_i64().unwrap();

    let agent_cookie = app.login("agent", "csp").await;
    let inbox = app.get("/api/notifications", &agent_cookie).await.json();
    let notification = &inbox["notifications"][0];
    assert_eq!(notification["title"], "New HIGH Alert");
    let notification_id = notification["id"].as_i64().unwrap();

    let denied = app
        .patch(&format!("/api/alerts/{alert_id}"), &agent_cookie, json!({ "status": "resolved" }))
        .await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);

    let bank = app.login("bank", "bank").await;
    let not_mine = app
        .patch(&format!("/api/notifications/{notification_id}"), &bank, json!({}))
        .await;
    assert_eq!(not_mine.status, StatusCode::FORBIDDEN);

    let read = app
        .patch(&format!("/api/notifications/{notification_id}"), &agent_cookie, json!({}))
        .await;
    assert_eq!(read.status, StatusCode::OK);
    assert_eq!(read.json()["notification"]["status"], "read");

    let ack = app
        .patch(&format!("/api/alerts/{alert_id}"), &fi_cookie, json!({ "status": "acknowledged" }))
        .await;
    assert_eq!(ack.status, StatusCode::OK);
    assert_eq!(ack.json()["alert"]["assignedTo"], fi.id);

    let invalid = app
        .patch(&format!("/api/alerts/{alert_id}"), &fi_cookie, json!({ "status": "new" }))
        .await;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);

    let open = app.get("/api/stats/alerts", &bank).await.json();
    assert_eq!(open["open"], 1);
    assert_eq!(open["high"], 1);

    let resolved = app
        .patch(&format!("/api/alerts/{alert_id}"), &bank, json!({ "status": "resolved" }))
        .await;
    assert_eq!(resolved.status, StatusCode::OK);
    assert!(resolved.json()["alert"]["resolvedAt"].is_string());

    let closed = app.get("/api/stats/alerts", &bank).await.json();
    assert_eq!(closed["total"], 1);
    assert_eq!(closed["open"], 0);

    let scoped = app.get("/api/alerts", &agent_cookie).await.json();
    assert_eq!(scoped["alerts"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_user_management() {
    let app = TestApp::new();
    app.seed_user("admin", Role::Admin, UserStatus::Active);
    let admin = app.login("admin", "admin").await;

    let created = app
        .post(
            "/api/users",
            Some(&admin),
            json!({
                "username": "field01",
                "password": "field-pass-01",
                "email": "field01@portal.test",
                "fullName": "Field Agent"
            }),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    let user = &created.json()["user"];
    assert_eq!(user["role"], "csp");
    assert!(user.get("passwordHash").is_none());
    let user_id = user["id"].as_i64().unwrap();

    let duplicate = app
        .post(
            "/api/users",
            Some(&admin),
            json!({
                "username": "field02",
                "password": "field-pass-02",
                "email": "field01@portal.test",
                "fullName": "Field Agent Two"
            }),
        )
        .await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);
    assert_eq!(duplicate.json()["message"], "Email already exists");

    let csps = app.get("/api/users?role=csp", &admin).await.json();
    assert_eq!(csps["users"].as_array().unwrap().len(), 1);

    let field = app
        .post(
            "/api/auth/login",
            None,
            json!({ "username": "field01", "password": "field-pass-01", "role": "csp" }),
        )
        .await;
    assert_eq!(field.status, StatusCode::OK);
    let field_cookie = field
        .headers
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .unwrap()
        .to_string();

    let bad = app
        .patch(&format!("/api/users/{user_id}"), &admin, json!({ "status": "banned" }))
        .await;
    assert_eq!(bad.status, StatusCode::BAD_REQUEST);
    assert_eq!(bad.json()["message"], "Valid status is required");

    let suspended = app
        .patch(&format!("/api/users/{user_id}"), &admin, json!({ "status": "suspended" }))
        .await;
    assert_eq!(suspended.status, StatusCode::OK);
    assert_eq!(suspended.json()["user"]["status"], "suspended");

    assert_eq!(
        app.get("/api/auth/me", &field_cookie).await.status,
        StatusCode::UNAUTHORIZED
    );

    let missing = app
        .patch("/api/users/999", &admin, json!({ "status": "active" }))
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_export() {
    let app = TestApp::new();
    app.seed_user("admin", Role::Admin, UserStatus::Active);
    app.seed_user("bank", Role::Bank, UserStatus::Active);
    let agent = app.seed_user("agent", Role::Csp, UserStatus::Active);
    app.seed_csp(agent.id);

    let admin = app.login("admin", "admin").await;
    let json_export = app.get("/api/export/csps?columns=id,city", &admin).await;
    assert_eq!(json_export.status, StatusCode::OK);
    let data = json_export.json();
    let rows = data["data"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0], json!({ "id": 1, "city": "Nashik" }));

    let csv = app.get("/api/export/users?format=csv&columns=username,role", &admin).await;
    assert_eq!(csv.status, StatusCode::OK);
    assert_eq!(csv.headers.get(header::CONTENT_TYPE).unwrap(), "text/csv");
    let disposition = csv
        .headers
        .get(header::CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert!(disposition.starts_with("attachment; filename=\"users_export_"));
    assert!(disposition.ends_with(".csv\""));
    let text = csv.text();
    assert_eq!(text.lines().next(), Some("username,role"));
    assert_eq!(text.lines().count(), 4);

    let future = app
        .get("/api/export/csps?fromDate=2999-01-01T00:00:00Z", &admin)
        .await
        .json();
    assert!(future["data"].as_array().unwrap().is_empty());

    let invalid = app.get("/api/export/payroll", &admin).await;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);
    assert_eq!(invalid.json()["message"], "Invalid export type");

    let bank = app.login("bank", "bank").await;
    assert_eq!(app.get("/api/export/users", &bank).await.status, StatusCode::FORBIDDEN);
    assert_eq!(app.get("/api/export/csps", &bank).await.status, StatusCode::OK);

    let exports = app.get("/api/activity-logs?action=export_data", &admin).await.json();
    assert_eq!(exports["activityLogs"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_stats_and_health() {
    let app = TestApp::new();
    app.seed_user("bank", Role::Bank, UserStatus::Active);
    let agent = app.seed_user("agent", Role::Csp, UserStatus::Active);
    app.seed_csp(agent.id);

    let bank = app.login("bank", "bank").await;
    let stats = app.get("/api/stats/csps", &bank).await.json();
    assert_eq!(stats, json!({ "total": 1, "active": 1, "pending": 0, "inactive": 0, "suspended": 0 }));

    let health = app.send(Method::GET, "/api/health", None, None).await;
    assert_eq!(health.status, StatusCode::OK);
    assert_eq!(health.json(), json!({ "status": "ok" }));

    let detailed = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(detailed.status, StatusCode::OK);
    let body = detailed.json();
    assert_eq!(body["service"], "cspserver");
    assert_eq!(body["storage"], true);
}

fn error_fields(reply: &Reply) -> Vec<String> {
    reply.json()["errors"]
        .as_array()
        .map(|errors| {
            errors
                .iter()
                .filter_map(|e| e["path"][0].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[tokio::test]
async fn test_alert_references_must_exist() {
    let app = TestApp::new();
    let fi = app.seed_user("fi", Role::Fi, UserStatus::Active);
    let agent = app.seed_user("agent", Role::Csp, UserStatus::Active);
    let csp = app.seed_csp(agent.id);
    let tx = app.seed_transaction(csp.id, 900.0);
    let cookie = app.login("fi", "fi").await;

    let unknown_csp = app
        .post(
            "/api/alerts",
            Some(&cookie),
            json!({ "type": "fraud", "message": "x", "cspId": 999 }),
        )
        .await;
    assert_eq!(unknown_csp.status, StatusCode::BAD_REQUEST);
    assert_eq!(error_fields(&unknown_csp), vec!["cspId"]);

    let dangling = app
        .post(
            "/api/alerts",
            Some(&cookie),
            json!({ "type": "fraud", "message": "x", "transactionId": 9999, "assignedTo": 4242 }),
        )
        .await;
    assert_eq!(dangling.status, StatusCode::BAD_REQUEST);
    assert_eq!(error_fields(&dangling), vec!["transactionId", "assignedTo"]);

    let listed = app.get("/api/alerts", &cookie).await.json();
    assert!(listed["alerts"].as_array().unwrap().is_empty());

    let linked = app
        .post(
            "/api/alerts",
            Some(&cookie),
            json!({
                "type": "fraud",
                "message": "Large cash deposit",
                "cspId": csp.id,
                "transactionId": tx.id,
                "assignedTo": fi.id
            }),
        )
        .await;
    assert_eq!(linked.status, StatusCode::CREATED);
    assert_eq!(linked.json()["alert"]["transactionId"], tx.id);
}

#[tokio::test]
async fn test_audit_listing_scope_and_status_filter() {
    let app = TestApp::new();
    app.seed_user("admin", Role::Admin, UserStatus::Active);
    let auditor = app.seed_user("auditor", Role::Auditor, UserStatus::Active);
    let first = app.seed_user("agent1", Role::Csp, UserStatus::Active);
    let second = app.seed_user("agent2", Role::Csp, UserStatus::Active);
    let own_csp = app.seed_csp(first.id);
    let other_csp = app.seed_csp(second.id);

    let admin = app.login("admin", "admin").await;
    for csp_id in [own_csp.id, other_csp.id] {
        let created = app
            .post(
                "/api/audits",
                Some(&admin),
                json!({ "cspId": csp_id, "auditorId": auditor.id, "scheduledDate": "2024-07-15T10:00:00Z" }),
            )
            .await;
        assert_eq!(created.status, StatusCode::CREATED);
    }
    let completed_id = app.get("/api/audits", &admin).await.json()["audits"][0]["id"]
        .as_i64()
        .unwrap();
    let done = app
        .patch(&format!("/api/audits/{completed_id}"), &admin, json!({ "status": "completed" }))
        .await;
    assert_eq!(done.status, StatusCode::OK);

    let agent = app.login("agent1", "csp").await;
    let own = app.get("/api/audits", &agent).await.json();
    let own = own["audits"].as_array().unwrap();
    assert_eq!(own.len(), 1);
    assert_eq!(own[0]["cspId"], own_csp.id);

    let completed = app.get("/api/audits?status=completed", &admin).await.json();
    let completed = completed["audits"].as_array().unwrap();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0]["id"], completed_id);

    let scheduled = app.get("/api/audits?status=scheduled", &admin).await.json();
    assert_eq!(scheduled["audits"].as_array().unwrap().len(), 1);

    let bogus = app.get("/api/audits?status=postponed", &admin).await;
    assert_eq!(bogus.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_expired_sessions_are_rejected() {
    let app = TestApp::new();
    app.seed_user("bank", Role::Bank, UserStatus::Active);
    let sessions = app.state.sessions.store();

    let idle = app.login("bank", "bank").await;
    assert_eq!(app.get("/api/auth/me", &idle).await.status, StatusCode::OK);
    let id = idle.trim_start_matches("csp_session=");
    let mut session = sessions.get(id).await.unwrap().unwrap();
    session.expires_at = Utc::now() - Duration::seconds(1);
    sessions.update(&session).await.unwrap();
    assert_eq!(app.get("/api/auth/me", &idle).await.status, StatusCode::UNAUTHORIZED);

    let capped = app.login("bank", "bank").await;
    let id = capped.trim_start_matches("csp_session=");
    let mut session = sessions.get(id).await.unwrap().unwrap();
    session.absolute_expires_at = Utc::now() - Duration::seconds(1);
    assert!(session.expires_at > Utc::now());
    sessions.update(&session).await.unwrap();
    assert_eq!(app.get("/api/auth/me", &capped).await.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_export_row_cap_and_to_date() {
    let app = TestApp::with_config(AppConfig {
        export_max_records: 2,
        ..AppConfig::default()
    });
    app.seed_user("bank", Role::Bank, UserStatus::Active);
    let agent = app.seed_user("agent", Role::Csp, UserStatus::Active);
    let csp = app.seed_csp(agent.id);
    for amount in [100.0, 200.0, 300.0] {
        app.seed_transaction(csp.id, amount);
    }
    let bank = app.login("bank", "bank").await;

    let capped = app.get("/api/export/transactions", &bank).await.json();
    let ids: Vec<i64> = capped["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|r| r["id"].as_i64())
        .collect();
    assert_eq!(ids, vec![3, 2]);

    let past = app
        .get("/api/export/transactions?toDate=2000-01-01T00:00:00Z", &bank)
        .await
        .json();
    assert!(past["data"].as_array().unwrap().is_empty());

    let future = app
        .get("/api/export/transactions?toDate=2999-01-01T00:00:00Z", &bank)
        .await
        .json();
    assert_eq!(future["data"].as_array().unwrap().len(), 2);

    let unknown = app
        .get("/api/export/transactions?columns=nothing,here", &bank)
        .await
        .json();
    assert!(unknown["data"][0]["amount"].is_number());
}

#[tokio::test]
async fn test_csp_update_score_and_working_capital() {
    let app = TestApp::new();
    app.seed_user("bank", Role::Bank, UserStatus::Active);
    let agent = app.seed_user("agent", Role::Csp, UserStatus::Active);
    let csp = app.seed_csp(agent.id);
    let bank = app.login("bank", "bank").await;
    let uri = format!("/api/csps/{}", csp.id);

    let updated = app
        .patch(&uri, &bank, json!({ "score": 45, "workingCapital": 125000.5 }))
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    let body = updated.json();
    assert_eq!(body["csp"]["score"], 45);
    assert_eq!(body["csp"]["workingCapital"], 125000.5);
    assert_eq!(body["csp"]["status"], "active");

    let band = app.get("/api/csps?score=low", &bank).await.json();
    assert_eq!(band["csps"].as_array().unwrap().len(), 1);

    let invalid = app
        .patch(&uri, &bank, json!({ "score": 101, "workingCapital": -1.0 }))
        .await;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);
    assert_eq!(error_fields(&invalid), vec!["score", "workingCapital"]);
    assert_eq!(app.patch(&uri, &bank, json!({})).await.status, StatusCode::BAD_REQUEST);

    let agent_cookie = app.login("agent", "csp").await;
    let inbox = app.get("/api/notifications", &agent_cookie).await.json();
    assert!(inbox["notifications"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_login_upgrades_weak_password_hash() {
    let weak = PasswordHasher::new(Argon2Config::minimal(), PasswordPolicy::default()).unwrap();
    let stronger = PasswordHasher::new(
        Argon2Config {
            memory_cost_kib: 16,
            ..Argon2Config::minimal()
        },
        PasswordPolicy::default(),
    )
    .unwrap();
    let app = TestApp::from_state(AppState::new(
        Arc::new(MemoryStore::new()),
        stronger,
        AppConfig::default(),
    ));

    let user = app
        .state
        .store()
        .create_user(NewUser {
            username: "legacy".into(),
            password_hash: weak.hash(PASSWORD).unwrap(),
            email: "legacy@portal.test".into(),
            full_name: "Legacy Account".into(),
            phone: None,
            role: Role::Auditor,
            status: UserStatus::Active,
        })
        .unwrap();
    assert!(!user.password_hash.contains("m=16,"));

    app.login("legacy", "auditor").await;
    let upgraded = app.state.store().get_user(user.id).unwrap().unwrap();
    assert_ne!(upgraded.password_hash, user.password_hash);
    assert!(upgraded.password_hash.contains("m=16,"));

    app.login("legacy", "auditor").await;
}
