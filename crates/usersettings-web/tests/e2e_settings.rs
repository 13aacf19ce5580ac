//! End-to-end tests for the settings HTTP API.
//!
//! These tests spin up the **real** Axum server on an OS-assigned ephemeral
//! port over an in-memory store, make actual HTTP requests via `reqwest`,
//! and verify the full request/response cycle including JSON shapes and
//! status codes.

use std::net::SocketAddr;

use reqwest::StatusCode;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use usersettings_store::SettingsStore;
use usersettings_web::{WebConfig, WebServer};

// ── helpers ──────────────────────────────────────────────────────────────────

struct TestServer {
    base: String,
    client: reqwest::Client,
    _stop: oneshot::Sender<()>,
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("{}/api/user-settings{path}", self.base)
    }

    fn get(&self, user: &str, path: &str) -> reqwest::RequestBuilder {
        self.client.get(self.url(path)).header("x-user-id", user)
    }

    fn post(&self, user: &str, path: &str) -> reqwest::RequestBuilder {
        self.client.post(self.url(path)).header("x-user-id", user)
    }

    fn delete(&self, user: &str, path: &str) -> reqwest::RequestBuilder {
        self.client.delete(self.url(path)).header("x-user-id", user)
    }
}

/// Bind to 127.0.0.1:0 and serve the settings router until the returned
/// server handle is dropped.
async fn start_test_server() -> TestServer {
    let store = SettingsStore::open_in_memory().await.expect("open store");
    start_test_server_with(store).await
}

/// Like [`start_test_server`], over a store the test has already prepared.
async fn start_test_server_with(store: SettingsStore) -> TestServer {
    let server = WebServer::new(WebConfig::default(), store);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind to port 0");
    let addr: SocketAddr = listener.local_addr().expect("get local addr");

    let (stop, stopped) = oneshot::channel::<()>();
    tokio::spawn(async move {
        server
            .serve(listener, async {
                let _ = stopped.await;
            })
            .await
            .ok();
    });

    TestServer {
        base: format!("http://127.0.0.1:{}", addr.port()),
        client: reqwest::Client::new(),
        _stop: stop,
    }
}

async fn json_of(resp: reqwest::Response) -> Value {
    resp.json().await.expect("invalid JSON")
}

// ── scenario ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn theme_set_get_delete_scenario() {
    let srv = start_test_server().await;

    let resp = srv
        .post("u1", "/theme")
        .json(&json!({"value": "dark"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        json_of(resp).await,
        json!({"success": true, "key": "theme", "value": "dark"})
    );

    let resp = srv.get("u1", "/theme").send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_of(resp).await, json!({"key": "theme", "value": "dark"}));

    let resp = srv.delete("u1", "/theme").send().await.unwrap();
    assert_eq!(json_of(resp).await, json!({"success": true}));

    let resp = srv.get("u1", "/theme").send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_of(resp).await, json!({"key": "theme"}));

    let resp = srv.delete("u1", "/theme").send().await.unwrap();
    assert_eq!(json_of(resp).await, json!({"success": false}));
}

// ── GET /api/user-settings ───────────────────────────────────────────────────

#[tokio::test]
async fn list_is_empty_for_fresh_user() {
    let srv = start_test_server().await;

    let resp = srv.get("fresh", "").send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_of(resp).await, json!({}));
}

#[tokio::test]
async fn list_returns_flat_mapping_for_caller_only() {
    let srv = start_test_server().await;

    srv.post("alice", "/theme")
        .json(&json!({"value": "dark"}))
        .send()
        .await
        .unwrap();
    srv.post("bob", "/layout")
        .json(&json!({"value": {"sidebar": true, "panels": [1, 2]}}))
        .send()
        .await
        .unwrap();

    let alice = json_of(srv.get("alice", "").send().await.unwrap()).await;
    assert_eq!(alice, json!({"theme": "dark"}));

    let bob = json_of(srv.get("bob", "").send().await.unwrap()).await;
    assert_eq!(bob, json!({"layout": {"sidebar": true, "panels": [1, 2]}}));
}

// ── POST /api/user-settings/{key} ────────────────────────────────────────────

#[tokio::test]
async fn missing_value_field_is_rejected() {
    let srv = start_test_server().await;

    let resp = srv
        .post("u1", "/theme")
        .json(&json!({"other": 1}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_of(resp).await, json!({"error": "value is required"}));

    let all = json_of(srv.get("u1", "").send().await.unwrap()).await;
    assert_eq!(all, json!({}));
}

#[tokio::test]
async fn explicit_null_and_falsy_values_are_stored() {
    let srv = start_test_server().await;

    for (key, value) in [
        ("nothing", json!(null)),
        ("zero", json!(0)),
        ("off", json!(false)),
        ("blank", json!("")),
    ] {
        let resp = srv
            .post("u1", &format!("/{key}"))
            .json(&json!({ "value": value }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK, "{key}");
    }

    let resp = srv.get("u1", "/nothing").send().await.unwrap();
    assert_eq!(json_of(resp).await, json!({"key": "nothing", "value": null}));

    let all = json_of(srv.get("u1", "").send().await.unwrap()).await;
    assert_eq!(
        all,
        json!({"nothing": null, "zero": 0, "off": false, "blank": ""})
    );
}

#[tokio::test]
async fn malformed_json_is_a_client_error() {
    let srv = start_test_server().await;

    let resp = srv
        .post("u1", "/theme")
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(json_of(resp).await["error"].is_string());
}

#[tokio::test]
async fn second_write_replaces_first() {
    let srv = start_test_server().await;

    for size in [12, 14] {
        srv.post("u1", "/font_size")
            .json(&json!({ "value": size }))
            .send()
            .await
            .unwrap();
    }

    let all = json_of(srv.get("u1", "").send().await.unwrap()).await;
    assert_eq!(all, json!({"font_size": 14}));
}

// ── POST /api/user-settings ──────────────────────────────────────────────────

#[tokio::test]
async fn bulk_save_reports_count() {
    let srv = start_test_server().await;

    srv.post("u1", "/existing")
        .json(&json!({"value": true}))
        .send()
        .await
        .unwrap();

    let resp = srv
        .post("u1", "")
        .json(&json!({"a": 1, "b": 2, "c": 3}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_of(resp).await, json!({"success": true, "saved": 3}));

    let all = json_of(srv.get("u1", "").send().await.unwrap()).await;
    assert_eq!(all, json!({"a": 1, "b": 2, "c": 3, "existing": true}));
}

#[tokio::test]
async fn bulk_save_rejects_non_objects() {
    let srv = start_test_server().await;

    for body in [json!([1, 2]), json!("theme"), json!(null), json!(7)] {
        let resp = srv.post("u1", "").json(&body).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{body}");
    }
}

#[tokio::test]
async fn bulk_save_with_empty_key_writes_nothing() {
    let srv = start_test_server().await;

    let resp = srv
        .post("u1", "")
        .json(&json!({"a": 1, "": 2}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let all = json_of(srv.get("u1", "").send().await.unwrap()).await;
    assert_eq!(all, json!({}));
}

#[tokio::test]
async fn bulk_save_of_empty_object_saves_nothing() {
    let srv = start_test_server().await;

    let resp = srv.post("u1", "").json(&json!({})).send().await.unwrap();
    assert_eq!(json_of(resp).await, json!({"success": true, "saved": 0}));
}

// ── server errors ────────────────────────────────────────────────────────────

#[tokio::test]
async fn corrupt_stored_value_is_a_server_error() {
    let store = SettingsStore::open_in_memory().await.expect("open store");
    store
        .database()
        .execute(|conn| {
            conn.execute(
                "INSERT INTO user_settings (user_id, key, value, updated_at) \
                 VALUES ('u1', 'broken', '{oops', 0)",
                [],
            )?;
            Ok(())
        })
        .await
        .expect("insert corrupt row");
    let srv = start_test_server_with(store).await;

    let resp = srv.get("u1", "").send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_of(resp).await;
    assert!(
        body["error"].as_str().is_some_and(|m| m.contains("broken")),
        "{body}"
    );

    let resp = srv.get("u1", "/broken").send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

    // Other users are unaffected.
    let resp = srv.get("u2", "").send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

// ── identity ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn requests_without_identity_are_unauthorized() {
    let srv = start_test_server().await;

    let resp = srv.client.get(srv.url("")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = srv
        .client
        .post(srv.url("/theme"))
        .header("x-user-id", "   ")
        .json(&json!({"value": "dark"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

// ── GET /api/health ──────────────────────────────────────────────────────────

#[tokio::test]
async fn health_reports_healthy() {
    let srv = start_test_server().await;

    let resp = srv
        .client
        .get(format!("{}/api/health", srv.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = json_of(resp).await;
    assert_eq!(body["status"], "healthy");
    assert!(body["version"].is_string());
}
