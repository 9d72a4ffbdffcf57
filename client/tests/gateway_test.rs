//! Integration tests for the HTTP gateway and the CLI app.
//!
//! Each test starts an axum mock of the Web App on an ephemeral port.

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use futures::stream;
use serde_json::{json, Value};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tally_client::config::Config;
use tally_client::console::ConsoleView;
use tally_client::http::HttpGateway;
use tally_client::storage::FileStore;
use tally_client::App;
use tally_engine::{Action, Error, Gateway, KeyValueStore, SaveOutcome, OFFLINE_QUEUE_KEY};

/// What the mock server saw and how it behaves.
#[derive(Default)]
struct MockState {
    requests: Mutex<Vec<(String, Value)>>,
    offline: AtomicBool,
}

impl MockState {
    fn actions(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(_, body)| body["action"].as_str().unwrap_or_default().to_string())
            .collect()
    }
}

async fn exec(State(state): State<Arc<MockState>>, headers: HeaderMap, body: String) -> Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let request: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
    state
        .requests
        .lock()
        .unwrap()
        .push((content_type, request.clone()));

    if request["token"] != "good-token" {
        return axum::Json(json!({"ok": false, "error": "Unauthorized"})).into_response();
    }

    let data = match request["action"].as_str().unwrap_or_default() {
        "getInitialData" => json!({
            "userEmail": "ann@example.com",
            "isAdmin": true,
            "rooms": ["Office", "Storage"],
            "entries": [{"id": "srv-0", "barcode": "000", "room": "Office", "quantity": 1,
                         "userEmail": "ann@example.com"}]
        }),
        "saveEntry" if state.offline.load(Ordering::SeqCst) => {
            return (StatusCode::BAD_GATEWAY, "<html>\n  <body>Bad   gateway</body>\n</html>")
                .into_response();
        }
        "saveEntry" => {
            let payload = &request["payload"];
            json!({
                "id": format!("srv-{}", payload["barcode"].as_str().unwrap_or_default()),
                "barcode": payload["barcode"],
                "room": payload["room"],
                "quantity": payload["quantity"],
                "userEmail": "ann@example.com"
            })
        }
        "listEntries" => json!({"entries": []}),
        "updateEntry" => request["payload"].clone(),
        "deleteEntry" => Value::Null,
        other => return axum::Json(json!({"ok": false, "error": format!("unknown action {other}")})).into_response(),
    };
    axum::Json(json!({"ok": true, "data": data})).into_response()
}

async fn login_page() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/html")],
        format!("<!DOCTYPE html>\n<html>\n<head><title>Sign in</title></head>\n<body>{}</body></html>", "x".repeat(400)),
    )
}

/// Start the mock and return its base URL.
async fn start_mock() -> (String, Arc<MockState>) {
    let state = Arc::new(MockState::default());
    let app = Router::new()
        .route("/exec", post(exec))
        .route("/login", post(login_page))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), state)
}

fn test_config(api_url: String, dir: &tempfile::TempDir) -> Config {
    Config {
        api_url: Some(api_url),
        data_dir: dir.path().to_path_buf(),
        scan_cooldown_ms: 1500,
        queue_capacity: 50,
    }
}

fn app_for(config: &Config) -> App {
    let gateway = Rc::new(HttpGateway::new(config.api_url.clone()));
    let storage = Rc::new(FileStore::new(&config.data_dir));
    App::with_parts(
        config,
        gateway,
        storage,
        Rc::new(ConsoleView::with_writer(Box::new(std::io::sink()))),
    )
}

// ============================================================================
// Gateway
// ============================================================================

#[tokio::test]
async fn posts_json_as_plain_text() {
    let (url, state) = start_mock().await;
    let gateway = HttpGateway::new(Some(format!("{url}/exec")));

    let data = gateway
        .call(Action::ListEntries, "good-token", json!({}))
        .await
        .unwrap();

    assert_eq!(data, json!({"entries": []}));
    let requests = state.requests.lock().unwrap();
    let (content_type, body) = &requests[0];
    assert_eq!(content_type, "text/plain;charset=utf-8");
    assert_eq!(
        body,
        &json!({"action": "listEntries", "token": "good-token", "payload": {}})
    );
}

#[tokio::test]
async fn error_envelope_carries_server_message() {
    let (url, _) = start_mock().await;
    let gateway = HttpGateway::new(Some(format!("{url}/exec")));

    let err = gateway
        .call(Action::ListEntries, "bad-token", json!({}))
        .await
        .unwrap_err();

    assert_eq!(err, Error::Api("Unauthorized".into()));
}

#[tokio::test]
async fn html_response_reports_snippet() {
    let (url, _) = start_mock().await;
    let gateway = HttpGateway::new(Some(format!("{url}/login")));

    let err = gateway
        .call(Action::GetInitialData, "good-token", json!({}))
        .await
        .unwrap_err();

    let Error::NonJsonResponse { snippet } = &err else {
        panic!("expected a non-JSON error, got {err:?}");
    };
    assert!(snippet.starts_with("<!DOCTYPE html> <html> <head><title>Sign in</title>"));
    assert_eq!(snippet.chars().count(), 180);
    assert!(err
        .to_string()
        .starts_with("API response is not JSON. Check Web App access. <!DOCTYPE html>"));
}

#[tokio::test]
async fn unreachable_server_is_network_error() {
    // Bind and drop a listener to get a port nobody serves.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let gateway = HttpGateway::new(Some(format!("http://{addr}/exec")));
    let err = gateway
        .call(Action::SaveEntry, "good-token", json!({}))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Network(_)));
    assert!(err.is_retryable());
}

// ============================================================================
// App
// ============================================================================

#[tokio::test]
async fn login_persists_token_for_later_runs() {
    let (url, state) = start_mock().await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(format!("{url}/exec"), &dir);

    let data = app_for(&config).inventory.sign_in("good-token").await.unwrap();
    assert_eq!(data.user_email.as_deref(), Some("ann@example.com"));

    // A fresh process restores the session from disk.
    let app = app_for(&config);
    app.require_session().await.unwrap();
    assert!(app.inventory.is_signed_in());
    assert_eq!(app.inventory.visible_entries().len(), 1);
    assert_eq!(state.actions(), vec!["getInitialData", "getInitialData"]);
}

#[tokio::test]
async fn rejected_token_is_forgotten() {
    let (url, _) = start_mock().await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(format!("{url}/exec"), &dir);

    let app = app_for(&config);
    assert!(app.inventory.sign_in("bad-token").await.is_err());

    let app = app_for(&config);
    assert!(matches!(
        app.require_session().await,
        Err(tally_client::error::AppError::SignedOut)
    ));
}

#[tokio::test]
async fn offline_save_is_synced_on_next_run() {
    let (url, state) = start_mock().await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(format!("{url}/exec"), &dir);
    state.offline.store(true, Ordering::SeqCst);

    let app = app_for(&config);
    app.inventory.sign_in("good-token").await.unwrap();
    let outcome = app
        .inventory
        .save_item(tally_engine::ItemDraft::new("123", "Office"))
        .await
        .unwrap();
    assert!(matches!(outcome, SaveOutcome::Queued(_)));

    let store = FileStore::new(dir.path());
    let raw = store.get(OFFLINE_QUEUE_KEY).unwrap().unwrap();
    assert!(raw.contains("\"barcode\":\"123\""));

    // Next run: the server is back and sign-in drains the queue.
    state.offline.store(false, Ordering::SeqCst);
    let app = app_for(&config);
    assert_eq!(app.inventory.pending_count(), 1);
    app.require_session().await.unwrap();

    assert_eq!(app.inventory.pending_count(), 0);
    assert_eq!(store.get(OFFLINE_QUEUE_KEY).unwrap().as_deref(), Some("[]"));
    let actions = state.actions();
    assert_eq!(actions.iter().filter(|a| *a == "saveEntry").count(), 2);
    assert_eq!(actions.last().map(String::as_str), Some("listEntries"));
}

#[tokio::test]
async fn continuous_scan_saves_each_new_code() {
    let (url, state) = start_mock().await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(format!("{url}/exec"), &dir);
    let app = app_for(&config);
    app.inventory.sign_in("good-token").await.unwrap();

    let lines = stream::iter(
        ["A1", "A1", "B2\r", "", "C3"]
            .into_iter()
            .map(|l| Ok(l.to_string())),
    );
    let outcomes = app.scan("Storage", true, lines).await.unwrap();

    // The repeat is suppressed and the blank line ends the session.
    assert_eq!(outcomes.len(), 2);
    let saved: Vec<String> = state
        .requests
        .lock()
        .unwrap()
        .iter()
        .filter(|(_, body)| body["action"] == "saveEntry")
        .map(|(_, body)| body["payload"]["barcode"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(saved, vec!["A1", "B2"]);
}

#[tokio::test]
async fn single_scan_closes_after_first_code() {
    let (url, _) = start_mock().await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(format!("{url}/exec"), &dir);
    let app = app_for(&config);
    app.inventory.sign_in("good-token").await.unwrap();

    let lines = stream::iter(["A1", "B2"].into_iter().map(|l| Ok(l.to_string())));
    let outcomes = app.scan("Office", false, lines).await.unwrap();

    assert_eq!(outcomes.len(), 1);
    assert!(matches!(&outcomes[0], SaveOutcome::Saved(Some(entry)) if entry.id == "srv-A1"));
}
