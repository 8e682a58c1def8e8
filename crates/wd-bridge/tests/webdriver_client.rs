//! WebDriverSession against a minimal in-process W3C endpoint.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use harness_core_types::SelectionRequest;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use wd_bridge::{
    AutomationSession, DriverError, PageScript, WaitOptions, WebDriverConfig, WebDriverSession,
};

#[derive(Default)]
struct StubState {
    url: Mutex<String>,
    scripts: Mutex<Vec<Value>>,
    async_supported: bool,
}

type Shared = Arc<StubState>;

async fn create_session(Json(body): Json<Value>) -> Json<Value> {
    Json(json!({
        "value": {
            "sessionId": "stub-session",
            "capabilities": body["capabilities"]["alwaysMatch"].clone(),
        }
    }))
}

async fn delete_session(Path(_id): Path<String>) -> Json<Value> {
    Json(json!({ "value": null }))
}

async fn navigate(
    State(state): State<Shared>,
    Path(_id): Path<String>,
    Json(body): Json<Value>,
) -> Json<Value> {
    *state.url.lock() = body["url"].as_str().unwrap_or_default().to_string();
    Json(json!({ "value": null }))
}

async fn current_url(State(state): State<Shared>, Path(_id): Path<String>) -> Json<Value> {
    Json(json!({ "value": state.url.lock().clone() }))
}

async fn execute_sync(
    State(state): State<Shared>,
    Path(_id): Path<String>,
    Json(body): Json<Value>,
) -> Json<Value> {
    state.scripts.lock().push(body.clone());
    let script = body["script"].as_str().unwrap_or_default();
    if script.contains("__HERMIONE_IS_STORY_RENDERED__ === true") {
        return Json(json!({ "value": state.scripts.lock().len() >= 3 }));
    }
    Json(json!({ "value": true }))
}

async fn execute_async(
    State(state): State<Shared>,
    Path(_id): Path<String>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if !state.async_supported {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({
                "value": { "error": "unknown command", "message": "Method has not yet been implemented" }
            })),
        );
    }
    if body["args"][0] == json!("slow--story") {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "value": { "error": "script timeout", "message": "script timed out" } })),
        );
    }
    (
        StatusCode::OK,
        Json(json!({ "value": "{\"rootSelector\":\"#storybook-root\"}" })),
    )
}

async fn spawn_stub(async_supported: bool) -> (String, Shared) {
    let state = Arc::new(StubState {
        async_supported,
        ..StubState::default()
    });
    let router = Router::new()
        .route("/session", post(create_session))
        .route("/session/:id", delete(delete_session))
        .route("/session/:id/url", post(navigate))
        .route("/session/:id/url", get(current_url))
        .route("/session/:id/execute/sync", post(execute_sync))
        .route("/session/:id/execute/async", post(execute_async))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (format!("http://{addr}"), state)
}

async fn connect(endpoint: &str) -> WebDriverSession {
    let cfg = WebDriverConfig {
        endpoint: endpoint.to_string(),
        ..WebDriverConfig::default()
    };
    WebDriverSession::connect(&cfg).await.expect("session")
}

#[tokio::test]
async fn creates_session_and_tracks_navigation() {
    let (endpoint, _state) = spawn_stub(true).await;
    let session = connect(&endpoint).await;

    assert_eq!(session.session_id(), "stub-session");
    assert_eq!(session.capabilities()["browserName"], json!("chrome"));

    session
        .navigate("http://localhost:6006/iframe.html")
        .await
        .unwrap();
    assert_eq!(
        session.current_url().await.unwrap(),
        "http://localhost:6006/iframe.html"
    );

    session.close().await.unwrap();
}

#[tokio::test]
async fn async_script_returns_callback_value() {
    let (endpoint, _state) = spawn_stub(true).await;
    let session = connect(&endpoint).await;

    let value = session
        .execute_async(&PageScript::OpenStory(SelectionRequest::new("button--primary")))
        .await
        .unwrap();

    assert_eq!(value, json!("{\"rootSelector\":\"#storybook-root\"}"));
}

#[tokio::test]
async fn unsupported_async_execute_is_reported_as_capability_gap() {
    let (endpoint, _state) = spawn_stub(false).await;
    let session = connect(&endpoint).await;

    let err = session
        .execute_async(&PageScript::OpenStory(SelectionRequest::new("a")))
        .await
        .unwrap_err();

    assert!(err.is_not_implemented(), "unexpected error: {err:?}");
}

#[tokio::test]
async fn script_timeout_maps_to_timeout_error() {
    let (endpoint, _state) = spawn_stub(true).await;
    let session = connect(&endpoint).await;

    let err = session
        .execute_async(&PageScript::OpenStory(SelectionRequest::new("slow--story")))
        .await
        .unwrap_err();

    assert_eq!(err, DriverError::Timeout("script timed out".into()));
}

#[tokio::test]
async fn sync_scripts_send_source_and_positional_arguments() {
    let (endpoint, state) = spawn_stub(true).await;
    let session = connect(&endpoint).await;

    session
        .execute(&PageScript::StartOpenStory(SelectionRequest::new("a--b")))
        .await
        .unwrap();

    let sent = state.scripts.lock()[0].clone();
    assert_eq!(sent["args"][0], json!("a--b"));
    assert!(sent["script"]
        .as_str()
        .unwrap()
        .contains("__HERMIONE_IS_STORY_RENDERED__ = false"));
}

#[tokio::test]
async fn wait_until_polls_until_flag_flips() {
    let (endpoint, _state) = spawn_stub(true).await;
    let session = connect(&endpoint).await;

    let options = WaitOptions::new(
        std::time::Duration::from_secs(5),
        "Story: \"a\" is not rendered",
    )
    .with_interval(std::time::Duration::from_millis(10));

    session
        .wait_until(&PageScript::IsStoryRendered, &options)
        .await
        .unwrap();
}

#[tokio::test]
async fn unknown_route_on_old_driver_is_not_implemented() {
    let (endpoint, _state) = spawn_stub(true).await;
    let session = WebDriverSession::attach(&format!("{endpoint}/legacy"), "x").unwrap();

    let err = session.current_url().await.unwrap_err();
    assert!(err.is_not_implemented(), "unexpected error: {err:?}");
}
