use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use certcode_client::{CertClient, SubmitResult};
use certcode_core::{ApiConfig, CodeTask, CodeTrace, CodeVerification};
use certcode_diff::parse_diff;

const DIFF: &str = "diff --git a/app.py b/app.py\n--- a/app.py\n+++ b/app.py\n@@ -1 +1 @@\n-x = 1\n+x = 2\n";

/// In-process stand-in for the CERT API
#[derive(Clone, Default)]
struct MockApi {
    received: Arc<Mutex<Vec<Value>>>,
    auth: Arc<Mutex<Vec<String>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

async fn create_trace(
    State(api): State<MockApi>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    api.auth.lock().unwrap().push(auth);
    api.received.lock().unwrap().push(body.clone());

    let task = body["input_text"].as_str().unwrap_or_default().to_string();
    match task.as_str() {
        "unauthorized" => return StatusCode::UNAUTHORIZED.into_response(),
        "forbidden" => return StatusCode::FORBIDDEN.into_response(),
        "boom" => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "database down"})),
            )
                .into_response()
        }
        "bad" => return (StatusCode::BAD_REQUEST, "not json").into_response(),
        _ => {}
    }

    let now = api.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    api.max_in_flight.fetch_max(now, Ordering::SeqCst);
    // Later tasks answer sooner so completion order differs from input order
    let delay = 80u64.saturating_sub(task.len() as u64 * 5);
    tokio::time::sleep(Duration::from_millis(delay)).await;
    api.in_flight.fetch_sub(1, Ordering::SeqCst);

    (
        StatusCode::CREATED,
        Json(json!({"id": format!("tr_{task}"), "evaluation": {"score": 0.9}})),
    )
        .into_response()
}

async fn spawn_api() -> (SocketAddr, MockApi) {
    let api = MockApi::default();
    let app = Router::new()
        .route("/api/v1/traces", post(create_trace))
        .route("/api/health", get(|| async { StatusCode::OK }))
        .with_state(api.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, api)
}

fn client_for(addr: SocketAddr) -> CertClient {
    let api = ApiConfig {
        url: format!("http://{addr}/api/v1"),
        key: Some("sk_test".to_string()),
    };
    CertClient::new(&api).unwrap()
}

fn trace(task: &str) -> CodeTrace {
    CodeTrace::new(
        CodeTask::new(task),
        parse_diff(DIFF, None),
        CodeVerification::default(),
    )
}

#[tokio::test]
async fn test_submit_success() {
    let (addr, api) = spawn_api().await;
    let client = client_for(addr).with_project_id(Some("proj_cfg".to_string()));

    let result = client.submit(&trace("Fix x")).await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.trace_id.as_deref(), Some("tr_Fix x"));
    assert_eq!(result.evaluation, Some(json!({"score": 0.9})));
    assert!(result.error.is_none());

    let received = api.received.lock().unwrap();
    assert_eq!(received[0]["kind"], "code");
    assert_eq!(received[0]["source"], "cert-code");
    assert_eq!(received[0]["project_id"], "proj_cfg");
    assert_eq!(api.auth.lock().unwrap()[0], "Bearer sk_test");
}

#[tokio::test]
async fn test_trace_project_wins_over_client() {
    let (addr, api) = spawn_api().await;
    let client = client_for(addr).with_project_id(Some("proj_cfg".to_string()));

    let trace = trace("t").with_project_id(Some("proj_trace".to_string()));
    assert!(client.submit(&trace).await.success);
    assert_eq!(api.received.lock().unwrap()[0]["project_id"], "proj_trace");
}

#[tokio::test]
async fn test_submit_api_errors() {
    let (addr, _api) = spawn_api().await;
    let client = client_for(addr);

    let cases = [
        ("unauthorized", "CERT API Error (401): Invalid API key"),
        ("forbidden", "CERT API Error (403): Access denied to project"),
        ("boom", "CERT API Error (500): database down"),
        ("bad", "CERT API Error (400): Unknown error"),
    ];
    for (task, expected) in cases {
        let result = client.submit(&trace(task)).await;
        assert!(!result.success);
        assert!(result.trace_id.is_none());
        assert_eq!(result.error.as_deref(), Some(expected));
    }
}

#[tokio::test]
async fn test_submit_transport_failure() {
    // Bind then drop to get a port nothing listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let result = client_for(addr).submit(&trace("t")).await;
    assert!(!result.success);
    assert!(result
        .error
        .as_deref()
        .unwrap()
        .starts_with("Request failed: "));
}

#[tokio::test]
async fn test_batch_preserves_order_and_bounds_concurrency() {
    let (addr, api) = spawn_api().await;
    let client = client_for(addr);

    let tasks = ["a", "bb", "ccc", "dddd", "eeeee", "ffffff", "ggggggg"];
    let traces: Vec<CodeTrace> = tasks.iter().map(|t| trace(t)).collect();

    let results = client.submit_batch(&traces, 3).await;

    let ids: Vec<_> = results
        .iter()
        .map(|r| r.trace_id.clone().unwrap_or_default())
        .collect();
    let expected: Vec<_> = tasks.iter().map(|t| format!("tr_{t}")).collect();
    assert_eq!(ids, expected);
    assert!(api.max_in_flight.load(Ordering::SeqCst) <= 3);
    assert_eq!(api.received.lock().unwrap().len(), tasks.len());
}

#[tokio::test]
async fn test_batch_failures_are_independent() {
    let (addr, _api) = spawn_api().await;
    let client = client_for(addr);

    let traces = vec![trace("ok"), trace("boom"), trace("fine")];
    let results = client.submit_batch(&traces, 0).await;

    let success: Vec<bool> = results.iter().map(|r: &SubmitResult| r.success).collect();
    assert_eq!(success, vec![true, false, true]);
}

#[tokio::test]
async fn test_batch_of_nothing() {
    let (addr, _api) = spawn_api().await;
    assert!(client_for(addr).submit_batch(&[], 5).await.is_empty());
}

#[tokio::test]
async fn test_health() {
    let (addr, _api) = spawn_api().await;
    assert_eq!(client_for(addr).health().await.unwrap(), StatusCode::OK.as_u16());
}
