//! Integration tests for the runtime loop
//!
//! A small in-process Runtime API stands in for the Lambda platform so the
//! client, the invocation loop and the handlers are exercised over real HTTP.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use filegate_handlers::{DownloadHandler, Handler, ListHandler, UploadHandler};
use filegate_runtime::runtime::RESPONSE_ERROR_TYPE;
use filegate_runtime::{Runtime, RuntimeApiClient, RuntimeError};
use filegate_store::EphemeralStore;

#[derive(Default)]
struct FakeRuntimeApi {
    queue: Mutex<VecDeque<(String, Bytes)>>,
    responses: Mutex<Vec<(String, Value)>>,
    invocation_errors: Mutex<Vec<(String, String, Value)>>,
    init_errors: Mutex<Vec<(String, Value)>>,
}

/// Responses for request ids with this prefix are refused as too large
const OVERSIZED_PREFIX: &str = "oversized-";

impl FakeRuntimeApi {
    fn enqueue(&self, request_id: &str, payload: impl Into<Bytes>) {
        self.queue
            .lock()
            .unwrap()
            .push_back((request_id.to_string(), payload.into()));
    }

    fn responses(&self) -> Vec<(String, Value)> {
        self.responses.lock().unwrap().clone()
    }
}

async fn next_invocation(State(api): State<Arc<FakeRuntimeApi>>) -> Response {
    let next = api.queue.lock().unwrap().pop_front();
    match next {
        Some((request_id, payload)) => Response::builder()
            .status(StatusCode::OK)
            .header("Lambda-Runtime-Aws-Request-Id", request_id)
            .header(
                "Lambda-Runtime-Invoked-Function-Arn",
                "arn:aws:lambda:us-east-1:000000000000:function:files",
            )
            .header(
                "Lambda-Runtime-Deadline-Ms",
                (now_ms() + 30_000).to_string(),
            )
            .body(Body::from(payload))
            .unwrap(),
        None => Response::builder()
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .body(Body::from("Invocation channel closed"))
            .unwrap(),
    }
}

async fn invocation_response(
    State(api): State<Arc<FakeRuntimeApi>>,
    Path(request_id): Path<String>,
    body: Bytes,
) -> impl IntoResponse {
    if request_id.starts_with(OVERSIZED_PREFIX) {
        return StatusCode::PAYLOAD_TOO_LARGE;
    }

    let value: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    api.responses.lock().unwrap().push((request_id, value));
    StatusCode::ACCEPTED
}

async fn invocation_error(
    State(api): State<Arc<FakeRuntimeApi>>,
    Path(request_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let error_type = error_type_of(&headers);
    let value: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    api.invocation_errors
        .lock()
        .unwrap()
        .push((request_id, error_type, value));
    StatusCode::ACCEPTED
}

fn error_type_of(headers: &HeaderMap) -> String {
    headers
        .get("Lambda-Runtime-Function-Error-Type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

async fn init_error(
    State(api): State<Arc<FakeRuntimeApi>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let error_type = error_type_of(&headers);
    let value: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    api.init_errors.lock().unwrap().push((error_type, value));
    StatusCode::ACCEPTED
}

fn now_ms() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis()
}

/// Start the fake Runtime API and return its `host:port`
async fn start_runtime_api(api: Arc<FakeRuntimeApi>) -> String {
    let router = Router::new()
        .route("/2018-06-01/runtime/invocation/next", get(next_invocation))
        .route(
            "/2018-06-01/runtime/invocation/:request_id/response",
            post(invocation_response),
        )
        .route(
            "/2018-06-01/runtime/invocation/:request_id/error",
            post(invocation_error),
        )
        .route("/2018-06-01/runtime/init/error", post(init_error))
        .with_state(api);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    addr.to_string()
}

async fn runtime_for(handler: Arc<dyn Handler>) -> (Arc<FakeRuntimeApi>, Runtime) {
    let api = Arc::new(FakeRuntimeApi::default());
    let endpoint = start_runtime_api(api.clone()).await;
    let runtime = Runtime::new(RuntimeApiClient::new(&endpoint), handler);
    (api, runtime)
}

fn body_of(response: &Value) -> Value {
    serde_json::from_str(response["body"].as_str().unwrap()).unwrap()
}

#[tokio::test]
async fn test_download_invocation() {
    let store = Arc::new(EphemeralStore::new("files"));
    let (api, runtime) = runtime_for(Arc::new(DownloadHandler::new(store))).await;

    api.enqueue(
        "req-1",
        json!({"queryStringParameters": {"file_id": "notes.txt"}}).to_string(),
    );
    let response = runtime.process_next().await.unwrap();
    assert_eq!(response.status_code, 200);

    let posted = api.responses();
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0].0, "req-1");
    assert_eq!(posted[0].1["statusCode"], 200);
    assert_eq!(posted[0].1["headers"]["Content-Type"], "application/json");

    let url = body_of(&posted[0].1)["download_url"].as_str().unwrap().to_string();
    assert!(url.contains("/files/notes.txt?"));
}

#[tokio::test]
async fn test_download_missing_parameter() {
    let store = Arc::new(EphemeralStore::new("files"));
    let (api, runtime) = runtime_for(Arc::new(DownloadHandler::new(store))).await;

    api.enqueue("req-1", json!({"queryStringParameters": null}).to_string());
    api.enqueue("req-2", "not json at all");
    runtime.process_next().await.unwrap();
    runtime.process_next().await.unwrap();

    for (_, response) in api.responses() {
        assert_eq!(response["statusCode"], 400);
        assert_eq!(body_of(&response), json!({"error": "Missing file_id parameter"}));
    }
}

#[tokio::test]
async fn test_upload_invocation_body_shape() {
    let store = Arc::new(EphemeralStore::new("files"));
    let (api, runtime) = runtime_for(Arc::new(UploadHandler::new(store))).await;

    api.enqueue("req-1", "{}");
    runtime.process_next().await.unwrap();

    let posted = api.responses();
    let body = posted[0].1["body"].as_str().unwrap();
    assert!(body.starts_with(r#"{"upload_url":"#));

    let body: Value = serde_json::from_str(body).unwrap();
    let file_id = body["file_id"].as_str().unwrap();
    assert!(file_id.ends_with(".txt"));
    assert!(body["upload_url"].as_str().unwrap().contains(file_id));
}

#[tokio::test]
async fn test_run_serves_until_api_fails() {
    let (api, runtime) = runtime_for(Arc::new(ListHandler::stub())).await;
    assert_eq!(runtime.handler_name(), "list");

    for id in ["a", "b", "c"] {
        api.enqueue(id, "{}");
    }

    let err = runtime.run().await.unwrap_err();
    assert!(matches!(err, RuntimeError::UnexpectedStatus { status: 500, .. }));

    let posted = api.responses();
    let ids: Vec<&str> = posted.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
    for (_, response) in &posted {
        assert_eq!(
            body_of(response),
            json!({"message": "Hello from list-files Lambda (Rust)!"})
        );
    }
}

#[tokio::test]
async fn test_init_error_reported() {
    let api = Arc::new(FakeRuntimeApi::default());
    let endpoint = start_runtime_api(api.clone()).await;
    let client = RuntimeApiClient::new(&endpoint);

    client
        .send_init_error("Runtime.ConfigError", "FILES_BUCKET is not set")
        .await
        .unwrap();

    let errors = api.init_errors.lock().unwrap().clone();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, "Runtime.ConfigError");
    assert_eq!(errors[0].1["errorMessage"], "FILES_BUCKET is not set");
    assert_eq!(errors[0].1["errorType"], "Runtime.ConfigError");
}

#[tokio::test]
async fn test_unreachable_api() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let runtime = Runtime::new(
        RuntimeApiClient::new(&addr.to_string()),
        Arc::new(ListHandler::stub()),
    );
    assert!(matches!(runtime.process_next().await, Err(RuntimeError::Http(_))));
}

#[tokio::test]
async fn test_refused_response_reported_as_error() {
    let (api, runtime) = runtime_for(Arc::new(ListHandler::stub())).await;

    api.enqueue("oversized-1", "{}");
    api.enqueue("after", "{}");

    let err = runtime.run().await.unwrap_err();
    assert!(matches!(err, RuntimeError::UnexpectedStatus { status: 500, .. }));

    let errors = api.invocation_errors.lock().unwrap().clone();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, "oversized-1");
    assert_eq!(errors[0].1, RESPONSE_ERROR_TYPE);
    assert_eq!(errors[0].2["errorType"], RESPONSE_ERROR_TYPE);
    assert!(errors[0].2["errorMessage"].as_str().unwrap().contains("413"));

    // The loop keeps serving after the refused response
    let ids: Vec<String> = api.responses().into_iter().map(|(id, _)| id).collect();
    assert_eq!(ids, vec!["after".to_string()]);
}
