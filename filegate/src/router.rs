//! HTTP router for local serving
//!
//! Exposes each handler on its own route, translating requests into gateway
//! events the same way API Gateway would. With an ephemeral store the router
//! also accepts the presigned PUT and GET requests that store signs.

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Router,
};
use bytes::Bytes;
use chrono::Utc;
use filegate_core::RequestId;
use filegate_handlers::{
    invoke, DeleteHandler, DownloadHandler, GatewayRequest, GatewayResponse, Handler, ListHandler,
    UploadHandler,
};
use filegate_store::{EphemeralStore, StoreError};
use quick_xml::escape::escape;
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::config::Config;

/// Service state for the main router
pub struct AppState {
    upload: UploadHandler,
    download: DownloadHandler,
    delete: DeleteHandler,
    list: ListHandler,
    objects: Option<Arc<EphemeralStore>>,
}

impl AppState {
    pub fn new(backend: Backend, config: &Config) -> Self {
        Self {
            upload: UploadHandler::new(backend.store.clone()),
            download: DownloadHandler::new(backend.store.clone()),
            delete: DeleteHandler::new(backend.store.clone()),
            list: backend.list_handler(config),
            objects: backend.ephemeral,
        }
    }
}

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    let shared_state = Arc::new(state);

    Router::new()
        .route("/health", get(health_check))
        .route("/upload", post(upload))
        .route("/download", get(download))
        .route("/delete", delete(delete_file))
        .route("/list", get(list))
        .route("/:bucket/*key", get(get_object).put(put_object))
        .layer(TraceLayer::new_for_http())
        .with_state(shared_state)
}

async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let store = if state.objects.is_some() { "ephemeral" } else { "s3" };
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        format!(
            r#"{{"status": "running", "handlers": ["upload", "download", "delete", "list"], "store": "{}"}}"#,
            store
        ),
    )
}

async fn upload(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    dispatch(&state.upload, &method, &uri, params, &headers, &body).await
}

async fn download(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    dispatch(&state.download, &method, &uri, params, &headers, &body).await
}

async fn delete_file(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    dispatch(&state.delete, &method, &uri, params, &headers, &body).await
}

async fn list(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    dispatch(&state.list, &method, &uri, params, &headers, &body).await
}

/// Run a handler on the gateway event equivalent of this request
async fn dispatch(
    handler: &dyn Handler,
    method: &Method,
    uri: &Uri,
    params: HashMap<String, String>,
    headers: &HeaderMap,
    body: &Bytes,
) -> Response {
    let request = GatewayRequest {
        http_method: Some(method.to_string()),
        path: Some(uri.path().to_string()),
        query_string_parameters: params,
        headers: header_pairs(headers).into_iter().collect(),
        body: (!body.is_empty()).then(|| String::from_utf8_lossy(body).into_owned()),
        is_base64_encoded: false,
    };

    into_http(invoke(handler, &request, &RequestId::new()).await)
}

fn into_http(response: GatewayResponse) -> Response {
    let status = StatusCode::from_u16(response.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut builder = Response::builder().status(status);
    for (name, value) in &response.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    builder
        .body(Body::from(response.body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

fn header_pairs(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

async fn put_object(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
    Query(pairs): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(store) = state.objects.as_ref() else {
        return no_local_objects();
    };

    if let Err(e) = store.authorize("PUT", &bucket, &key, &pairs, &header_pairs(&headers), Utc::now()) {
        return store_error(&e, &bucket, &key);
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let size = body.len();
    let etag = store.put_object(&key, body, content_type);
    info!(bucket = %bucket, key = %key, size, "Object uploaded");

    Response::builder()
        .status(StatusCode::OK)
        .header(header::ETAG, etag)
        .body(Body::empty())
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

async fn get_object(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
    Query(pairs): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Response {
    let Some(store) = state.objects.as_ref() else {
        return no_local_objects();
    };

    let object = store
        .authorize("GET", &bucket, &key, &pairs, &header_pairs(&headers), Utc::now())
        .and_then(|()| store.get_object(&key));
    let object = match object {
        Ok(object) => object,
        Err(e) => return store_error(&e, &bucket, &key),
    };
    debug!(bucket = %bucket, key = %key, size = object.data.len(), "Object downloaded");

    let content_type = object
        .content_type
        .unwrap_or_else(|| "application/octet-stream".to_string());
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::ETAG, object.etag)
        .header(
            header::LAST_MODIFIED,
            object.last_modified.format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
        )
        .body(Body::from(object.data))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

fn no_local_objects() -> Response {
    (
        StatusCode::NOT_IMPLEMENTED,
        "Objects are only served with the ephemeral store",
    )
        .into_response()
}

/// S3-style XML error for a failed object request
fn store_error(error: &StoreError, bucket: &str, key: &str) -> Response {
    let (status, code) = match error {
        StoreError::BucketNotFound(_) => (StatusCode::NOT_FOUND, "NoSuchBucket"),
        StoreError::ObjectNotFound { .. } => (StatusCode::NOT_FOUND, "NoSuchKey"),
        StoreError::AccessDenied(_) => (StatusCode::FORBIDDEN, "AccessDenied"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "InternalError"),
    };
    warn!(bucket = %bucket, key = %key, status = status.as_u16(), error = %error, "Object request rejected");

    let body = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Error>
  <Code>{}</Code>
  <Message>{}</Message>
  <Resource>/{}/{}</Resource>
  <RequestId>{}</RequestId>
</Error>"#,
        code,
        escape(&error.to_string()),
        escape(bucket),
        escape(key),
        RequestId::new()
    );

    (status, [(header::CONTENT_TYPE, "application/xml")], body).into_response()
}
