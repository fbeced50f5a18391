//! Object deletion

use async_trait::async_trait;
use filegate_core::HandlerError;
use filegate_store::ObjectStore;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use crate::event::GatewayRequest;
use crate::handler::{required_param, to_body, Handler};

#[derive(Debug, Serialize)]
struct DeleteResponse {
    message: String,
}

/// Deletes a caller-supplied file id unconditionally
pub struct DeleteHandler {
    store: Arc<dyn ObjectStore>,
}

impl DeleteHandler {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Handler for DeleteHandler {
    fn name(&self) -> &'static str {
        "delete"
    }

    async fn handle(&self, request: &GatewayRequest) -> Result<Value, HandlerError> {
        let file_id = required_param(request, "file_id")?;

        self.store
            .delete(file_id)
            .await
            .map_err(HandlerError::store)?;

        info!(bucket = %self.store.bucket(), file_id = %file_id, "Deleted file");

        to_body(&DeleteResponse {
            message: format!("File '{}' deleted successfully!", file_id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::invoke;
    use crate::handler::test_support::FailingStore;
    use bytes::Bytes;
    use filegate_core::RequestId;
    use filegate_store::EphemeralStore;

    fn delete_request(file_id: &str) -> GatewayRequest {
        GatewayRequest::new("DELETE", "/delete").with_query_param("file_id", file_id)
    }

    #[tokio::test]
    async fn test_delete_missing_file_id() {
        let handler = DeleteHandler::new(Arc::new(EphemeralStore::new("files")));
        let response = invoke(&handler, &GatewayRequest::new("DELETE", "/delete"), &RequestId::new()).await;

        assert_eq!(response.status_code, 400);
        assert_eq!(response.body, r#"{"error":"Missing file_id parameter"}"#);
    }

    #[tokio::test]
    async fn test_delete_removes_object() {
        let store = Arc::new(EphemeralStore::new("files"));
        store.put_object("a.txt", Bytes::from("hello"), None);
        let handler = DeleteHandler::new(store.clone());

        let response = invoke(&handler, &delete_request("a.txt"), &RequestId::new()).await;

        assert_eq!(response.status_code, 200);
        assert_eq!(response.body, r#"{"message":"File 'a.txt' deleted successfully!"}"#);
        assert!(!store.contains("a.txt"));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let handler = DeleteHandler::new(Arc::new(EphemeralStore::new("files")));

        for _ in 0..2 {
            let response = invoke(&handler, &delete_request("never-there.txt"), &RequestId::new()).await;
            assert_eq!(response.status_code, 200);
            assert_eq!(
                response.body_json().unwrap()["message"],
                "File 'never-there.txt' deleted successfully!"
            );
        }
    }

    #[tokio::test]
    async fn test_delete_store_failure_is_500() {
        let handler = DeleteHandler::new(Arc::new(FailingStore));
        let response = invoke(&handler, &delete_request("a.txt"), &RequestId::new()).await;

        assert_eq!(response.status_code, 500);
        assert_eq!(response.body, r#"{"error":"dispatch failure: connection refused"}"#);
    }
}
