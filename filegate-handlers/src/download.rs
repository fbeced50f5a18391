//! Download URL issuance

use async_trait::async_trait;
use filegate_core::HandlerError;
use filegate_store::ObjectStore;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use crate::event::GatewayRequest;
use crate::handler::{required_param, to_body, Handler, PRESIGN_TTL};

#[derive(Debug, Serialize)]
struct DownloadResponse {
    download_url: String,
}

/// Presigns a GET for a caller-supplied file id
///
/// The object is not looked up first; a URL for a missing key only fails
/// when it is used.
pub struct DownloadHandler {
    store: Arc<dyn ObjectStore>,
}

impl DownloadHandler {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Handler for DownloadHandler {
    fn name(&self) -> &'static str {
        "download"
    }

    async fn handle(&self, request: &GatewayRequest) -> Result<Value, HandlerError> {
        let file_id = required_param(request, "file_id")?;

        let presigned = self
            .store
            .presign_read(file_id, PRESIGN_TTL)
            .await
            .map_err(HandlerError::store)?;

        info!(
            bucket = %self.store.bucket(),
            file_id = %file_id,
            expires_at = %presigned.expires_at,
            "Issued download URL"
        );

        to_body(&DownloadResponse {
            download_url: presigned.url,
        })
    }
}
