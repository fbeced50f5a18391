//! Upload URL issuance

use async_trait::async_trait;
use filegate_core::HandlerError;
use filegate_store::ObjectStore;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::event::GatewayRequest;
use crate::handler::{to_body, Handler, PRESIGN_TTL};

/// Suffix appended to every generated file id
pub const FILE_SUFFIX: &str = ".txt";

#[derive(Debug, Serialize)]
struct UploadResponse {
    upload_url: String,
    file_id: String,
}

/// Mints a fresh file id and a URL to PUT it with
pub struct UploadHandler {
    store: Arc<dyn ObjectStore>,
}

impl UploadHandler {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Random v4 UUID plus [`FILE_SUFFIX`]
    pub fn generate_file_id() -> String {
        format!("{}{}", Uuid::new_v4(), FILE_SUFFIX)
    }
}

#[async_trait]
impl Handler for UploadHandler {
    fn name(&self) -> &'static str {
        "upload"
    }

    async fn handle(&self, request: &GatewayRequest) -> Result<Value, HandlerError> {
        debug!(event = ?request, "Upload event");

        let file_id = Self::generate_file_id();
        let presigned = self
            .store
            .presign_write(&file_id, PRESIGN_TTL)
            .await
            .map_err(HandlerError::store)?;

        info!(
            bucket = %self.store.bucket(),
            file_id = %file_id,
            expires_at = %presigned.expires_at,
            "Issued upload URL"
        );

        to_body(&UploadResponse {
            upload_url: presigned.url,
            file_id,
        })
    }
}
