//! Handler trait and the boundary adapter

use async_trait::async_trait;
use filegate_core::{HandlerError, RequestId};
use serde::Serialize;
use serde_json::Value;
use std::str::FromStr;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::event::{GatewayRequest, GatewayResponse};

/// Lifetime of every presigned URL handed out
pub const PRESIGN_TTL: Duration = Duration::from_secs(3600);

/// One request in, one JSON body or error out
#[async_trait]
pub trait Handler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, request: &GatewayRequest) -> Result<Value, HandlerError>;
}

/// Run `handler` and map its result to a gateway response
///
/// Success is always 200; errors take their status from their kind.
pub async fn invoke(
    handler: &dyn Handler,
    request: &GatewayRequest,
    request_id: &RequestId,
) -> GatewayResponse {
    match handler.handle(request).await {
        Ok(body) => {
            info!(handler = handler.name(), request_id = %request_id, status = 200, "Request handled");
            GatewayResponse::json(200, body.to_string())
        }
        Err(e) => {
            let status = e.http_status();
            if e.kind.is_client_error() {
                warn!(handler = handler.name(), request_id = %request_id, status, error = %e, "Request rejected");
            } else {
                error!(handler = handler.name(), request_id = %request_id, status, error = %e, "Request failed");
            }
            GatewayResponse::json(status, e.to_json())
        }
    }
}

/// Which of the four handlers a process serves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    Upload,
    Download,
    Delete,
    List,
}

impl HandlerKind {
    pub const ALL: [HandlerKind; 4] = [Self::Upload, Self::Download, Self::Delete, Self::List];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Download => "download",
            Self::Delete => "delete",
            Self::List => "list",
        }
    }

    /// Whether the handler needs a configured bucket
    pub fn needs_store(&self) -> bool {
        !matches!(self, Self::List)
    }
}

impl std::fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HandlerKind {
    type Err = String;

    /// Accepts `upload`, `upload_file` and Lambda-style `upload_file.handler`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let module = s.split('.').next().unwrap_or(s).to_ascii_lowercase();
        let name = module
            .strip_suffix("_files")
            .or_else(|| module.strip_suffix("_file"))
            .unwrap_or(&module);

        match name {
            "upload" => Ok(Self::Upload),
            "download" => Ok(Self::Download),
            "delete" => Ok(Self::Delete),
            "list" => Ok(Self::List),
            _ => Err(format!("Unknown handler: {}", s)),
        }
    }
}

pub(crate) fn required_param<'a>(
    request: &'a GatewayRequest,
    name: &str,
) -> Result<&'a str, HandlerError> {
    request
        .query_param(name)
        .ok_or_else(|| HandlerError::missing_parameter(name))
}

pub(crate) fn to_body<T: Serialize>(value: &T) -> Result<Value, HandlerError> {
    serde_json::to_value(value).map_err(HandlerError::internal)
}
