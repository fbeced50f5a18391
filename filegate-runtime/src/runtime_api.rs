//! Lambda Runtime API client
//!
//! Speaks the HTTP interface a custom runtime uses to receive invocations and
//! return results.

use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::invocation::{Invocation, LambdaErrorResponse};

pub const RUNTIME_API_VERSION: &str = "2018-06-01";

/// Environment variable holding the Runtime API `host:port`
pub const RUNTIME_API_ENV: &str = "AWS_LAMBDA_RUNTIME_API";

const REQUEST_ID_HEADER: &str = "Lambda-Runtime-Aws-Request-Id";
const FUNCTION_ARN_HEADER: &str = "Lambda-Runtime-Invoked-Function-Arn";
const DEADLINE_HEADER: &str = "Lambda-Runtime-Deadline-Ms";
const ERROR_TYPE_HEADER: &str = "Lambda-Runtime-Function-Error-Type";

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("{0} is not set")]
    MissingEnv(&'static str),

    #[error("Runtime API request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Runtime API response is missing header {0}")]
    MissingHeader(&'static str),

    #[error("Runtime API returned {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },
}

/// Client for one Runtime API endpoint
#[derive(Debug, Clone)]
pub struct RuntimeApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl RuntimeApiClient {
    /// `endpoint` is the bare `host:port` Lambda provides
    pub fn new(endpoint: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: format!("http://{}/{}/runtime", endpoint, RUNTIME_API_VERSION),
        }
    }

    pub fn from_env() -> Result<Self, RuntimeError> {
        let endpoint =
            std::env::var(RUNTIME_API_ENV).map_err(|_| RuntimeError::MissingEnv(RUNTIME_API_ENV))?;
        Ok(Self::new(&endpoint))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET /runtime/invocation/next
    ///
    /// Blocks until the platform has an event for this process.
    pub async fn next_invocation(&self) -> Result<Invocation, RuntimeError> {
        let response = self
            .http
            .get(format!("{}/invocation/next", self.base_url))
            .send()
            .await?;
        let response = check_status(response).await?;

        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(String::from)
        };
        let request_id = header(REQUEST_ID_HEADER).ok_or(RuntimeError::MissingHeader(REQUEST_ID_HEADER))?;
        let function_arn = header(FUNCTION_ARN_HEADER);
        let deadline_ms = header(DEADLINE_HEADER).and_then(|v| v.parse().ok());

        let payload: Bytes = response.bytes().await?;
        debug!(request_id = %request_id, size = payload.len(), "Received invocation");

        Ok(Invocation {
            request_id,
            function_arn,
            deadline_ms,
            payload,
        })
    }

    /// POST /runtime/invocation/{requestId}/response
    pub async fn send_response<T: Serialize + Sync>(
        &self,
        request_id: &str,
        body: &T,
    ) -> Result<(), RuntimeError> {
        let response = self
            .http
            .post(format!("{}/invocation/{}/response", self.base_url, request_id))
            .json(body)
            .send()
            .await?;
        check_status(response).await?;

        debug!(request_id = %request_id, "Sent invocation response");
        Ok(())
    }

    /// POST /runtime/invocation/{requestId}/error
    pub async fn send_invocation_error(
        &self,
        request_id: &str,
        error_type: &str,
        message: &str,
    ) -> Result<(), RuntimeError> {
        let response = self
            .http
            .post(format!("{}/invocation/{}/error", self.base_url, request_id))
            .header(ERROR_TYPE_HEADER, error_type)
            .json(&LambdaErrorResponse::new(error_type, message))
            .send()
            .await?;
        check_status(response).await?;

        debug!(request_id = %request_id, error_type = %error_type, "Sent invocation error");
        Ok(())
    }

    /// POST /runtime/init/error
    ///
    /// Reported when the process cannot start serving, e.g. missing
    /// configuration.
    pub async fn send_init_error(&self, error_type: &str, message: &str) -> Result<(), RuntimeError> {
        let response = self
            .http
            .post(format!("{}/init/error", self.base_url))
            .header(ERROR_TYPE_HEADER, error_type)
            .json(&LambdaErrorResponse::new(error_type, message))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, RuntimeError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(RuntimeError::UnexpectedStatus {
        status: status.as_u16(),
        body,
    })
}
