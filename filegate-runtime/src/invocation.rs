//! A single invocation received from the Runtime API

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Event delivered by `GET /runtime/invocation/next`
#[derive(Debug, Clone)]
pub struct Invocation {
    pub request_id: String,
    pub function_arn: Option<String>,
    pub deadline_ms: Option<i64>,
    pub payload: Bytes,
}

impl Invocation {
    /// Milliseconds left before the platform kills the invocation
    pub fn remaining_time_ms(&self) -> Option<i64> {
        let now = chrono::Utc::now().timestamp_millis();
        self.deadline_ms.map(|deadline| (deadline - now).max(0))
    }
}

/// Lambda error document, as posted to the `error` endpoints
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LambdaErrorResponse {
    pub error_message: String,
    pub error_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<Vec<String>>,
}

impl LambdaErrorResponse {
    pub fn new(error_type: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            error_message: error_message.into(),
            error_type: error_type.into(),
            stack_trace: None,
        }
    }
}
