//! Handler error types and formatting

use serde::Serialize;
use thiserror::Error;

/// Kinds of failure a handler can report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A required query parameter is absent or empty
    MissingParameter,
    /// A query parameter is present but cannot be used
    InvalidParameter,
    /// The object store rejected or failed the operation
    StoreFailure,
    /// Anything else that went wrong inside the handler
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingParameter => "MissingParameter",
            Self::InvalidParameter => "InvalidParameter",
            Self::StoreFailure => "StoreFailure",
            Self::Internal => "InternalError",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::MissingParameter | Self::InvalidParameter => 400,
            Self::StoreFailure | Self::Internal => 500,
        }
    }

    /// Whether the failure is the caller's fault
    pub fn is_client_error(&self) -> bool {
        self.http_status() < 500
    }
}

/// Error returned by a handler, mapped to a status code at the boundary
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HandlerError {
    pub kind: ErrorKind,
    pub message: String,
}

impl HandlerError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// A required parameter was not supplied
    pub fn missing_parameter(name: &str) -> Self {
        Self::new(ErrorKind::MissingParameter, format!("Missing {} parameter", name))
    }

    /// A parameter was supplied but is unusable
    pub fn invalid_parameter(name: &str) -> Self {
        Self::new(ErrorKind::InvalidParameter, format!("Invalid {} parameter", name))
    }

    /// Wrap a store failure, keeping its description verbatim
    pub fn store(err: impl std::fmt::Display) -> Self {
        Self::new(ErrorKind::StoreFailure, err.to_string())
    }

    pub fn internal(err: impl std::fmt::Display) -> Self {
        Self::new(ErrorKind::Internal, err.to_string())
    }

    pub fn http_status(&self) -> u16 {
        self.kind.http_status()
    }

    /// Format as the JSON body returned to the gateway
    pub fn to_json(&self) -> String {
        #[derive(Serialize)]
        struct JsonError<'a> {
            error: &'a str,
        }

        serde_json::to_string(&JsonError {
            error: &self.message,
        })
        .unwrap_or_else(|_| r#"{"error":"Internal error"}"#.to_string())
    }
}
