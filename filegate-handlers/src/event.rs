//! Gateway proxy event and response types

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use tracing::warn;

/// Inbound API Gateway proxy event
///
/// Only the fields the handlers read are modelled; anything else in the event
/// is ignored. The gateway sends `null` rather than `{}` when there are no
/// query parameters or headers, so both decode to an empty map.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayRequest {
    #[serde(default)]
    pub http_method: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub query_string_parameters: HashMap<String, String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub is_base64_encoded: bool,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<HashMap<String, String>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

impl GatewayRequest {
    pub fn new(http_method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            http_method: Some(http_method.into()),
            path: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn with_query_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_string_parameters.insert(name.into(), value.into());
        self
    }

    /// Decode a raw invocation payload
    ///
    /// A payload that is not a proxy event is treated as an empty request, so
    /// handlers that need no input still answer and the others report the
    /// missing parameter.
    pub fn from_payload(payload: &[u8]) -> Self {
        match serde_json::from_slice(payload) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "Event is not a gateway request, treating it as empty");
                Self::default()
            }
        }
    }

    /// Query parameter `name`, with empty values treated as absent
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query_string_parameters
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

/// Response handed back to the gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayResponse {
    pub status_code: u16,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    pub body: String,
    #[serde(default)]
    pub is_base64_encoded: bool,
}

impl GatewayResponse {
    pub fn json(status_code: u16, body: impl Into<String>) -> Self {
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        Self {
            status_code,
            headers,
            body: body.into(),
            is_base64_encoded: false,
        }
    }

    /// Parse the body back into JSON
    pub fn body_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_str(&self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_proxy_event() {
        let payload = br#"{
            "resource": "/download",
            "path": "/download",
            "httpMethod": "GET",
            "queryStringParameters": {"file_id": "abc.txt"},
            "multiValueQueryStringParameters": {"file_id": ["abc.txt"]},
            "headers": {"Accept": "*/*"},
            "requestContext": {"stage": "prod"},
            "body": null,
            "isBase64Encoded": false
        }"#;

        let request = GatewayRequest::from_payload(payload);
        assert_eq!(request.http_method.as_deref(), Some("GET"));
        assert_eq!(request.query_param("file_id"), Some("abc.txt"));
        assert_eq!(request.headers.get("Accept").map(String::as_str), Some("*/*"));
    }

    #[test]
    fn test_null_query_parameters() {
        let payload = br#"{"httpMethod": "GET", "queryStringParameters": null, "headers": null}"#;

        let request = GatewayRequest::from_payload(payload);
        assert!(request.query_string_parameters.is_empty());
        assert!(request.query_param("file_id").is_none());
    }

    #[test]
    fn test_malformed_payload_is_empty_request() {
        let payloads: [&[u8]; 5] = [
            b"not json",
            b"",
            b"[1, 2, 3]",
            b"\"text\"",
            b"{\"queryStringParameters\": 5}",
        ];
        for payload in payloads {
            let request = GatewayRequest::from_payload(payload);
            assert!(request.query_string_parameters.is_empty());
            assert!(request.http_method.is_none());
        }
    }

    #[test]
    fn test_empty_value_is_absent() {
        let request = GatewayRequest::new("GET", "/download").with_query_param("file_id", "");
        assert!(request.query_param("file_id").is_none());
    }

    #[test]
    fn test_response_serialization() {
        let response = GatewayResponse::json(200, r#"{"ok":true}"#);
        let value = serde_json::to_value(&response).unwrap();

        assert_eq!(value["statusCode"], 200);
        assert_eq!(value["body"], r#"{"ok":true}"#);
        assert_eq!(value["headers"]["Content-Type"], "application/json");
        assert_eq!(value["isBase64Encoded"], false);
    }
}
