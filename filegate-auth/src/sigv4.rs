//! AWS Signature Version 4 query-string implementation

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;
use url::Url;

type HmacSha256 = Hmac<Sha256>;

pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";
pub const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

/// Longest lifetime SigV4 allows for a presigned URL (seven days)
pub const MAX_EXPIRES_SECS: u64 = 604_800;

/// Clock skew tolerated for URLs dated in the future
const MAX_SKEW_SECS: i64 = 900;

/// Characters left unencoded by `UriEncode()`
const URI_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Same as [`URI_ENCODE`] but keeps path separators
const PATH_ENCODE: &AsciiSet = &URI_ENCODE.remove(b'/');

const AMZ_DATE_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Errors while presigning or verifying
#[derive(Debug, Error)]
pub enum SigV4Error {
    #[error("Missing query parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Invalid credential format")]
    InvalidCredentialFormat,

    #[error("Invalid X-Amz-Date: {0}")]
    InvalidDate(String),

    #[error("Invalid X-Amz-Expires: {0}")]
    InvalidExpires(String),

    #[error("X-Amz-Expires must be at most 604800 seconds, got {0}")]
    ExpiresTooLarge(u64),

    #[error("Endpoint has no host: {0}")]
    MissingHost(String),

    #[error("Signed header not present in request: {0}")]
    MissingSignedHeader(String),

    #[error("Request is not yet valid")]
    NotYetValid,

    #[error("Request has expired")]
    Expired,

    #[error("Signature mismatch")]
    SignatureMismatch,
}

/// Access key pair used to sign
#[derive(Debug, Clone)]
pub struct Credentials {
    pub access_key: String,
    pub secret_key: String,
    pub session_token: Option<String>,
}

impl Credentials {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            session_token: None,
        }
    }

    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }
}

/// One request to presign. Only `host` is signed; the payload is unsigned.
#[derive(Debug, Clone)]
pub struct PresignRequest<'a> {
    pub method: &'a str,
    pub host: &'a str,
    /// Decoded absolute path, e.g. `/bucket/key.txt`
    pub path: &'a str,
    pub region: &'a str,
    pub service: &'a str,
    pub timestamp: DateTime<Utc>,
    pub expires_in: u64,
}

/// Presigned query parameters pulled back out of a URL
#[derive(Debug)]
pub struct PresignedQuery {
    pub algorithm: String,
    pub access_key: String,
    pub date: String,
    pub region: String,
    pub service: String,
    pub timestamp: DateTime<Utc>,
    pub expires_in: u64,
    pub signed_headers: Vec<String>,
    pub signature: String,
}

impl PresignedQuery {
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.timestamp + Duration::seconds(self.expires_in as i64)
    }
}

/// Build the signed query string for `request`
///
/// The result already contains `X-Amz-Signature` and can be appended to the
/// URL as-is.
pub fn presign(request: &PresignRequest<'_>, credentials: &Credentials) -> Result<String, SigV4Error> {
    if request.expires_in > MAX_EXPIRES_SECS {
        return Err(SigV4Error::ExpiresTooLarge(request.expires_in));
    }

    let date = request.timestamp.format("%Y%m%d").to_string();
    let amz_date = request.timestamp.format(AMZ_DATE_FORMAT).to_string();
    let scope = format!("{}/{}/{}/aws4_request", date, request.region, request.service);

    let mut params = vec![
        ("X-Amz-Algorithm".to_string(), ALGORITHM.to_string()),
        (
            "X-Amz-Credential".to_string(),
            format!("{}/{}", credentials.access_key, scope),
        ),
        ("X-Amz-Date".to_string(), amz_date.clone()),
        ("X-Amz-Expires".to_string(), request.expires_in.to_string()),
        ("X-Amz-SignedHeaders".to_string(), "host".to_string()),
    ];
    if let Some(token) = &credentials.session_token {
        params.push(("X-Amz-Security-Token".to_string(), token.clone()));
    }

    let query = canonical_query_string(&params);
    let canonical_request = create_canonical_request(
        request.method,
        &encode_path(request.path),
        &query,
        &[("host".to_string(), request.host.to_string())],
        &["host".to_string()],
        UNSIGNED_PAYLOAD,
    );
    let string_to_sign = create_string_to_sign(ALGORITHM, &amz_date, &scope, &canonical_request);
    let signing_key = derive_signing_key(
        &credentials.secret_key,
        &date,
        request.region,
        request.service,
    );
    let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes()));

    Ok(format!("{}&X-Amz-Signature={}", query, signature))
}

/// Presign `path` against `endpoint`, returning the complete URL
///
/// The URL is assembled as a string because [`Url`] collapses `.` and `..`
/// segments, which would point it at a different key than the one signed.
pub fn presign_url(
    endpoint: &Url,
    method: &str,
    path: &str,
    region: &str,
    service: &str,
    credentials: &Credentials,
    timestamp: DateTime<Utc>,
    expires_in: u64,
) -> Result<String, SigV4Error> {
    let host = host_header(endpoint)?;
    let query = presign(
        &PresignRequest {
            method,
            host: &host,
            path,
            region,
            service,
            timestamp,
            expires_in,
        },
        credentials,
    )?;

    Ok(format!(
        "{}{}?{}",
        endpoint.origin().ascii_serialization(),
        encode_path(path),
        query
    ))
}

/// Value of the `Host` header a client sends to `endpoint`
fn host_header(endpoint: &Url) -> Result<String, SigV4Error> {
    let host = endpoint
        .host_str()
        .ok_or_else(|| SigV4Error::MissingHost(endpoint.to_string()))?;
    Ok(match endpoint.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

/// Extract the SigV4 parameters from decoded query pairs
pub fn parse_presigned_query(pairs: &[(String, String)]) -> Result<PresignedQuery, SigV4Error> {
    let get = |name: &'static str| {
        pairs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .ok_or(SigV4Error::MissingParameter(name))
    };

    let algorithm = get("X-Amz-Algorithm")?;
    if algorithm != ALGORITHM {
        return Err(SigV4Error::UnsupportedAlgorithm(algorithm.to_string()));
    }

    let credential_parts: Vec<&str> = get("X-Amz-Credential")?.split('/').collect();
    if credential_parts.len() != 5 || credential_parts[4] != "aws4_request" {
        return Err(SigV4Error::InvalidCredentialFormat);
    }

    let amz_date = get("X-Amz-Date")?;
    let timestamp = NaiveDateTime::parse_from_str(amz_date, AMZ_DATE_FORMAT)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|_| SigV4Error::InvalidDate(amz_date.to_string()))?;
    if timestamp.format("%Y%m%d").to_string() != credential_parts[1] {
        return Err(SigV4Error::InvalidDate(amz_date.to_string()));
    }

    let expires = get("X-Amz-Expires")?;
    let expires_in: u64 = expires
        .parse()
        .map_err(|_| SigV4Error::InvalidExpires(expires.to_string()))?;
    if expires_in > MAX_EXPIRES_SECS {
        return Err(SigV4Error::ExpiresTooLarge(expires_in));
    }

    Ok(PresignedQuery {
        algorithm: algorithm.to_string(),
        access_key: credential_parts[0].to_string(),
        date: credential_parts[1].to_string(),
        region: credential_parts[2].to_string(),
        service: credential_parts[3].to_string(),
        timestamp,
        expires_in,
        signed_headers: get("X-Amz-SignedHeaders")?
            .split(';')
            .map(String::from)
            .collect(),
        signature: get("X-Amz-Signature")?.to_string(),
    })
}

/// Verify a presigned request
///
/// `pairs` are the decoded query parameters and `headers` the request headers.
/// The caller is responsible for mapping the access key to `secret_key`.
pub fn verify_presigned(
    method: &str,
    path: &str,
    pairs: &[(String, String)],
    headers: &[(String, String)],
    secret_key: &str,
    now: DateTime<Utc>,
) -> Result<PresignedQuery, SigV4Error> {
    let query = parse_presigned_query(pairs)?;

    if query.timestamp - Duration::seconds(MAX_SKEW_SECS) > now {
        return Err(SigV4Error::NotYetValid);
    }
    if now > query.expires_at() {
        return Err(SigV4Error::Expired);
    }

    for name in &query.signed_headers {
        if !headers.iter().any(|(k, _)| k.eq_ignore_ascii_case(name)) {
            return Err(SigV4Error::MissingSignedHeader(name.clone()));
        }
    }

    let unsigned: Vec<(String, String)> = pairs
        .iter()
        .filter(|(k, _)| k != "X-Amz-Signature")
        .cloned()
        .collect();
    let amz_date = query.timestamp.format(AMZ_DATE_FORMAT).to_string();
    let scope = format!("{}/{}/{}/aws4_request", query.date, query.region, query.service);

    let canonical_request = create_canonical_request(
        method,
        &encode_path(path),
        &canonical_query_string(&unsigned),
        headers,
        &query.signed_headers,
        UNSIGNED_PAYLOAD,
    );
    let string_to_sign = create_string_to_sign(ALGORITHM, &amz_date, &scope, &canonical_request);
    let signing_key = derive_signing_key(secret_key, &query.date, &query.region, &query.service);

    let provided = hex::decode(&query.signature).map_err(|_| SigV4Error::SignatureMismatch)?;
    let mut mac = HmacSha256::new_from_slice(&signing_key).expect("HMAC can take key of any size");
    mac.update(string_to_sign.as_bytes());
    mac.verify_slice(&provided).map_err(|_| {
        debug!(access_key = %query.access_key, "Presigned signature mismatch");
        SigV4Error::SignatureMismatch
    })?;

    Ok(query)
}

/// Sign a string using HMAC-SHA256
fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Derive the signing key
fn derive_signing_key(secret_key: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(format!("AWS4{}", secret_key).as_bytes(), date.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

fn uri_encode(value: &str) -> String {
    utf8_percent_encode(value, URI_ENCODE).to_string()
}

/// Encode each segment; dot segments are escaped so no client resolves them
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| match segment {
            "." => "%2E".to_string(),
            ".." => "%2E%2E".to_string(),
            _ => utf8_percent_encode(segment, PATH_ENCODE).to_string(),
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Encode and sort query parameters by key, then value
fn canonical_query_string(params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (uri_encode(k), uri_encode(v)))
        .collect();
    encoded.sort();

    encoded
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// Create the canonical request string
fn create_canonical_request(
    method: &str,
    path: &str,
    query_string: &str,
    headers: &[(String, String)],
    signed_headers: &[String],
    payload_hash: &str,
) -> String {
    let canonical_headers: String = signed_headers
        .iter()
        .filter_map(|h| {
            headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(h))
                .map(|(k, v)| format!("{}:{}\n", k.to_lowercase(), v.trim()))
        })
        .collect();

    let signed_headers_str = signed_headers.join(";");

    format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        method, path, query_string, canonical_headers, signed_headers_str, payload_hash
    )
}

/// Create the string to sign
fn create_string_to_sign(
    algorithm: &str,
    timestamp: &str,
    scope: &str,
    canonical_request: &str,
) -> String {
    let canonical_hash = hex::encode(Sha256::digest(canonical_request.as_bytes()));
    format!("{}\n{}\n{}\n{}", algorithm, timestamp, scope, canonical_hash)
}
