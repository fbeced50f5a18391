//! Object store traits

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

/// Errors from store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Bucket not found: {0}")]
    BucketNotFound(String),

    #[error("Object not found: {bucket}/{key}")]
    ObjectNotFound { bucket: String, key: String },

    #[error("Invalid expiry: {0}")]
    InvalidExpiry(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Failed to presign request: {0}")]
    Presign(String),

    #[error("{0}")]
    Service(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// A presigned URL and when it stops working
#[derive(Debug, Clone)]
pub struct PresignedUrl {
    pub url: String,
    pub method: &'static str,
    pub expires_at: DateTime<Utc>,
}

/// Summary of an object in a listing
#[derive(Debug, Clone)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub etag: Option<String>,
}

/// One page of a listing
#[derive(Debug, Default)]
pub struct ListPage {
    pub objects: Vec<ObjectSummary>,
    pub is_truncated: bool,
    pub next_continuation_token: Option<String>,
}

/// Client for the single bucket a process serves
///
/// Implementations are configured once at startup and shared between
/// concurrent invocations.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Name of the bucket every operation targets
    fn bucket(&self) -> &str;

    /// Mint a URL that allows one GET of `key` for `ttl`
    async fn presign_read(&self, key: &str, ttl: Duration) -> Result<PresignedUrl, StoreError>;

    /// Mint a URL that allows one PUT of `key` for `ttl`
    async fn presign_write(&self, key: &str, ttl: Duration) -> Result<PresignedUrl, StoreError>;

    /// Delete `key`. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// List keys in lexicographic order
    async fn list(
        &self,
        prefix: Option<&str>,
        continuation_token: Option<&str>,
        max_keys: i32,
    ) -> Result<ListPage, StoreError>;
}

/// Instant a URL minted now with `ttl` expires
pub(crate) fn expiry_from_now(ttl: Duration) -> Result<DateTime<Utc>, StoreError> {
    let ttl = chrono::Duration::from_std(ttl).map_err(|e| StoreError::InvalidExpiry(e.to_string()))?;
    Ok(Utc::now() + ttl)
}
