//! In-memory ephemeral store

use super::traits::*;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use filegate_auth::{presign_url, verify_presigned, Credentials};
use md5::{Digest, Md5};
use std::time::Duration;
use tracing::debug;
use url::Url;

const DEFAULT_ENDPOINT: &str = "http://localhost:4566";
const DEFAULT_REGION: &str = "us-east-1";

/// In-memory stored object
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Bytes,
    pub etag: String,
    pub content_type: Option<String>,
    pub last_modified: DateTime<Utc>,
}

/// A single in-memory bucket
///
/// URLs are signed with SigV4 against `endpoint`, so whatever serves that
/// endpoint can check them with [`EphemeralStore::authorize`].
pub struct EphemeralStore {
    bucket: String,
    endpoint: Url,
    region: String,
    credentials: Credentials,
    objects: DashMap<String, StoredObject>,
}

impl EphemeralStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            endpoint: Url::parse(DEFAULT_ENDPOINT).expect("default endpoint is a valid URL"),
            region: DEFAULT_REGION.to_string(),
            credentials: Credentials::new("test", "test"),
            objects: DashMap::new(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = endpoint;
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn compute_etag(data: &[u8]) -> String {
        let mut hasher = Md5::new();
        hasher.update(data);
        format!("\"{}\"", hex::encode(hasher.finalize()))
    }

    fn presign(&self, method: &'static str, key: &str, ttl: Duration) -> Result<PresignedUrl, StoreError> {
        let now = Utc::now();
        let url = presign_url(
            &self.endpoint,
            method,
            &format!("/{}/{}", self.bucket, key),
            &self.region,
            "s3",
            &self.credentials,
            now,
            ttl.as_secs(),
        )
        .map_err(|e| StoreError::Presign(e.to_string()))?;

        let ttl = chrono::Duration::from_std(ttl).map_err(|e| StoreError::InvalidExpiry(e.to_string()))?;
        Ok(PresignedUrl {
            url,
            method,
            expires_at: now + ttl,
        })
    }

    fn check_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        if bucket == self.bucket {
            Ok(())
        } else {
            Err(StoreError::BucketNotFound(bucket.to_string()))
        }
    }

    /// Check a presigned request against this store's credentials
    ///
    /// `pairs` are the decoded query parameters of the incoming request.
    pub fn authorize(
        &self,
        method: &str,
        bucket: &str,
        key: &str,
        pairs: &[(String, String)],
        headers: &[(String, String)],
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.check_bucket(bucket)?;

        let query = verify_presigned(
            method,
            &format!("/{}/{}", bucket, key),
            pairs,
            headers,
            &self.credentials.secret_key,
            now,
        )
        .map_err(|e| StoreError::AccessDenied(e.to_string()))?;

        if query.access_key != self.credentials.access_key {
            return Err(StoreError::AccessDenied(format!(
                "Unknown access key: {}",
                query.access_key
            )));
        }

        Ok(())
    }

    /// Store bytes under `key`, returning the ETag
    pub fn put_object(&self, key: &str, data: Bytes, content_type: Option<String>) -> String {
        let etag = Self::compute_etag(&data);
        debug!(bucket = %self.bucket, key = %key, size = data.len(), "Storing object");

        self.objects.insert(
            key.to_string(),
            StoredObject {
                data,
                etag: etag.clone(),
                content_type,
                last_modified: Utc::now(),
            },
        );

        etag
    }

    pub fn get_object(&self, key: &str) -> Result<StoredObject, StoreError> {
        self.objects
            .get(key)
            .map(|obj| obj.clone())
            .ok_or_else(|| StoreError::ObjectNotFound {
                bucket: self.bucket.clone(),
                key: key.to_string(),
            })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.contains_key(key)
    }
}

#[async_trait]
impl ObjectStore for EphemeralStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn presign_read(&self, key: &str, ttl: Duration) -> Result<PresignedUrl, StoreError> {
        self.presign("GET", key, ttl)
    }

    async fn presign_write(&self, key: &str, ttl: Duration) -> Result<PresignedUrl, StoreError> {
        self.presign("PUT", key, ttl)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let deleted = self.objects.remove(key).is_some();
        debug!(bucket = %self.bucket, key = %key, deleted, "Deleted object");
        Ok(())
    }

    async fn list(
        &self,
        prefix: Option<&str>,
        continuation_token: Option<&str>,
        max_keys: i32,
    ) -> Result<ListPage, StoreError> {
        let prefix = prefix.unwrap_or("");
        let max_keys = usize::try_from(max_keys).unwrap_or(0);

        let mut keys: Vec<String> = self
            .objects
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .filter(|entry| continuation_token.map_or(true, |token| entry.key().as_str() > token))
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();

        let is_truncated = keys.len() > max_keys;
        keys.truncate(max_keys);

        let objects: Vec<ObjectSummary> = keys
            .into_iter()
            .filter_map(|key| {
                self.objects.get(&key).map(|obj| ObjectSummary {
                    size: obj.data.len() as u64,
                    last_modified: Some(obj.last_modified),
                    etag: Some(obj.etag.clone()),
                    key,
                })
            })
            .collect();

        let next_continuation_token = if is_truncated {
            objects.last().map(|obj| obj.key.clone())
        } else {
            None
        };

        Ok(ListPage {
            objects,
            is_truncated,
            next_continuation_token,
        })
    }
}
