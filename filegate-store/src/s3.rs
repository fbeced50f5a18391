//! S3 store backed by aws-sdk-s3

use super::traits::*;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{debug, info};

/// Store talking to a real S3-compatible service
///
/// Signing happens locally with the client's credentials; only `delete` and
/// `list` go over the network.
#[derive(Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Build a client from the standard AWS environment (credentials, region)
    pub async fn from_env(
        bucket: impl Into<String>,
        endpoint_url: Option<&str>,
        force_path_style: bool,
    ) -> Self {
        let sdk_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        let mut builder =
            aws_sdk_s3::config::Builder::from(&sdk_config).force_path_style(force_path_style);
        if let Some(url) = endpoint_url {
            builder = builder.endpoint_url(url);
        }

        let bucket = bucket.into();
        info!(bucket = %bucket, endpoint = ?endpoint_url, "Configured S3 store");
        Self::new(Client::from_conf(builder.build()), bucket)
    }

    fn presigning_config(ttl: Duration) -> Result<PresigningConfig, StoreError> {
        PresigningConfig::expires_in(ttl).map_err(|e| StoreError::InvalidExpiry(e.to_string()))
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn presign_read(&self, key: &str, ttl: Duration) -> Result<PresignedUrl, StoreError> {
        let expires_at = expiry_from_now(ttl)?;
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(Self::presigning_config(ttl)?)
            .await
            .map_err(|e| StoreError::Presign(DisplayErrorContext(&e).to_string()))?;

        Ok(PresignedUrl {
            url: request.uri().to_string(),
            method: "GET",
            expires_at,
        })
    }

    async fn presign_write(&self, key: &str, ttl: Duration) -> Result<PresignedUrl, StoreError> {
        let expires_at = expiry_from_now(ttl)?;
        let request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(Self::presigning_config(ttl)?)
            .await
            .map_err(|e| StoreError::Presign(DisplayErrorContext(&e).to_string()))?;

        Ok(PresignedUrl {
            url: request.uri().to_string(),
            method: "PUT",
            expires_at,
        })
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StoreError::Service(DisplayErrorContext(&e).to_string()))?;

        debug!(bucket = %self.bucket, key = %key, "Deleted object");
        Ok(())
    }

    async fn list(
        &self,
        prefix: Option<&str>,
        continuation_token: Option<&str>,
        max_keys: i32,
    ) -> Result<ListPage, StoreError> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .set_prefix(prefix.map(String::from))
            .set_continuation_token(continuation_token.map(String::from))
            .max_keys(max_keys)
            .send()
            .await
            .map_err(|e| StoreError::Service(DisplayErrorContext(&e).to_string()))?;

        let objects = output
            .contents()
            .iter()
            .filter_map(|obj| {
                let key = obj.key()?.to_string();
                Some(ObjectSummary {
                    key,
                    size: obj.size().and_then(|s| u64::try_from(s).ok()).unwrap_or(0),
                    last_modified: obj
                        .last_modified()
                        .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos())),
                    etag: obj.e_tag().map(String::from),
                })
            })
            .collect();

        Ok(ListPage {
            objects,
            is_truncated: output.is_truncated().unwrap_or(false),
            next_continuation_token: output.next_continuation_token().map(String::from),
        })
    }
}
