//! File listing
//!
//! Out of the box this is a placeholder that answers every request with the
//! same message and never touches the store. Listing mode enumerates the
//! bucket one page at a time instead.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use filegate_core::HandlerError;
use filegate_store::ObjectStore;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use crate::event::GatewayRequest;
use crate::handler::{to_body, Handler};

pub const LIST_MESSAGE: &str = "Hello from list-files Lambda (Rust)!";

/// Upper bound on keys per page, matching S3
pub const MAX_LIST_KEYS: i32 = 1000;

#[derive(Debug, Serialize)]
struct StaticResponse {
    message: &'static str,
}

#[derive(Debug, Serialize)]
struct FileEntry {
    file_id: String,
    size: u64,
    last_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
struct ListResponse {
    files: Vec<FileEntry>,
    is_truncated: bool,
    next_continuation_token: Option<String>,
}

enum ListMode {
    Static,
    Listing {
        store: Arc<dyn ObjectStore>,
        max_keys: i32,
    },
}

pub struct ListHandler {
    mode: ListMode,
}

impl ListHandler {
    /// Placeholder that always returns [`LIST_MESSAGE`]
    pub fn stub() -> Self {
        Self {
            mode: ListMode::Static,
        }
    }

    /// Enumerate `store`, `max_keys` per page unless the request asks for fewer
    pub fn listing(store: Arc<dyn ObjectStore>, max_keys: i32) -> Self {
        Self {
            mode: ListMode::Listing {
                store,
                max_keys: max_keys.clamp(1, MAX_LIST_KEYS),
            },
        }
    }

    pub fn is_stub(&self) -> bool {
        matches!(self.mode, ListMode::Static)
    }

    async fn list_page(
        store: &dyn ObjectStore,
        default_max_keys: i32,
        request: &GatewayRequest,
    ) -> Result<Value, HandlerError> {
        let max_keys = match request.query_param("max_keys") {
            Some(raw) => raw
                .parse::<i32>()
                .map_err(|_| HandlerError::invalid_parameter("max_keys"))?
                .clamp(1, MAX_LIST_KEYS),
            None => default_max_keys,
        };
        let prefix = request.query_param("prefix");

        let page = store
            .list(prefix, request.query_param("continuation_token"), max_keys)
            .await
            .map_err(HandlerError::store)?;

        info!(
            bucket = %store.bucket(),
            prefix = ?prefix,
            count = page.objects.len(),
            truncated = page.is_truncated,
            "Listed files"
        );

        to_body(&ListResponse {
            files: page
                .objects
                .into_iter()
                .map(|obj| FileEntry {
                    file_id: obj.key,
                    size: obj.size,
                    last_modified: obj.last_modified,
                })
                .collect(),
            is_truncated: page.is_truncated,
            next_continuation_token: page.next_continuation_token,
        })
    }
}

impl Default for ListHandler {
    fn default() -> Self {
        Self::stub()
    }
}

#[async_trait]
impl Handler for ListHandler {
    fn name(&self) -> &'static str {
        "list"
    }

    async fn handle(&self, request: &GatewayRequest) -> Result<Value, HandlerError> {
        debug!(event = ?request, "List event");

        match &self.mode {
            ListMode::Static => to_body(&StaticResponse {
                message: LIST_MESSAGE,
            }),
            ListMode::Listing { store, max_keys } => {
                Self::list_page(store.as_ref(), *max_keys, request).await
            }
        }
    }
}
