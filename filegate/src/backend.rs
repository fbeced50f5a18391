//! Store and handler construction from configuration

use anyhow::Context;
use filegate_auth::Credentials;
use filegate_handlers::{DeleteHandler, DownloadHandler, Handler, HandlerKind, ListHandler, UploadHandler};
use filegate_store::{EphemeralStore, ObjectStore, S3Store};
use std::sync::Arc;
use tracing::info;
use url::Url;

use crate::config::{Config, StoreConfig};

/// The store every handler in this process shares
pub struct Backend {
    pub store: Arc<dyn ObjectStore>,
    /// Set when objects live in this process and the server should serve them
    pub ephemeral: Option<Arc<EphemeralStore>>,
}

impl Backend {
    /// Connect to the configured store
    ///
    /// `default_endpoint` is where an ephemeral store's URLs point when no
    /// endpoint is configured.
    pub async fn connect(config: &Config, default_endpoint: Option<&str>) -> anyhow::Result<Self> {
        let bucket = config.require_bucket()?;

        match &config.store {
            StoreConfig::S3 {
                endpoint_url,
                force_path_style,
            } => {
                info!(bucket = %bucket, endpoint = ?endpoint_url, "Using S3 store");
                let store = S3Store::from_env(bucket, endpoint_url.as_deref(), *force_path_style).await;
                Ok(Self {
                    store: Arc::new(store),
                    ephemeral: None,
                })
            }
            StoreConfig::Ephemeral {
                endpoint,
                region,
                access_key,
                secret_key,
            } => {
                let mut store = EphemeralStore::new(bucket)
                    .with_region(region.as_str())
                    .with_credentials(Credentials::new(access_key.as_str(), secret_key.as_str()));
                if let Some(endpoint) = endpoint.as_deref().or(default_endpoint) {
                    let endpoint = Url::parse(endpoint)
                        .with_context(|| format!("Invalid ephemeral store endpoint: {}", endpoint))?;
                    store = store.with_endpoint(endpoint);
                }

                info!(bucket = %bucket, endpoint = %store.endpoint(), "Using ephemeral store");
                let store = Arc::new(store);
                Ok(Self {
                    store: store.clone(),
                    ephemeral: Some(store),
                })
            }
        }
    }

    pub fn list_handler(&self, config: &Config) -> ListHandler {
        if config.list.enabled {
            ListHandler::listing(self.store.clone(), config.list.max_keys)
        } else {
            ListHandler::stub()
        }
    }
}

/// Build the single handler a Lambda process serves
///
/// The list placeholder needs no bucket, so it starts even when none is
/// configured.
pub async fn build_handler(kind: HandlerKind, config: &Config) -> anyhow::Result<Arc<dyn Handler>> {
    if kind == HandlerKind::List && !config.list.enabled {
        return Ok(Arc::new(ListHandler::stub()));
    }

    let backend = Backend::connect(config, None).await?;
    let handler: Arc<dyn Handler> = match kind {
        HandlerKind::Upload => Arc::new(UploadHandler::new(backend.store)),
        HandlerKind::Download => Arc::new(DownloadHandler::new(backend.store)),
        HandlerKind::Delete => Arc::new(DeleteHandler::new(backend.store)),
        HandlerKind::List => Arc::new(backend.list_handler(config)),
    };
    Ok(handler)
}
