//! Configuration management

use anyhow::{bail, Context};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Variable the deployed functions read their bucket from
pub const FILES_BUCKET_ENV: &str = "FILES_BUCKET";

const ENV_PREFIX: &str = "FILEGATE";
const DEFAULT_MAX_KEYS: i32 = 1000;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bucket: String,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub list: ListConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreConfig {
    S3 {
        #[serde(default)]
        endpoint_url: Option<String>,
        #[serde(default)]
        force_path_style: bool,
    },

    Ephemeral {
        #[serde(default)]
        endpoint: Option<String>,
        #[serde(default = "default_region")]
        region: String,
        #[serde(default = "default_test_key")]
        access_key: String,
        #[serde(default = "default_test_key")]
        secret_key: String,
    },
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::S3 {
            endpoint_url: None,
            force_path_style: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ListConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_max_keys")]
    pub max_keys: i32,
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_keys: default_max_keys(),
        }
    }
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_test_key() -> String {
    "test".to_string()
}

fn default_max_keys() -> i32 {
    DEFAULT_MAX_KEYS
}

impl Config {
    /// Load configuration from file and the process environment
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        Self::from_sources(path, std::env::vars().collect())
    }

    /// Load configuration from file and the given environment
    ///
    /// Precedence, lowest first: the file, `FILEGATE_*` variables, then
    /// `FILES_BUCKET` for the bucket.
    pub fn from_sources(path: Option<&Path>, env: HashMap<String, String>) -> anyhow::Result<Self> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name("filegate").required(false),
        };
        let files_bucket = env
            .get(FILES_BUCKET_ENV)
            .filter(|bucket| !bucket.is_empty())
            .cloned();

        let config = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(Some(env)),
            )
            .set_override_option("bucket", files_bucket)?
            .build()
            .context("Failed to read configuration")?;

        let config = config
            .try_deserialize::<Config>()
            .context("Invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if !(1..=DEFAULT_MAX_KEYS).contains(&self.list.max_keys) {
            bail!(
                "list.max_keys must be between 1 and {}, got {}",
                DEFAULT_MAX_KEYS,
                self.list.max_keys
            );
        }
        if let StoreConfig::Ephemeral {
            endpoint: Some(endpoint),
            ..
        } = &self.store
        {
            url::Url::parse(endpoint)
                .with_context(|| format!("Invalid ephemeral store endpoint: {}", endpoint))?;
        }
        Ok(())
    }

    /// The configured bucket, or an error naming the variable to set
    pub fn require_bucket(&self) -> anyhow::Result<&str> {
        let bucket = self.bucket.trim();
        if bucket.is_empty() {
            bail!(
                "No bucket configured: set {} (or {}_BUCKET)",
                FILES_BUCKET_ENV,
                ENV_PREFIX
            );
        }
        Ok(bucket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn load(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        Config::from_sources(None, env(pairs))
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();

        assert_eq!(config.bucket, "");
        assert_eq!(config.store, StoreConfig::default());
        assert_eq!(config.list, ListConfig::default());
        assert!(config.require_bucket().is_err());
    }

    #[test]
    fn test_files_bucket() {
        let config = load(&[("FILES_BUCKET", "uploads")]).unwrap();
        assert_eq!(config.require_bucket().unwrap(), "uploads");
    }

    #[test]
    fn test_files_bucket_overrides_prefixed() {
        let config = load(&[("FILEGATE_BUCKET", "other"), ("FILES_BUCKET", "uploads")]).unwrap();
        assert_eq!(config.bucket, "uploads");

        let config = load(&[("FILEGATE_BUCKET", "other"), ("FILES_BUCKET", "")]).unwrap();
        assert_eq!(config.bucket, "other");
    }

    #[test]
    fn test_blank_bucket_rejected() {
        let config = load(&[("FILES_BUCKET", "   ")]).unwrap();
        let err = config.require_bucket().unwrap_err();
        assert!(err.to_string().contains("FILES_BUCKET"));
    }

    #[test]
    fn test_ephemeral_store_from_env() {
        let config = load(&[
            ("FILES_BUCKET", "uploads"),
            ("FILEGATE_STORE__TYPE", "ephemeral"),
            ("FILEGATE_STORE__ENDPOINT", "http://localhost:9000"),
        ])
        .unwrap();

        assert_eq!(
            config.store,
            StoreConfig::Ephemeral {
                endpoint: Some("http://localhost:9000".to_string()),
                region: "us-east-1".to_string(),
                access_key: "test".to_string(),
                secret_key: "test".to_string(),
            }
        );
    }

    #[test]
    fn test_list_settings() {
        let config = load(&[
            ("FILEGATE_LIST__ENABLED", "true"),
            ("FILEGATE_LIST__MAX_KEYS", "50"),
        ])
        .unwrap();
        assert!(config.list.enabled);
        assert_eq!(config.list.max_keys, 50);

        assert!(load(&[("FILEGATE_LIST__MAX_KEYS", "0")]).is_err());
        assert!(load(&[("FILEGATE_LIST__MAX_KEYS", "5000")]).is_err());
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let result = load(&[
            ("FILEGATE_STORE__TYPE", "ephemeral"),
            ("FILEGATE_STORE__ENDPOINT", "not a url"),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_config_file() {
        let dir = std::env::temp_dir().join(format!("filegate-config-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("filegate.toml");

        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
bucket = "from-file"

[store]
type = "s3"
endpoint_url = "http://localhost:4566"
force_path_style = true

[list]
enabled = true
"#
        )
        .unwrap();

        let config = Config::from_sources(Some(&path), env(&[])).unwrap();
        assert_eq!(config.bucket, "from-file");
        assert_eq!(
            config.store,
            StoreConfig::S3 {
                endpoint_url: Some("http://localhost:4566".to_string()),
                force_path_style: true,
            }
        );
        assert!(config.list.enabled);
        assert_eq!(config.list.max_keys, 1000);

        let config = Config::from_sources(Some(&path), env(&[("FILES_BUCKET", "from-env")])).unwrap();
        assert_eq!(config.bucket, "from-env");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_config_file() {
        let path = std::env::temp_dir().join("filegate-does-not-exist.toml");
        assert!(Config::from_sources(Some(&path), env(&[])).is_err());
    }
}
