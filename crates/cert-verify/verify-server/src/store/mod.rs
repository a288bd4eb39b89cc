//! Content stores that hold certificate bodies by identifier.
//!
//! The resolver only ever sees [`ContentStore`]; which backend sits behind it
//! is decided once at startup from [`StoreConfig`].

pub mod http;
pub mod local;

use std::{
    path::PathBuf,
    str::FromStr,
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

pub use self::{
    http::HttpContentStore,
    local::LocalContentStore,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("object `{0}` not found")]
    NotFound(String),
    #[error("store unreachable: {0}")]
    Unreachable(String),
    #[error("store did not answer within {0:?}")]
    Timeout(Duration),
    #[error("store error: {0}")]
    Backend(String),
    #[error("invalid object path `{0}`")]
    InvalidPath(String),
}

impl StoreError {
    /// Whether the failure is the caller's fault (bad identifier) rather
    /// than the store's.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::InvalidPath(_))
    }
}

/// Read access to certificate bodies, shared by all workers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Fetches the raw bytes stored under a container-relative path.
    async fn get(&self, path: &str) -> Result<Bytes, StoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreProvider {
    Http,
    Local,
}

impl FromStr for StoreProvider {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "local" => Ok(Self::Local),
            _ => Err(format!("Invalid store provider: {s}")),
        }
    }
}

/// Storage parameters supplied out of band.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub provider: StoreProvider,
    pub container: String,
    pub base_url: Option<Url>,
    pub auth_token: Option<String>,
    pub root: Option<PathBuf>,
    pub timeout: Duration,
}

pub fn create_content_store(config: &StoreConfig) -> anyhow::Result<Arc<dyn ContentStore>> {
    match config.provider {
        StoreProvider::Http => {
            let base_url = config
                .base_url
                .clone()
                .ok_or_else(|| anyhow::anyhow!("http store provider requires a base url"))?;
            Ok(Arc::new(HttpContentStore::new(
                base_url,
                config.container.clone(),
                config.auth_token.clone(),
                config.timeout,
            )?))
        }
        StoreProvider::Local => {
            let root = config
                .root
                .clone()
                .ok_or_else(|| anyhow::anyhow!("local store provider requires a root directory"))?;
            Ok(Arc::new(LocalContentStore::new(
                root,
                config.container.clone(),
            )))
        }
    }
}

/// Maps a certificate identifier to a path relative to the container.
///
/// URLs lose their scheme and host, and a leading `{container}/` segment is
/// dropped, so `https://cdn.example.com/certs/2024/a.json` with container
/// `certs` becomes `2024/a.json`. Anything else is used as given.
pub fn container_relative_path(identifier: &str, container: &str) -> String {
    let path = match Url::parse(identifier) {
        Ok(url) if url.has_host() => url.path().to_string(),
        _ => identifier.to_string(),
    };
    let path = path.trim_start_matches('/');
    let prefix = format!("{}/", container.trim_matches('/'));
    path.strip_prefix(&prefix).unwrap_or(path).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_host_and_container_from_urls() {
        assert_eq!(
            container_relative_path("https://cdn.example.com/certs/2024/a.json", "certs"),
            "2024/a.json"
        );
        assert_eq!(
            container_relative_path("https://cdn.example.com/other/a.json", "certs"),
            "other/a.json"
        );
    }

    #[test]
    fn keeps_plain_identifiers() {
        assert_eq!(container_relative_path("2024/a.json", "certs"), "2024/a.json");
        assert_eq!(container_relative_path("/certs/a.json", "certs"), "a.json");
    }

    #[test]
    fn parses_provider_case_insensitively() {
        assert_eq!("HTTP".parse::<StoreProvider>(), Ok(StoreProvider::Http));
        assert_eq!("local".parse::<StoreProvider>(), Ok(StoreProvider::Local));
        assert!("azure".parse::<StoreProvider>().is_err());
    }

    #[test]
    fn provider_requires_its_location() {
        let config = StoreConfig {
            provider: StoreProvider::Http,
            container: "certs".to_string(),
            base_url: None,
            auth_token: None,
            root: None,
            timeout: Duration::from_secs(1),
        };
        assert!(create_content_store(&config).is_err());

        let config = StoreConfig {
            provider: StoreProvider::Local,
            ..config
        };
        assert!(create_content_store(&config).is_err());
    }

    #[test]
    fn not_found_is_a_client_error() {
        assert!(StoreError::NotFound("a".into()).is_client_error());
        assert!(!StoreError::Unreachable("down".into()).is_client_error());
        assert!(!StoreError::Timeout(Duration::from_secs(1)).is_client_error());
    }
}
