//! Configuration for the datastore client.

use crate::error::{ClientError, ClientResult};
use std::time::Duration;

/// Environment variable naming the dataset.
pub const DATASET_ENV_VAR: &str = "DATASTORE_DATASET";
/// Fallback environment variable naming the dataset.
pub const GCLOUD_DATASET_ENV_VAR: &str = "GCLOUD_DATASET_ID";
/// Environment variable naming the namespace.
pub const NAMESPACE_ENV_VAR: &str = "DATASTORE_NAMESPACE";
/// Environment variable overriding the API host (e.g. a local emulator).
pub const HOST_ENV_VAR: &str = "DATASTORE_HOST";

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://datastore.googleapis.com";
/// Default API version segment.
pub const DEFAULT_API_VERSION: &str = "v1beta2";

/// Configuration for an HTTP connection.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionConfig {
    /// Base URL of the API.
    pub base_url: String,
    /// API version path segment.
    pub api_version: String,
    /// Request timeout handed to the HTTP client.
    pub timeout: Duration,
}

impl ConnectionConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Sets the base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the API version.
    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the commit endpoint for `dataset_id`.
    pub fn commit_url(&self, dataset_id: &str) -> String {
        format!(
            "{}/datastore/{}/datasets/{}/commit",
            self.base_url.trim_end_matches('/'),
            self.api_version,
            dataset_id
        )
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for a [`Client`](crate::Client).
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Dataset ID every batch of the client writes to.
    pub dataset_id: String,
    /// Namespace, if any.
    pub namespace: Option<String>,
    /// Connection settings.
    pub connection: ConnectionConfig,
}

impl ClientConfig {
    /// Creates a configuration for `dataset_id`.
    pub fn new(dataset_id: impl Into<String>) -> Self {
        Self {
            dataset_id: dataset_id.into(),
            namespace: None,
            connection: ConnectionConfig::default(),
        }
    }

    /// Sets the namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Sets the connection settings.
    pub fn with_connection(mut self, connection: ConnectionConfig) -> Self {
        self.connection = connection;
        self
    }

    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] if no dataset is configured.
    pub fn from_env() -> ClientResult<Self> {
        Self::from_env_with(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`.
    ///
    /// `DATASTORE_DATASET` wins over `GCLOUD_DATASET_ID`; empty values are
    /// treated as unset.
    pub fn from_env_with<F>(lookup: F) -> ClientResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|value| !value.is_empty());

        let dataset_id = read(DATASET_ENV_VAR)
            .or_else(|| read(GCLOUD_DATASET_ENV_VAR))
            .ok_or_else(|| {
                ClientError::Config(format!(
                    "no dataset configured; set {DATASET_ENV_VAR} or {GCLOUD_DATASET_ENV_VAR}"
                ))
            })?;

        let mut config = Self::new(dataset_id);
        config.namespace = read(NAMESPACE_ENV_VAR);
        if let Some(host) = read(HOST_ENV_VAR) {
            config.connection.base_url = host;
        }
        Ok(config)
    }
}
