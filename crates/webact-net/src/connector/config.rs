//! Connector configuration.
//!
//! Settings can be built in code with [`ConnectorBuilder`] or read from TOML:
//!
//! ```toml
//! base_url = "https://catalog.example.com/content"
//! whoami_path = "whoami"
//! timeout_secs = 20
//! user_agent = "catalog-ui/2.1"
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::runtime::Handle;

use super::transport::{HttpTransport, Transport};
use super::Connector;
use crate::error::{NetworkError, Result};
use crate::http::HttpClient;

/// Settings for a [`Connector`].
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectorConfig {
    /// Server URL every node path is resolved against.
    pub base_url: String,
    /// Path of the endpoint describing the current user.
    pub whoami_path: String,
    /// Request timeout in seconds (`None` disables it).
    pub timeout_secs: Option<u64>,
    /// User agent sent with every request.
    pub user_agent: Option<String>,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/".to_string(),
            whoami_path: "whoami".to_string(),
            timeout_secs: Some(30),
            user_agent: None,
        }
    }
}

impl ConnectorConfig {
    /// Configuration for `base_url` with every other setting at its default.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Check that the base URL is absolute.
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.base_url)?;
        if url.cannot_be_a_base() {
            return Err(NetworkError::Config(format!(
                "base_url '{}' cannot be a base",
                self.base_url
            )));
        }
        if self.whoami_path.trim_matches('/').is_empty() {
            return Err(NetworkError::Config("whoami_path is empty".to_string()));
        }
        Ok(())
    }

    /// The request timeout.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Resolve `path` against the base URL.
    ///
    /// ```
    /// use webact_net::connector::ConnectorConfig;
    ///
    /// let config = ConnectorConfig::new("https://example.com/content/");
    /// assert_eq!(config.url_for("/docs/intro"), "https://example.com/content/docs/intro");
    /// ```
    pub fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// The URL of the whoami endpoint.
    pub fn whoami_url(&self) -> String {
        self.url_for(&self.whoami_path)
    }

    /// Build the HTTP client these settings describe.
    pub fn http_client(&self) -> Result<HttpClient> {
        let mut builder = HttpClient::builder();
        builder = match self.timeout() {
            Some(timeout) => builder.timeout(timeout),
            None => builder.no_timeout(),
        };
        if let Some(user_agent) = &self.user_agent {
            builder = builder.user_agent(user_agent);
        }
        builder
            .default_header("accept", "application/json")?
            .build()
    }
}

/// Builder for creating a [`Connector`].
///
/// # Example
///
/// ```ignore
/// use webact_net::connector::Connector;
///
/// let connector = Connector::builder("https://catalog.example.com/content")
///     .user_agent("catalog-ui/2.1")
///     .build()?;
/// ```
pub struct ConnectorBuilder {
    config: ConnectorConfig,
    transport: Option<Arc<dyn Transport>>,
    client: Option<HttpClient>,
    runtime: Option<Handle>,
}

impl ConnectorBuilder {
    /// Start from the defaults with `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::from_config(ConnectorConfig::new(base_url))
    }

    /// Start from an existing configuration.
    pub fn from_config(config: ConnectorConfig) -> Self {
        Self {
            config,
            transport: None,
            client: None,
            runtime: None,
        }
    }

    /// Set the whoami endpoint path.
    pub fn whoami_path(mut self, path: impl Into<String>) -> Self {
        self.config.whoami_path = path.into();
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout_secs = Some(timeout.as_secs());
        self
    }

    /// Set the user agent.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = Some(user_agent.into());
        self
    }

    /// Use a preconfigured HTTP client instead of one built from the settings.
    pub fn http_client(mut self, client: HttpClient) -> Self {
        self.client = Some(client);
        self
    }

    /// Send requests through `transport` instead of HTTP.
    pub fn transport(mut self, transport: impl Transport) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Spawn requests on `runtime` instead of the ambient one.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Build the connector.
    ///
    /// Fails with [`NetworkError::NoRuntime`] when no runtime was given and
    /// the caller is not inside a tokio runtime.
    pub fn build(self) -> Result<Connector> {
        self.config.validate()?;
        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|_| NetworkError::NoRuntime)?,
        };
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => {
                let client = match self.client {
                    Some(client) => client,
                    None => self.config.http_client()?,
                };
                Arc::new(HttpTransport::new(client))
            }
        };
        Ok(Connector::from_parts(self.config, transport, runtime))
    }
}

impl std::fmt::Debug for ConnectorBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorBuilder")
            .field("config", &self.config)
            .field("custom_transport", &self.transport.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_toml_str() {
        let config = ConnectorConfig::from_toml_str(
            r#"
            base_url = "https://example.com/content"
            timeout_secs = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.base_url, "https://example.com/content");
        assert_eq!(config.whoami_path, "whoami");
        assert_eq!(config.timeout(), Some(Duration::from_secs(5)));
        assert_eq!(config.user_agent, None);
    }

    #[test]
    fn test_rejects_bad_config() {
        assert!(matches!(
            ConnectorConfig::from_toml_str("base_url = \"not a url\""),
            Err(NetworkError::InvalidUrl(_))
        ));
        assert!(matches!(
            ConnectorConfig::from_toml_str("base_uri = \"https://example.com\""),
            Err(NetworkError::Config(_))
        ));
        assert!(matches!(
            ConnectorConfig::from_toml_str("base_url = \"mailto:someone@example.com\""),
            Err(NetworkError::Config(_))
        ));
    }

    #[test]
    fn test_url_for() {
        let config = ConnectorConfig::new("https://example.com/content");
        assert_eq!(config.url_for("a/b"), "https://example.com/content/a/b");
        assert_eq!(config.url_for("/a"), "https://example.com/content/a");
        assert_eq!(config.url_for(""), "https://example.com/content/");
        assert_eq!(config.whoami_url(), "https://example.com/content/whoami");
    }

    #[test]
    fn test_build_without_runtime() {
        let result = ConnectorBuilder::new("https://example.com").build();
        assert!(matches!(result, Err(NetworkError::NoRuntime)));
    }
}
