//! The client the HTTP transport sends connector requests through.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::response::HttpResponse;
use crate::error::Result;

/// The methods the connector issues: `GET` to load, `PUT` to save.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Put,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
        }
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Put => reqwest::Method::PUT,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings baked into an [`HttpClient`] when it is built.
#[derive(Clone, Debug, PartialEq)]
pub struct HttpClientConfig {
    /// Limit on a whole request, body included. `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// Value of the `User-Agent` header.
    pub user_agent: String,
    /// Headers added to every request.
    pub default_headers: http::HeaderMap,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(30)),
            user_agent: format!("webact/{}", env!("CARGO_PKG_VERSION")),
            default_headers: http::HeaderMap::new(),
        }
    }
}

/// Builder for [`HttpClient`].
#[derive(Debug, Default)]
pub struct HttpClientBuilder {
    config: HttpClientConfig,
}

impl HttpClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    pub fn no_timeout(mut self) -> Self {
        self.config.timeout = None;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Send `name: value` with every request.
    ///
    /// Fails with [`NetworkError::InvalidHeader`](crate::NetworkError::InvalidHeader)
    /// when either part is not a legal header token.
    pub fn default_header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = http::HeaderName::try_from(name)?;
        let value = http::HeaderValue::try_from(value)?;
        self.config.default_headers.insert(name, value);
        Ok(self)
    }

    pub fn build(self) -> Result<HttpClient> {
        // The content server tracks the login session with a cookie.
        let mut builder = reqwest::Client::builder()
            .cookie_store(true)
            .user_agent(self.config.user_agent.as_str())
            .default_headers(self.config.default_headers.clone());
        if let Some(timeout) = self.config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;
        tracing::debug!(
            target: "webact_net::http",
            user_agent = %self.config.user_agent,
            timeout = ?self.config.timeout,
            "http client built"
        );
        Ok(HttpClient {
            inner: Arc::new(ClientInner {
                client,
                config: self.config,
            }),
        })
    }
}

struct ClientInner {
    client: reqwest::Client,
    config: HttpClientConfig,
}

/// Sends `GET` and form-encoded `PUT` requests to a content server.
///
/// Clones share one connection pool and cookie jar.
#[derive(Clone)]
pub struct HttpClient {
    inner: Arc<ClientInner>,
}

impl HttpClient {
    /// A client with [`HttpClientConfig::default`] settings.
    pub fn new() -> Result<Self> {
        HttpClientBuilder::new().build()
    }

    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::new()
    }

    pub fn config(&self) -> &HttpClientConfig {
        &self.inner.config
    }

    /// Send `method` to `url`, URL-encoding `form` as the body when given.
    ///
    /// Any status counts as a response here; see
    /// [`HttpResponse::error_for_status_with_body`].
    pub async fn send(
        &self,
        method: HttpMethod,
        url: &str,
        form: Option<&HashMap<String, String>>,
    ) -> Result<HttpResponse> {
        let url = url::Url::parse(url)?;
        tracing::trace!(target: "webact_net::http", %method, %url, "sending request");
        let mut request = self.inner.client.request(method.into(), url);
        if let Some(form) = form {
            request = request.form(form);
        }
        Ok(HttpResponse::from_reqwest(request.send().await?))
    }
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.inner.config)
            .finish()
    }
}
