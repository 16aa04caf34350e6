//! How queued requests reach the server.

use std::collections::HashMap;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde_json::Value;

use crate::error::Result;
use crate::http::{HttpClient, HttpMethod};

/// A request waiting in (or taken from) the connector queue.
#[derive(Clone, Debug, PartialEq)]
pub struct RemoteRequest {
    /// Queue-assigned identifier, `Request_N`.
    pub id: String,
    /// HTTP method.
    pub method: HttpMethod,
    /// Absolute URL.
    pub url: String,
    /// Form fields sent URL-encoded, if any.
    pub form: Option<HashMap<String, String>>,
}

impl RemoteRequest {
    /// A `GET` of `url`. The id is assigned when the request is queued.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            method: HttpMethod::Get,
            url: url.into(),
            form: None,
        }
    }

    /// A `PUT` of `form` to `url`.
    pub fn put(url: impl Into<String>, form: HashMap<String, String>) -> Self {
        Self {
            id: String::new(),
            method: HttpMethod::Put,
            url: url.into(),
            form: Some(form),
        }
    }
}

/// Executes one request and yields the decoded JSON answer.
///
/// The connector never runs two requests of the same connector at once, so
/// implementations do not need to guard against that themselves.
pub trait Transport: Send + Sync + 'static {
    fn execute(&self, request: RemoteRequest) -> BoxFuture<'static, Result<Value>>;
}

/// [`Transport`] backed by [`HttpClient`].
///
/// Non-2xx answers become [`NetworkError::HttpStatus`](crate::NetworkError::HttpStatus);
/// an empty body decodes to `null`.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: HttpClient,
}

impl HttpTransport {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    /// The underlying client.
    pub fn client(&self) -> &HttpClient {
        &self.client
    }
}

impl Transport for HttpTransport {
    fn execute(&self, request: RemoteRequest) -> BoxFuture<'static, Result<Value>> {
        let client = self.client.clone();
        async move {
            let response = client
                .send(request.method, &request.url, request.form.as_ref())
                .await?
                .error_for_status_with_body()
                .await?;
            response.json_or_null().await
        }
        .boxed()
    }
}
