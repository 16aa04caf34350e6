//! Responses from the content server.

use crate::error::{NetworkError, Result};

/// A response whose body has not been read yet.
pub struct HttpResponse {
    inner: reqwest::Response,
}

impl HttpResponse {
    pub(crate) fn from_reqwest(response: reqwest::Response) -> Self {
        Self { inner: response }
    }

    pub fn status(&self) -> u16 {
        self.inner.status().as_u16()
    }

    pub fn is_success(&self) -> bool {
        self.inner.status().is_success()
    }

    /// Turn a non-2xx answer into [`NetworkError::HttpStatus`], keeping a
    /// non-empty body as the message.
    pub async fn error_for_status_with_body(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        let status = self.status();
        let message = self.inner.text().await.ok().filter(|text| !text.is_empty());
        Err(NetworkError::HttpStatus { status, message })
    }

    /// Decode the body as JSON. A blank body (a `204` after a save) is `null`.
    pub async fn json_or_null(self) -> Result<serde_json::Value> {
        let body = self.inner.bytes().await?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(serde_json::Value::Null);
        }
        Ok(serde_json::from_slice(&body)?)
    }
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status())
            .field("url", &self.inner.url().as_str())
            .finish()
    }
}
