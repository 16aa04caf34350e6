//! HTTP plumbing for the connector's default transport.
//!
//! # Example
//!
//! ```ignore
//! use webact_net::http::{HttpClient, HttpMethod};
//!
//! let client = HttpClient::builder().user_agent("catalog/1.0").build()?;
//! let user = client
//!     .send(HttpMethod::Get, "https://example.com/whoami", None)
//!     .await?
//!     .error_for_status_with_body()
//!     .await?
//!     .json_or_null()
//!     .await?;
//! ```

mod client;
mod response;

pub use client::{HttpClient, HttpClientBuilder, HttpClientConfig, HttpMethod};
pub use response::HttpResponse;
