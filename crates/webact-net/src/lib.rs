//! Networking for webact.
//!
//! This crate connects the webact node tree to a content server:
//!
//! - **HTTP Client**: a small `reqwest` wrapper with builder-style configuration
//! - **Connector**: mirrors remote nodes into a [`Tree`](webact::model::Tree)
//!   and serializes every load and save through a one-at-a-time request queue
//!
//! # Connector
//!
//! ```ignore
//! use webact_net::connector::{Connector, ConnectorConfig};
//!
//! let config = ConnectorConfig::from_toml_file("connector.toml")?;
//! let connector = Connector::from_config(config)?;
//!
//! // Loads are queued; the continuation runs once the node is populated
//! connector.load("/docs", |result| match result {
//!     Ok(node) => println!("loaded {node:?}"),
//!     Err(err) => eprintln!("load failed: {err}"),
//! })?;
//!
//! // Or wait for it
//! let docs = connector.fetch("/docs").await?;
//! println!("{}", connector.tree().describe(docs));
//! ```
//!
//! # Custom Transports
//!
//! The queue is independent of HTTP. Anything implementing
//! [`Transport`](connector::Transport) can stand in for the server, which is
//! how the queue is exercised in tests.

pub mod connector;
mod error;
pub mod http;

pub use connector::{
    Connector, ConnectorBuilder, ConnectorConfig, ConnectorEvent, ConnectorEventKind,
    RemoteNode, RemoteNodeData, RemoteRequest, Transport,
};
pub use error::{NetworkError, Result};
pub use http::{HttpClient, HttpClientBuilder, HttpClientConfig, HttpMethod, HttpResponse};
