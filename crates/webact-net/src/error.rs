//! Error types for the networking layer.

use std::fmt;

use webact::model::TreeError;

/// Network-specific errors.
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkError {
    /// HTTP request failed.
    Request(String),
    /// Invalid URL provided.
    InvalidUrl(String),
    /// Request timed out.
    Timeout,
    /// Connection refused or failed.
    Connection(String),
    /// Invalid header name or value.
    InvalidHeader(String),
    /// JSON serialization/deserialization error.
    Json(String),
    /// I/O error.
    Io(String),
    /// The caller stopped waiting for the request.
    Cancelled,
    /// HTTP error status (4xx or 5xx).
    HttpStatus {
        /// The HTTP status code.
        status: u16,
        /// Optional error message from the response body.
        message: Option<String>,
    },
    /// Redirect limit exceeded.
    TooManyRedirects,
    /// The node tree rejected an operation.
    Tree(TreeError),
    /// Invalid connector configuration.
    Config(String),
    /// No tokio runtime was available to run requests on.
    NoRuntime,
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request(msg) => write!(f, "HTTP request error: {msg}"),
            Self::InvalidUrl(msg) => write!(f, "Invalid URL: {msg}"),
            Self::Timeout => write!(f, "Request timed out"),
            Self::Connection(msg) => write!(f, "Connection error: {msg}"),
            Self::InvalidHeader(msg) => write!(f, "Invalid header: {msg}"),
            Self::Json(msg) => write!(f, "JSON error: {msg}"),
            Self::Io(msg) => write!(f, "I/O error: {msg}"),
            Self::Cancelled => write!(f, "Request was cancelled"),
            Self::HttpStatus { status, message } => {
                if let Some(msg) = message {
                    write!(f, "HTTP {status}: {msg}")
                } else {
                    write!(f, "HTTP {status}")
                }
            }
            Self::TooManyRedirects => write!(f, "Too many redirects"),
            Self::Tree(err) => write!(f, "Tree error: {err}"),
            Self::Config(msg) => write!(f, "Configuration error: {msg}"),
            Self::NoRuntime => write!(f, "No tokio runtime available"),
        }
    }
}

impl std::error::Error for NetworkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Tree(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for NetworkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connection(err.to_string())
        } else if err.is_redirect() {
            Self::TooManyRedirects
        } else {
            Self::Request(err.to_string())
        }
    }
}

impl From<url::ParseError> for NetworkError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

impl From<serde_json::Error> for NetworkError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<std::io::Error> for NetworkError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<toml::de::Error> for NetworkError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<http::header::InvalidHeaderName> for NetworkError {
    fn from(err: http::header::InvalidHeaderName) -> Self {
        Self::InvalidHeader(err.to_string())
    }
}

impl From<http::header::InvalidHeaderValue> for NetworkError {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        Self::InvalidHeader(err.to_string())
    }
}

impl From<TreeError> for NetworkError {
    fn from(err: TreeError) -> Self {
        Self::Tree(err)
    }
}

/// A specialized Result type for network operations.
pub type Result<T> = std::result::Result<T, NetworkError>;
