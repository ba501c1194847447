//! HTTP transport
//!
//! This module defines the request/response types every provider speaks, the
//! [`HttpTransport`] capability, and the reqwest-backed implementation used in
//! production.
//!
//! A transport only fails for conditions where no HTTP status exists
//! (connection failures, timeouts). Any status code, including 4xx/5xx, comes
//! back as an [`HttpResponse`] so callers can branch on it (for example a 404
//! that marks a removed package).

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

use crate::Result;

// =============================================================================
// Error Types
// =============================================================================

/// Transport error types
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection-level failure
    #[error("Network error: {0}")]
    Network(String),

    /// The request exceeded the transport deadline
    #[error("Request to {url} timed out")]
    Timeout {
        /// Requested URL
        url: String,
    },

    /// Unexpected HTTP status
    #[error("HTTP {status} from {url}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Requested URL
        url: String,
    },

    /// Response body could not be decoded
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// The request could not be built
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// IO error while writing a response body
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// HTTP status carried by this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Check if the failure is worth retrying
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::Network(_) | TransportError::Timeout { .. } => true,
            TransportError::Status { status, .. } => is_transient_status(*status),
            _ => false,
        }
    }
}

/// Statuses that signal a temporary upstream condition
///
/// Network failure statuses: 408, 425, 429, 500, 502, 503, 504, 522, 524
pub fn is_transient_status(status: u16) -> bool {
    matches!(status, 408 | 425 | 429 | 500 | 502 | 503 | 504 | 522 | 524)
}

// =============================================================================
// Request Types
// =============================================================================

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// GET request
    Get,
    /// POST request
    Post,
}

impl HttpMethod {
    /// Method name as sent on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

/// An outbound HTTP request
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP method
    pub method: HttpMethod,
    /// Absolute URL, without query string
    pub url: String,
    /// Query parameters, in insertion order
    pub query: Vec<(String, String)>,
    /// Request headers
    pub headers: Vec<(String, String)>,
    /// Request body
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Create a GET request
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    /// Create a POST request
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, url)
    }

    /// Add a query parameter
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Add a header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Set a raw body
    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    /// Set the body from JSON, adding the matching content type
    pub fn json_body<T: Serialize>(self, value: &T) -> std::result::Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(value)?;
        Ok(self.header("Content-Type", "application/json").body(body))
    }

    /// Look up a header value (case-insensitive)
    pub fn header_value(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// A fully-read HTTP response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers, keys lowercased
    pub headers: HashMap<String, String>,
    /// Response body
    pub body: Vec<u8>,
    /// URL the response came from
    pub url: String,
}

impl HttpResponse {
    /// Create a new response
    pub fn new(status: u16, url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
            url: url.into(),
        }
    }

    /// Add a header (the key is lowercased)
    pub fn with_header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.insert(key.to_ascii_lowercase(), value.into());
        self
    }

    /// Get a header value (case-insensitive)
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Content type without parameters, e.g. `application/json`
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
            .map(|ct| ct.split(';').next().unwrap_or(ct).trim())
    }

    /// Whether the body is declared as JSON
    pub fn is_json(&self) -> bool {
        self.content_type()
            .map(|ct| ct.eq_ignore_ascii_case("application/json") || ct.ends_with("+json"))
            .unwrap_or(false)
    }

    /// Check if the response is successful (2xx status)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-2xx response into [`TransportError::Status`]
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(TransportError::Status {
                status: self.status,
                url: self.url,
            })
        }
    }

    /// Decode the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Body as lossy UTF-8 text
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

// =============================================================================
// Transport Capability
// =============================================================================

/// Something that can execute HTTP requests
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send a request and read the whole response
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

// =============================================================================
// Client Configuration
// =============================================================================

/// Configuration for the reqwest transport
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Request timeout
    pub timeout: Duration,
    /// User agent string
    pub user_agent: String,
    /// Headers included in every request
    pub default_headers: HashMap<String, String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: format!("theme-gallery/{}", env!("CARGO_PKG_VERSION")),
            default_headers: HashMap::new(),
        }
    }
}

impl TransportConfig {
    /// Set the timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Add a default header
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(key.into(), value.into());
        self
    }
}

// =============================================================================
// Reqwest Transport
// =============================================================================

use reqwest::Client as ReqwestClient;

/// Production transport backed by reqwest
///
/// The configured timeout is the only deadline applied to provider fetches
/// besides explicit cancellation.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: ReqwestClient,
    config: TransportConfig,
}

impl ReqwestTransport {
    /// Create a new transport
    pub fn new(config: TransportConfig) -> Result<Self> {
        let client = ReqwestClient::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| TransportError::InvalidRequest(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Get the transport configuration
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut req = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };

        if !request.query.is_empty() {
            req = req.query(&request.query);
        }

        for (key, value) in &self.config.default_headers {
            req = req.header(key, value);
        }

        for (key, value) in &request.headers {
            req = req.header(key, value);
        }

        if let Some(body) = request.body {
            req = req.body(body);
        }

        tracing::trace!(method = request.method.as_str(), url = %request.url, "sending request");

        let response = req.send().await.map_err(|e| classify(&request.url, e))?;

        let status = response.status().as_u16();
        let url = response.url().to_string();

        let mut headers = HashMap::new();
        for (key, value) in response.headers() {
            if let Ok(value_str) = value.to_str() {
                headers.insert(key.as_str().to_ascii_lowercase(), value_str.to_string());
            }
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| classify(&request.url, e))?
            .to_vec();

        Ok(HttpResponse {
            status,
            headers,
            body,
            url,
        })
    }
}

fn classify(url: &str, err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout {
            url: url.to_string(),
        }
    } else {
        TransportError::Network(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_statuses() {
        for status in [408, 425, 429, 500, 502, 503, 504, 522, 524] {
            assert!(is_transient_status(status), "{status} should be transient");
        }
        for status in [200, 400, 401, 403, 404, 422] {
            assert!(!is_transient_status(status), "{status} should not be transient");
        }
    }

    #[test]
    fn test_error_classification() {
        let err = TransportError::Status {
            status: 503,
            url: "https://example.com".to_string(),
        };
        assert_eq!(err.status(), Some(503));
        assert!(err.is_transient());

        let err = TransportError::Status {
            status: 404,
            url: "https://example.com".to_string(),
        };
        assert!(!err.is_transient());

        assert!(TransportError::Network("reset".to_string()).is_transient());
        assert!(!TransportError::InvalidRequest("bad".to_string()).is_transient());
    }

    #[test]
    fn test_request_builder() {
        let req = HttpRequest::get("https://api.github.com/search/code")
            .query("q", "repo:a/b extension:tmTheme")
            .query("page", "2")
            .header("Accept", "application/vnd.github.v3+json");

        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.query.len(), 2);
        assert_eq!(req.query[1], ("page".to_string(), "2".to_string()));
        assert_eq!(req.header_value("accept"), Some("application/vnd.github.v3+json"));
        assert!(req.body.is_none());
    }

    #[test]
    fn test_request_json_body() {
        let req = HttpRequest::post("https://example.com")
            .json_body(&serde_json::json!({ "pageNumber": 3 }))
            .unwrap();

        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.header_value("Content-Type"), Some("application/json"));
        let body = String::from_utf8(req.body.unwrap()).unwrap();
        assert!(body.contains("pageNumber"));
    }

    #[test]
    fn test_response_helpers() {
        let response = HttpResponse::new(200, "https://example.com/a.json", r#"{"name":"Monokai"}"#)
            .with_header("Content-Type", "application/json; charset=utf-8");

        assert!(response.is_success());
        assert!(response.is_json());
        assert_eq!(response.content_type(), Some("application/json"));
        assert_eq!(response.header("CONTENT-TYPE"), Some("application/json; charset=utf-8"));

        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value["name"], "Monokai");
    }

    #[test]
    fn test_response_error_for_status() {
        let response = HttpResponse::new(404, "https://example.com/missing", "");
        let err = response.error_for_status().unwrap_err();
        assert_eq!(err.status(), Some(404));

        let html = HttpResponse::new(200, "https://example.com", "<html>").with_header("content-type", "text/html");
        assert!(!html.is_json());
    }

    #[test]
    fn test_transport_config_builder() {
        let config = TransportConfig::default()
            .with_timeout(Duration::from_secs(5))
            .with_user_agent("TestAgent/1.0")
            .with_header("X-Custom", "value");

        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.user_agent, "TestAgent/1.0");
        assert_eq!(config.default_headers.get("X-Custom"), Some(&"value".to_string()));

        let transport = ReqwestTransport::new(config).unwrap();
        assert_eq!(transport.config().user_agent, "TestAgent/1.0");
    }

    #[test]
    fn test_default_user_agent() {
        let config = TransportConfig::default();
        assert!(config.user_agent.starts_with("theme-gallery/"));
        assert_eq!(config.timeout, Duration::from_secs(30));
    }
}
