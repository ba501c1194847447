//! Networking utilities for the theme gallery
//!
//! This crate provides the HTTP transport shared by every theme provider,
//! with retry logic, request pacing, and theme file downloads. Providers only
//! ever see the [`HttpTransport`] capability, so tests can swap in fakes or a
//! mock server.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod download;
pub mod rate;
pub mod retry;

pub use client::{
    is_transient_status, HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport,
    TransportConfig, TransportError,
};
pub use download::{download_to, theme_file_name};
pub use rate::RateGate;
pub use retry::{RetryPolicy, RetryingTransport};

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;
