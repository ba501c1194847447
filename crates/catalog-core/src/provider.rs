//! The provider capability
//!
//! A provider fetches one upstream source and normalizes it into a
//! [`Gallery`]. Failures carry whatever partial gallery was assembled before
//! the error so callers can still keep best-effort output.

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[cfg(test)]
use mockall::automock;

use networking::TransportError;

use crate::model::{Gallery, ProviderName};
use crate::repository::RepoError;

/// Errors raised while fetching a source
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The source answered with an unexpected status
    #[error("source {url} unavailable (HTTP {status})")]
    SourceUnavailable {
        /// Requested URL
        url: String,
        /// HTTP status
        status: u16,
    },

    /// The payload did not match the expected schema
    #[error("decode error: {0}")]
    Decode(String),

    /// The source reported no themes at all
    #[error("no themes found")]
    NoThemesFound,

    /// A paged source did not report its total count
    #[error("source did not report a total count")]
    MissingTotal,

    /// An endpoint URL could not be built from configuration
    #[error("invalid endpoint: {0}")]
    Endpoint(String),

    /// Transport failure
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Repository identity failure
    #[error(transparent)]
    Repository(#[from] RepoError),

    /// The fetch was cancelled by the caller
    #[error("fetch cancelled")]
    Cancelled,

    /// A fan-out task panicked or was aborted
    #[error("fetch task failed: {0}")]
    Task(String),
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::Decode(err.to_string())
    }
}

impl ProviderError {
    /// Whether the failure is a temporary upstream condition
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::SourceUnavailable { status, .. } => networking::is_transient_status(*status),
            ProviderError::Transport(e) => e.is_transient(),
            ProviderError::Repository(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Whether the caller cancelled the fetch
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ProviderError::Cancelled)
    }
}

/// A failed fetch with the best-effort gallery assembled before the error
#[derive(Debug, Error)]
#[error("{error}")]
pub struct FetchFailure {
    /// What went wrong
    #[source]
    pub error: ProviderError,
    /// Records gathered before the failure
    pub partial: Gallery,
}

impl FetchFailure {
    /// Pair an error with a partial gallery
    pub fn new(error: ProviderError, partial: Gallery) -> Self {
        Self { error, partial }
    }
}

impl From<ProviderError> for FetchFailure {
    fn from(error: ProviderError) -> Self {
        Self::new(error, Gallery::new())
    }
}

/// Outcome of [`Provider::get_gallery`]
pub type FetchResult = std::result::Result<Gallery, FetchFailure>;

/// Fetches and normalizes theme metadata from one external source
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable name, also used as the `provider` tag of every record
    fn name(&self) -> ProviderName;

    /// Fetch the whole source
    ///
    /// An empty source is reported as [`ProviderError::NoThemesFound`], never
    /// as an empty success. Cancelling `cancel` stops new requests from
    /// starting; records gathered so far come back in the failure.
    async fn get_gallery(&self, cancel: &CancellationToken) -> FetchResult;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Theme;
    use std::error::Error as _;

    #[test]
    fn test_failure_display_and_source() {
        let failure = FetchFailure::new(ProviderError::MissingTotal, Gallery::new());
        assert_eq!(failure.to_string(), "source did not report a total count");
        assert!(failure.source().is_some());
    }

    #[test]
    fn test_from_provider_error_has_empty_partial() {
        let failure: FetchFailure = ProviderError::NoThemesFound.into();
        assert!(failure.partial.is_empty());
    }

    #[test]
    fn test_transient_classification() {
        assert!(ProviderError::SourceUnavailable {
            url: "u".to_string(),
            status: 503
        }
        .is_transient());
        assert!(!ProviderError::SourceUnavailable {
            url: "u".to_string(),
            status: 404
        }
        .is_transient());
        assert!(ProviderError::Repository(RepoError::RateLimitExceeded).is_transient());
        assert!(!ProviderError::NoThemesFound.is_transient());
        assert!(ProviderError::Cancelled.is_cancelled());
    }

    #[test]
    fn test_decode_from_serde() {
        let err = serde_json::from_str::<Vec<Theme>>("{").unwrap_err();
        assert!(matches!(ProviderError::from(err), ProviderError::Decode(_)));
    }

    #[tokio::test]
    async fn test_mock_provider() {
        let mut mock = MockProvider::new();
        mock.expect_name().return_const(ProviderName::from("Mock"));
        mock.expect_get_gallery()
            .returning(|_| Err(ProviderError::NoThemesFound.into()));

        assert_eq!(mock.name().as_str(), "Mock");
        let err = mock.get_gallery(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err.error, ProviderError::NoThemesFound));
    }
}
