//! Static-list providers
//!
//! Sources that publish their whole gallery as a single JSON array: one GET,
//! one decode, one mapping pass.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

use catalog_core::fetch::admit;
use catalog_core::{CancellationToken, FetchResult, Gallery, Provider, ProviderError, ProviderName, Theme};
use networking::{HttpRequest, HttpTransport, RateGate};

/// Description of one static JSON list source
pub trait StaticSource: Send + Sync + 'static {
    /// One element of the published array
    type Entry: DeserializeOwned + Send;

    /// Provider name, also the `provider` tag of every record
    const NAME: &'static str;

    /// Where the list is published
    fn source_url(&self) -> &str;

    /// Normalize one entry
    fn to_theme(&self, entry: Self::Entry) -> Theme;
}

/// Provider over a [`StaticSource`]
pub struct StaticListProvider<S> {
    source: S,
    transport: Arc<dyn HttpTransport>,
    gate: RateGate,
}

impl<S: StaticSource> StaticListProvider<S> {
    /// Create an unpaced provider
    pub fn new(source: S, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            source,
            transport,
            gate: RateGate::unlimited(),
        }
    }

    /// Change the interval between requests
    pub fn set_request_interval(&self, interval: Duration) {
        self.gate.set_period(interval);
    }

    /// The source description
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Download and decode the raw list
    pub async fn fetch_entries(&self, cancel: &CancellationToken) -> Result<Vec<S::Entry>, ProviderError> {
        if !admit(&self.gate, cancel).await {
            return Err(ProviderError::Cancelled);
        }

        let url = self.source.source_url();
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
            response = self.transport.send(HttpRequest::get(url)) => response?,
        };

        if response.status != 200 {
            tracing::warn!(provider = S::NAME, status = response.status, "gallery not available");
            return Err(ProviderError::SourceUnavailable {
                url: url.to_string(),
                status: response.status,
            });
        }

        let entries: Vec<S::Entry> = serde_json::from_slice(&response.body)?;
        Ok(entries)
    }
}

#[async_trait]
impl<S: StaticSource> Provider for StaticListProvider<S> {
    fn name(&self) -> ProviderName {
        ProviderName::from(S::NAME)
    }

    async fn get_gallery(&self, cancel: &CancellationToken) -> FetchResult {
        let entries = self.fetch_entries(cancel).await?;

        if entries.is_empty() {
            tracing::warn!(provider = S::NAME, "themes not found");
            return Err(ProviderError::NoThemesFound.into());
        }

        let total = entries.len();
        let gallery: Gallery = entries.into_iter().map(|e| self.source.to_theme(e)).collect();
        tracing::info!(provider = S::NAME, total, accepted = gallery.len(), "gallery parsed");

        if gallery.is_empty() {
            tracing::warn!(provider = S::NAME, total, "no valid themes in gallery");
            return Err(ProviderError::NoThemesFound.into());
        }

        Ok(gallery)
    }
}
