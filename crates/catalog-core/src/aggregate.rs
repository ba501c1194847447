//! Gallery aggregation
//!
//! Runs every provider independently and concatenates their galleries. One
//! provider failing never aborts the others; its error is reported next to
//! the merged output, and any partial gallery it produced is kept.

use futures::future::join_all;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::model::{Gallery, ProviderName};
use crate::provider::{Provider, ProviderError};
use crate::registry::ProviderRegistry;

/// A provider that failed during aggregation
#[derive(Debug, Error)]
#[error("provider '{provider}' failed: {error}")]
pub struct SourceFailure {
    /// Failing provider
    pub provider: ProviderName,
    /// Why it failed
    #[source]
    pub error: ProviderError,
}

/// Merged gallery plus per-provider failures
#[derive(Debug, Default)]
pub struct Aggregation {
    /// Concatenation of every provider's output
    pub gallery: Gallery,
    /// Providers that failed, in registry order
    pub failures: Vec<SourceFailure>,
}

impl Aggregation {
    /// Whether every provider succeeded
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Split into `(gallery, failures)`
    pub fn into_parts(self) -> (Gallery, Vec<SourceFailure>) {
        (self.gallery, self.failures)
    }
}

/// Gallery aggregator
pub struct Aggregator;

impl Aggregator {
    /// Aggregate every provider in `registry`
    pub async fn run(registry: &ProviderRegistry, cancel: &CancellationToken) -> Aggregation {
        Self::aggregate(&registry.providers(), cancel).await
    }

    /// Aggregate an explicit list of providers
    ///
    /// Providers run concurrently; each paces its own requests.
    pub async fn aggregate(providers: &[Arc<dyn Provider>], cancel: &CancellationToken) -> Aggregation {
        let fetches = providers.iter().map(|provider| {
            let name = provider.name();
            let span = tracing::info_span!("get_gallery", provider = %name);
            async move {
                tracing::info!("fetching gallery");
                let outcome = provider.get_gallery(cancel).await;
                (name, outcome)
            }
            .instrument(span)
        });

        let mut aggregation = Aggregation::default();

        for (provider, outcome) in join_all(fetches).await {
            match outcome {
                Ok(gallery) => {
                    tracing::info!(provider = %provider, themes = gallery.len(), "provider finished");
                    aggregation.gallery.merge(gallery);
                }
                Err(failure) => {
                    tracing::warn!(
                        provider = %provider,
                        error = %failure.error,
                        partial = failure.partial.len(),
                        "provider failed"
                    );
                    aggregation.gallery.merge(failure.partial);
                    aggregation.failures.push(SourceFailure {
                        provider,
                        error: failure.error,
                    });
                }
            }
        }

        tracing::info!(
            themes = aggregation.gallery.len(),
            failures = aggregation.failures.len(),
            "aggregation finished"
        );
        aggregation
    }
}
