//! Retry logic with exponential backoff
//!
//! [`retry`] re-runs an async transport operation while it fails with a
//! transient error. [`RetryingTransport`] applies the same policy to every
//! request of an inner transport, also retrying transient HTTP statuses.

use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use std::future::Future;
use std::time::Duration;

use crate::client::{is_transient_status, HttpRequest, HttpResponse, HttpTransport, TransportError};
use crate::Result;

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts after the first try
    pub max_retries: usize,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Backoff multiplier (e.g., 2.0 for exponential backoff)
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the given number of retries
    pub fn new(max_retries: usize) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// A policy that never retries
    pub fn none() -> Self {
        Self::new(0)
    }

    /// Set the initial delay
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the maximum delay
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the backoff multiplier
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    fn backoff(&self) -> backoff::ExponentialBackoff {
        // Attempts are bounded by `max_retries`, not by elapsed time.
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_delay)
            .with_max_interval(self.max_delay)
            .with_multiplier(self.backoff_multiplier)
            .with_randomization_factor(0.0)
            .with_max_elapsed_time(None)
            .build()
    }
}

/// Retry an async operation while it fails with a transient error
///
/// The operation runs at most `max_retries + 1` times. Non-transient errors
/// are returned immediately.
pub async fn retry<F, Fut, T>(policy: &RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_retries = policy.max_retries;
    let mut attempt = 0usize;

    backoff::future::retry(policy.backoff(), || {
        attempt += 1;
        let current = attempt;
        let fut = operation();
        async move {
            match fut.await {
                Ok(value) => Ok(value),
                Err(err) if err.is_transient() && current <= max_retries => {
                    tracing::debug!(attempt = current, error = %err, "transient failure, retrying");
                    Err(backoff::Error::transient(err))
                }
                Err(err) => Err(backoff::Error::permanent(err)),
            }
        }
    })
    .await
}

/// Transport decorator that retries transient failures
///
/// Transient statuses (429, 503, ...) are retried too; once retries are
/// exhausted the last response is handed back unchanged so callers still see
/// the real status.
pub struct RetryingTransport<T> {
    inner: T,
    policy: RetryPolicy,
}

impl<T: HttpTransport> RetryingTransport<T> {
    /// Wrap a transport
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// Get the retry policy
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl<T: HttpTransport> HttpTransport for RetryingTransport<T> {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let max_retries = self.policy.max_retries;
        let mut attempt = 0usize;

        backoff::future::retry(self.policy.backoff(), || {
            attempt += 1;
            let current = attempt;
            let fut = self.inner.send(request.clone());
            async move {
                match fut.await {
                    Ok(response) if is_transient_status(response.status) && current <= max_retries => {
                        tracing::debug!(
                            attempt = current,
                            status = response.status,
                            url = %response.url,
                            "transient status, retrying"
                        );
                        Err(backoff::Error::transient(TransportError::Status {
                            status: response.status,
                            url: response.url,
                        }))
                    }
                    Ok(response) => Ok(response),
                    Err(err) if err.is_transient() && current <= max_retries => {
                        tracing::debug!(attempt = current, error = %err, "transient failure, retrying");
                        Err(backoff::Error::transient(err))
                    }
                    Err(err) => Err(backoff::Error::permanent(err)),
                }
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn fast(max_retries: usize) -> RetryPolicy {
        RetryPolicy::new(max_retries).with_initial_delay(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_retry_success_first_attempt() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();

        let result = retry(&fast(3), || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok::<_, TransportError>("success")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "success");
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_success_after_transient_failures() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();

        let result = retry(&fast(3), || {
            let c = c.clone();
            async move {
                if c.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(TransportError::Network("connection reset".to_string()))
                } else {
                    Ok("success")
                }
            }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_permanent_error() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();

        let result: Result<()> = retry(&fast(3), || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(TransportError::InvalidRequest("bad url".to_string()))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_exhausted() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();

        let result: Result<()> = retry(&fast(2), || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(TransportError::Timeout {
                    url: "https://example.com".to_string(),
                })
            }
        })
        .await;

        assert!(matches!(result, Err(TransportError::Timeout { .. })));
        assert_eq!(counter.load(Ordering::SeqCst), 3); // Initial + 2 retries
    }

    struct FlakyTransport {
        calls: AtomicUsize,
        failures: usize,
        status: u16,
    }

    #[async_trait]
    impl HttpTransport for FlakyTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Ok(HttpResponse::new(self.status, request.url, ""))
            } else {
                Ok(HttpResponse::new(200, request.url, "ok"))
            }
        }
    }

    #[tokio::test]
    async fn test_retrying_transport_recovers_from_503() {
        let transport = RetryingTransport::new(
            FlakyTransport {
                calls: AtomicUsize::new(0),
                failures: 2,
                status: 503,
            },
            fast(3),
        );

        let response = transport.send(HttpRequest::get("https://example.com")).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(transport.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retrying_transport_returns_last_response() {
        let transport = RetryingTransport::new(
            FlakyTransport {
                calls: AtomicUsize::new(0),
                failures: 10,
                status: 429,
            },
            fast(1),
        );

        let response = transport.send(HttpRequest::get("https://example.com")).await.unwrap();
        assert_eq!(response.status, 429);
        assert_eq!(transport.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retrying_transport_passes_through_404() {
        let transport = RetryingTransport::new(
            FlakyTransport {
                calls: AtomicUsize::new(0),
                failures: 10,
                status: 404,
            },
            fast(3),
        );

        let response = transport.send(HttpRequest::get("https://example.com")).await.unwrap();
        assert_eq!(response.status, 404);
        assert_eq!(transport.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_policy_builder() {
        let policy = RetryPolicy::new(5)
            .with_initial_delay(Duration::from_millis(50))
            .with_max_delay(Duration::from_secs(2))
            .with_backoff_multiplier(3.0);

        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.initial_delay, Duration::from_millis(50));
        assert_eq!(policy.max_delay, Duration::from_secs(2));
        assert_eq!(policy.backoff_multiplier, 3.0);
        assert_eq!(RetryPolicy::none().max_retries, 0);
    }
}
