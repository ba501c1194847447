//! Fan-out and pagination engine
//!
//! Providers spread their sub-fetches (pages, labels, package details) over
//! a [`JoinSet`]. Every task start is admitted by the provider's
//! [`RateGate`]; results are appended to a shared accumulator that is locked
//! only for the append itself. The join barrier waits for every task and
//! reports the first error, while records already appended are kept.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use networking::RateGate;

use crate::provider::ProviderError;

/// Outcome of a fan-out: everything gathered plus the first error, if any
#[derive(Debug)]
pub struct FanOut<T> {
    /// Results from every task that succeeded
    pub items: Vec<T>,
    /// First error observed
    pub error: Option<ProviderError>,
}

impl<T> FanOut<T> {
    fn new(items: Vec<T>, error: Option<ProviderError>) -> Self {
        Self { items, error }
    }

    /// Whether every task succeeded
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    /// Split into `Ok(items)` or `Err((error, partial items))`
    pub fn into_result(self) -> std::result::Result<Vec<T>, (ProviderError, Vec<T>)> {
        match self.error {
            None => Ok(self.items),
            Some(error) => Err((error, self.items)),
        }
    }
}

/// Wait for a gate permit unless cancelled first
///
/// Returns `false` when cancelled.
pub async fn admit(gate: &RateGate, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = gate.tick() => true,
    }
}

/// Run `task` once per input, concurrently, paced by `gate`
///
/// No new task starts after `cancel` fires; running tasks are abandoned at
/// their next await point. Partial results are always returned.
pub async fn fan_out<I, T, F, Fut>(inputs: I, gate: &RateGate, cancel: &CancellationToken, task: F) -> FanOut<T>
where
    I: IntoIterator,
    T: Send + 'static,
    F: Fn(I::Item) -> Fut,
    Fut: Future<Output = std::result::Result<Vec<T>, ProviderError>> + Send + 'static,
{
    let accumulator: Arc<Mutex<Vec<T>>> = Arc::new(Mutex::new(Vec::new()));
    let mut tasks = JoinSet::new();
    let mut interrupted = false;

    for input in inputs {
        if !admit(gate, cancel).await {
            interrupted = true;
            break;
        }

        let fut = task(input);
        let accumulator = Arc::clone(&accumulator);
        let cancel = cancel.clone();

        tasks.spawn(async move {
            let items = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
                result = fut => result?,
            };
            accumulator.lock().extend(items);
            Ok(())
        });
    }

    let mut first_error = None;
    while let Some(joined) = tasks.join_next().await {
        let outcome = joined.unwrap_or_else(|e| Err(ProviderError::Task(e.to_string())));
        if let Err(err) = outcome {
            if first_error.is_none() {
                first_error = Some(err);
            } else {
                tracing::debug!(error = %err, "dropping secondary fan-out error");
            }
        }
    }

    if interrupted {
        first_error = Some(ProviderError::Cancelled);
    }

    let items = match Arc::try_unwrap(accumulator) {
        Ok(mutex) => mutex.into_inner(),
        Err(shared) => std::mem::take(&mut *shared.lock()),
    };

    FanOut::new(items, first_error)
}

// =============================================================================
// Pagination
// =============================================================================

/// One page of a paged source
#[derive(Debug, Clone)]
pub struct Page<T> {
    /// Total number of records the source reports
    pub total: u64,
    /// Records on this page
    pub items: Vec<T>,
}

impl<T> Page<T> {
    /// Create a page
    pub fn new(total: u64, items: Vec<T>) -> Self {
        Self { total, items }
    }
}

/// A source that can be read page by page (1-based)
#[async_trait]
pub trait PageSource: Send + Sync + 'static {
    /// Record type produced per page
    type Item: Send + 'static;

    /// Records per page
    fn page_size(&self) -> u32;

    /// Fetch one page
    async fn fetch_page(&self, page: u32) -> std::result::Result<Page<Self::Item>, ProviderError>;
}

/// Number of pages needed for `total` records
pub fn page_count(total: u64, page_size: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    let page_size = u64::from(page_size.max(1));
    u32::try_from(total.div_ceil(page_size)).unwrap_or(u32::MAX)
}

/// Fetch every page of `source`
///
/// Page 1 is fetched first to learn the total; a total of zero is
/// [`ProviderError::NoThemesFound`]. Pages `2..=n` are then fanned out.
pub async fn fetch_all_pages<S: PageSource>(
    source: Arc<S>,
    gate: &RateGate,
    cancel: &CancellationToken,
) -> FanOut<S::Item> {
    if !admit(gate, cancel).await {
        return FanOut::new(Vec::new(), Some(ProviderError::Cancelled));
    }

    let first = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ProviderError::Cancelled),
        page = source.fetch_page(1) => page,
    };

    let first = match first {
        Ok(page) => page,
        Err(err) => return FanOut::new(Vec::new(), Some(err)),
    };

    if first.total == 0 {
        return FanOut::new(Vec::new(), Some(ProviderError::NoThemesFound));
    }

    let pages = page_count(first.total, source.page_size());
    tracing::debug!(total = first.total, pages, "paged source sized");

    let rest = fan_out(2..=pages, gate, cancel, |page| {
        let source = Arc::clone(&source);
        async move {
            tracing::trace!(page, "fetching page");
            source.fetch_page(page).await.map(|p| p.items)
        }
    })
    .await;

    let mut items = first.items;
    items.extend(rest.items);
    FanOut::new(items, rest.error)
}
