//! Request pacing
//!
//! A [`RateGate`] issues one permit per tick. Callers acquire a permit before
//! starting a new request, which bounds how fast requests *start*; it does not
//! cap how many are in flight.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{self, Interval, MissedTickBehavior};

/// Fixed-interval admission gate
///
/// The underlying ticker is created on first use, so a gate can be built
/// outside a runtime. A zero period disables pacing entirely.
#[derive(Debug)]
pub struct RateGate {
    period_nanos: AtomicU64,
    ticker: Mutex<Option<Interval>>,
}

impl RateGate {
    /// Create a gate that issues one permit per `period`
    pub fn new(period: Duration) -> Self {
        Self {
            period_nanos: AtomicU64::new(to_nanos(period)),
            ticker: Mutex::new(None),
        }
    }

    /// A gate that never waits
    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Create a gate allowing `count` request starts per second
    pub fn per_second(count: u32) -> Self {
        if count == 0 {
            return Self::unlimited();
        }
        Self::new(Duration::from_secs(1) / count)
    }

    /// Current interval between permits
    pub fn period(&self) -> Duration {
        Duration::from_nanos(self.period_nanos.load(Ordering::SeqCst))
    }

    /// Change the interval; takes effect on the next permit
    pub fn set_period(&self, period: Duration) {
        self.period_nanos.store(to_nanos(period), Ordering::SeqCst);
    }

    /// Whether the gate paces requests at all
    pub fn is_unlimited(&self) -> bool {
        self.period().is_zero()
    }

    /// Wait for the next permit
    pub async fn tick(&self) {
        let period = self.period();
        if period.is_zero() {
            return;
        }

        let mut ticker = self.ticker.lock().await;

        let stale = ticker.as_ref().map_or(true, |iv| iv.period() != period);
        if stale {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            *ticker = Some(interval);
        }

        if let Some(interval) = ticker.as_mut() {
            interval.tick().await;
        }
    }
}

impl Default for RateGate {
    fn default() -> Self {
        Self::unlimited()
    }
}

fn to_nanos(period: Duration) -> u64 {
    u64::try_from(period.as_nanos()).unwrap_or(u64::MAX)
}
