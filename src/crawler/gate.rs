//! Politeness gate shared by every request of a run
//!
//! The gate enforces two process-global caps:
//! - a minimum interval between the starts of any two requests
//! - a maximum number of requests in flight
//!
//! A 429 response can additionally put the whole gate on hold, so every
//! concurrent caller pauses rather than only the one that was throttled.

use crate::config::CrawlerConfig;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

/// Admission to issue one request
///
/// The in-flight slot is released when the permit is dropped.
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
    issued_at: Instant,
}

impl GatePermit {
    /// When the request was admitted
    pub fn issued_at(&self) -> Instant {
        self.issued_at
    }
}

/// Counting semaphore plus a mutex-guarded issue schedule
#[derive(Debug)]
pub struct PolitenessGate {
    /// Limits requests in flight
    in_flight: Arc<Semaphore>,

    min_interval: Duration,

    /// Start time of the most recently admitted request
    ///
    /// Held across the wait so admissions are strictly serialized.
    last_issue: AsyncMutex<Option<Instant>>,

    /// No request may start before this instant
    hold_until: Mutex<Option<Instant>>,
}

impl PolitenessGate {
    /// Creates a gate
    ///
    /// # Arguments
    ///
    /// * `min_interval` - Minimum delay between two request starts
    /// * `max_in_flight` - Maximum outstanding requests (at least 1)
    pub fn new(min_interval: Duration, max_in_flight: usize) -> Self {
        let max_in_flight = max_in_flight.clamp(1, Semaphore::MAX_PERMITS);
        Self {
            in_flight: Arc::new(Semaphore::new(max_in_flight)),
            min_interval,
            last_issue: AsyncMutex::new(None),
            hold_until: Mutex::new(None),
        }
    }

    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(
            config.min_request_interval(),
            config.max_concurrent_requests as usize,
        )
    }

    /// A gate with no interval and no practical in-flight cap
    pub fn unthrottled() -> Self {
        Self::new(Duration::ZERO, Semaphore::MAX_PERMITS)
    }

    /// Waits until a request may be issued
    ///
    /// Suspends on the in-flight cap first, then on the issue schedule. Work
    /// is never dropped: the only `None` case is a closed gate.
    pub async fn acquire(&self) -> Option<GatePermit> {
        let permit = self.in_flight.clone().acquire_owned().await.ok()?;

        let mut last = self.last_issue.lock().await;
        loop {
            let now = Instant::now();
            let mut ready_at = now;

            if let Some(previous) = *last {
                ready_at = ready_at.max(previous + self.min_interval);
            }
            if let Some(hold) = self.hold_deadline() {
                ready_at = ready_at.max(hold);
            }

            if ready_at <= now {
                break;
            }

            tokio::time::sleep_until(ready_at).await;
            // A hold-off may have been extended while sleeping
        }

        let issued_at = Instant::now();
        *last = Some(issued_at);

        Some(GatePermit {
            _permit: permit,
            issued_at,
        })
    }

    /// Pauses every caller for at least `delay`
    ///
    /// Overlapping hold-offs keep the later deadline.
    pub fn hold_off(&self, delay: Duration) {
        let deadline = Instant::now() + delay;
        let mut hold = self.hold_until.lock().unwrap_or_else(|e| e.into_inner());
        if hold.map_or(true, |current| current < deadline) {
            tracing::debug!("Gate on hold for {:?}", delay);
            *hold = Some(deadline);
        }
    }

    /// Current hold-off deadline, if still in the future
    pub fn hold_deadline(&self) -> Option<Instant> {
        let hold = self.hold_until.lock().unwrap_or_else(|e| e.into_inner());
        hold.filter(|deadline| *deadline > Instant::now())
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// In-flight slots currently free
    pub fn available_permits(&self) -> usize {
        self.in_flight.available_permits()
    }
}
