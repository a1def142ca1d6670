//! Request pacing.
//!
//! Enforces a minimum interval between request starts. Concurrent
//! callers reserve slots under one lock, so requests stay spaced even
//! when a batch fires in parallel.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

/// Pacing counters, snapshotted for statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacingStats {
    /// Requests started since the last reset.
    pub requests_issued: u64,
    /// Delay applied to the most recent request, in milliseconds.
    pub last_delay_ms: u64,
}

#[derive(Debug, Default)]
struct PacerState {
    /// Start time of the most recently reserved slot.
    last_request: Option<Instant>,
    requests_issued: u64,
    last_delay_ms: u64,
}

/// Spaces requests at a fixed minimum interval.
#[derive(Debug)]
pub struct RequestPacer {
    min_interval: Duration,
    state: Mutex<PacerState>,
}

impl RequestPacer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            state: Mutex::new(PacerState::default()),
        }
    }

    /// Wait until the next request slot is due, then claim it.
    pub async fn acquire(&self) {
        let wait = {
            let mut state = self.state.lock().expect("pacer lock poisoned");
            let now = Instant::now();
            let ready = state
                .last_request
                .map(|last| last + self.min_interval)
                .unwrap_or(now);
            let wait = ready.saturating_duration_since(now);
            state.last_request = Some(now + wait);
            state.requests_issued += 1;
            state.last_delay_ms = wait.as_millis() as u64;
            wait
        };

        if wait > Duration::ZERO {
            debug!("pacing request: waiting {:?}", wait);
            tokio::time::sleep(wait).await;
        }
    }

    /// Snapshot the pacing counters.
    pub fn stats(&self) -> PacingStats {
        let state = self.state.lock().expect("pacer lock poisoned");
        PacingStats {
            requests_issued: state.requests_issued,
            last_delay_ms: state.last_delay_ms,
        }
    }

    /// Clear pacing state. The next request goes out immediately.
    pub fn reset(&self) {
        let mut state = self.state.lock().expect("pacer lock poisoned");
        *state = PacerState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counts_requests() {
        let pacer = RequestPacer::new(Duration::ZERO);
        pacer.acquire().await;
        pacer.acquire().await;
        pacer.acquire().await;
        assert_eq!(pacer.stats().requests_issued, 3);
    }

    #[tokio::test]
    async fn test_spaces_consecutive_requests() {
        let pacer = RequestPacer::new(Duration::from_millis(20));
        let start = Instant::now();
        pacer.acquire().await;
        pacer.acquire().await;
        pacer.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(40));
        assert!(pacer.stats().last_delay_ms >= 20);
    }

    #[tokio::test]
    async fn test_reset_clears_state() {
        let pacer = RequestPacer::new(Duration::from_millis(50));
        pacer.acquire().await;
        pacer.reset();
        let stats = pacer.stats();
        assert_eq!(stats.requests_issued, 0);
        assert_eq!(stats.last_delay_ms, 0);

        // A fresh pacer does not wait for the old slot.
        let start = Instant::now();
        pacer.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
