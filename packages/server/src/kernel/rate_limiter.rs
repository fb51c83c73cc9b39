//! Sliding-window admission gate for outbound remote calls.
//!
//! One instance is shared by every in-flight request so the aggregate call
//! rate stays under the remote platform's quota. Admission is a single
//! critical section: pruning, waiting, and recording happen while the window
//! lock is held, so concurrent callers cannot both claim the last free slot.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

pub struct SlidingWindowLimiter {
    max_requests: usize,
    window: Duration,
    timestamps: Mutex<VecDeque<Instant>>,
}

impl SlidingWindowLimiter {
    /// Allow at most `max_requests` call starts in any trailing `window`.
    /// A `max_requests` of zero is treated as one.
    pub fn new(max_requests: usize, window: Duration) -> Self {
        let max_requests = max_requests.max(1);
        Self {
            max_requests,
            window,
            timestamps: Mutex::new(VecDeque::with_capacity(max_requests)),
        }
    }

    /// Suspend until a call may start, then record it.
    pub async fn wait_if_needed(&self) {
        let mut timestamps = self.timestamps.lock().await;
        self.prune(&mut timestamps, Instant::now());

        while timestamps.len() >= self.max_requests {
            let Some(&oldest) = timestamps.front() else {
                break;
            };
            let elapsed = Instant::now().saturating_duration_since(oldest);
            let remaining = self.window.saturating_sub(elapsed);
            if !remaining.is_zero() {
                tracing::debug!(
                    wait_ms = remaining.as_millis() as u64,
                    in_window = timestamps.len(),
                    "Rate window full, waiting"
                );
                sleep(remaining).await;
            }
            self.prune(&mut timestamps, Instant::now());
        }

        timestamps.push_back(Instant::now());
    }

    /// Number of calls currently counted against the window.
    pub async fn in_window(&self) -> usize {
        let mut timestamps = self.timestamps.lock().await;
        self.prune(&mut timestamps, Instant::now());
        timestamps.len()
    }

    fn prune(&self, timestamps: &mut VecDeque<Instant>, now: Instant) {
        while let Some(&oldest) = timestamps.front() {
            if now.saturating_duration_since(oldest) >= self.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }
    }
}
