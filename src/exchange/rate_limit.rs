//! Fixed-window request limiter shared by all workers using one gateway

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug)]
struct Window {
    started: Instant,
    used: u32,
}

/// Allows at most `max_requests` per `window`; callers beyond that wait
/// for the next window. Safe to share behind an `Arc`.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    state: Mutex<Window>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window,
            state: Mutex::new(Window {
                started: Instant::now(),
                used: 0,
            }),
        }
    }

    /// Wait until a request slot is available and take it
    pub async fn acquire(&self) {
        let mut state = self.state.lock().await;

        if state.started.elapsed() >= self.window {
            state.started = Instant::now();
            state.used = 0;
        }

        if state.used >= self.max_requests {
            let wait = self.window.saturating_sub(state.started.elapsed());
            debug!("Rate limit reached, waiting {:?}", wait);
            // Holding the lock while sleeping keeps waiters in FIFO order
            tokio::time::sleep(wait).await;
            state.started = Instant::now();
            state.used = 0;
        }

        state.used += 1;
    }
}
