//! Dispatch rate limiting using a fixed window counter
//!
//! Each admitted dispatch increments a counter; once the counter reaches the
//! limit, further dispatches are denied until the window elapses and the
//! counter resets.
//!
//! # Fixed Window
//!
//! ```text
//! Limit: 5 per 60s
//! - t=0s:   window starts, 5 dispatches admitted, 6th denied
//! - t=61s:  window elapsed, counter resets, 5 more admitted
//! ```
//!
//! The window is fixed rather than sliding, so bursts straddling a window
//! boundary can admit up to twice the limit in a short span.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Counter state for the current window
#[derive(Debug)]
struct RateWindow {
    /// Dispatches admitted in the current window
    count: u32,
    /// When the current window began
    window_start: Instant,
}

impl RateWindow {
    fn new() -> Self {
        Self {
            count: 0,
            window_start: Instant::now(),
        }
    }

    /// Reset the counter if the window has elapsed
    fn roll(&mut self, window: Duration) {
        let now = Instant::now();
        if now.duration_since(self.window_start) > window {
            self.count = 0;
            self.window_start = now;
        }
    }

    /// Try to take a slot, returns true if admitted
    fn try_admit(&mut self, limit: u32, window: Duration) -> bool {
        self.roll(window);

        if self.count >= limit {
            false
        } else {
            self.count += 1;
            true
        }
    }
}

/// Fixed window rate limiter shared by every dispatch
#[derive(Debug)]
pub struct RateLimiter {
    /// Maximum admissions per window
    limit: u32,
    /// Window length
    window: Duration,
    state: Mutex<RateWindow>,
}

impl RateLimiter {
    /// Create a new rate limiter admitting `limit` dispatches per `window`
    #[must_use]
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            state: Mutex::new(RateWindow::new()),
        }
    }

    /// Check whether another dispatch may proceed, consuming a slot if so.
    ///
    /// The check and the increment happen under one lock, so concurrent
    /// callers can never overshoot the limit.
    pub fn admit(&self) -> bool {
        let mut state = self.state.lock();

        if state.try_admit(self.limit, self.window) {
            true
        } else {
            let remaining = self.window.saturating_sub(state.window_start.elapsed());
            drop(state);
            debug!(
                limit = self.limit,
                window_remaining_ms = remaining.as_millis(),
                "Rate limit exceeded"
            );
            false
        }
    }

    /// Get current stats for the window (for monitoring/debugging)
    pub fn stats(&self) -> RateLimitStats {
        let mut state = self.state.lock();
        state.roll(self.window);

        RateLimitStats {
            count: state.count,
            limit: self.limit,
            window: self.window,
            window_remaining: self.window.saturating_sub(state.window_start.elapsed()),
        }
    }
}

/// Statistics for the rate window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitStats {
    /// Dispatches admitted in the current window
    pub count: u32,
    /// Maximum admissions per window
    pub limit: u32,
    /// Window length
    pub window: Duration,
    /// Time until the current window elapses
    pub window_remaining: Duration,
}
