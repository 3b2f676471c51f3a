//! Request throttling with a sliding fixed window
//!
//! At most `max_requests` requests may start within one `window`. A window
//! opens with the first request after the previous one has elapsed. Once the
//! count within the current window exceeds the limit, the caller sleeps for
//! `ceil(excess / max_requests) × window + padding` and then checks again.
//!
//! Only the calling task waits; other tasks sharing the throttle keep their
//! place in the count and are delayed by their own excess.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::ThrottleConfig;

#[derive(Debug)]
struct Window {
    started: Instant,
    count: u32,
}

/// Shared throttle for one authenticated client
#[derive(Debug)]
pub struct Throttle {
    config: ThrottleConfig,
    state: Mutex<Window>,
}

/// Delay owed when `count` requests have been made in the current window.
///
/// Zero while `count <= max_requests`.
pub fn compute_wait(count: u32, config: &ThrottleConfig) -> Duration {
    if config.max_requests == 0 || count <= config.max_requests {
        return Duration::ZERO;
    }
    let excess = count - config.max_requests;
    let windows = excess.div_ceil(config.max_requests);
    config.window * windows + config.padding
}

impl Throttle {
    /// Create a throttle starting with an empty window
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            config,
            state: Mutex::new(Window {
                started: Instant::now(),
                count: 0,
            }),
        }
    }

    /// Settings in effect
    pub fn config(&self) -> &ThrottleConfig {
        &self.config
    }

    /// Register one request, sleeping first if the window is over its limit.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut window = self.state.lock().await;
                if window.started.elapsed() >= self.config.window {
                    window.started = Instant::now();
                    window.count = 0;
                }
                window.count += 1;
                let wait = compute_wait(window.count, &self.config);
                if wait.is_zero() {
                    return;
                }
                // Give the slot back; it is taken again after the wait.
                window.count -= 1;
                wait
            };

            tracing::debug!(
                wait_secs = wait.as_secs_f64(),
                limit = self.config.max_requests,
                "Throttle limit reached, waiting"
            );
            tokio::time::sleep(wait).await;
        }
    }

    /// Requests counted in the current window
    pub async fn current_count(&self) -> u32 {
        let window = self.state.lock().await;
        if window.started.elapsed() >= self.config.window {
            0
        } else {
            window.count
        }
    }
}
