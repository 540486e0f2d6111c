//! Sliding-window rate limiting for outbound API calls
//!
//! The upstream API grants a fixed number of requests per trailing time window.
//! `RateLimiter` tracks the instants of recent admissions and refuses a call when
//! the quota for the window is already used up. Expired admissions are purged
//! lazily on each check; there is no background timer.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use thiserror::Error;

/// Errors for invalid rate limit configuration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RateLimitError {
    /// `max_requests` must be at least one
    #[error("max_requests must be greater than zero")]
    ZeroRequests,

    /// The window must have a non-zero length
    #[error("window must be longer than zero")]
    ZeroWindow,
}

/// Configuration for the request quota
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum admissions allowed within one window
    pub max_requests: usize,
    /// Length of the trailing window
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_secs(60), // free tier: 10 calls/minute
        }
    }
}

impl RateLimitConfig {
    /// Checks that the quota and window are both non-zero
    pub fn validate(&self) -> Result<(), RateLimitError> {
        if self.max_requests == 0 {
            return Err(RateLimitError::ZeroRequests);
        }
        if self.window.is_zero() {
            return Err(RateLimitError::ZeroWindow);
        }
        Ok(())
    }
}

/// Admission control over a trailing time window
///
/// The whole read-purge-append sequence runs under one lock, so with N callers
/// racing for `q` remaining slots exactly `min(N, q)` of them are admitted.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    /// Admission instants, oldest first
    window: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Creates a limiter, rejecting a zero quota or a zero-length window
    pub fn new(config: RateLimitConfig) -> Result<Self, RateLimitError> {
        config.validate()?;

        Ok(Self {
            config,
            window: Mutex::new(VecDeque::with_capacity(config.max_requests)),
        })
    }

    /// Returns the configuration this limiter was built with
    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Tries to admit one call at the current instant
    ///
    /// Returns `true` and records the admission if quota remains, `false` otherwise.
    /// A denied attempt is not recorded and does not count against later quota.
    pub fn try_acquire(&self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    /// Number of admissions still available in the current window
    pub fn remaining(&self) -> usize {
        let mut window = self.window.lock();
        self.purge(&mut window, Instant::now());
        self.config.max_requests.saturating_sub(window.len())
    }

    fn try_acquire_at(&self, now: Instant) -> bool {
        let mut window = self.window.lock();
        self.purge(&mut window, now);

        if window.len() < self.config.max_requests {
            window.push_back(now);
            true
        } else {
            false
        }
    }

    /// Drops admissions strictly older than `now - window`
    fn purge(&self, window: &mut VecDeque<Instant>, now: Instant) {
        // Early in the process lifetime the boundary may precede the clock's origin,
        // in which case nothing can have expired yet.
        let Some(boundary) = now.checked_sub(self.config.window) else {
            return;
        };

        while let Some(&oldest) = window.front() {
            if oldest < boundary {
                window.pop_front();
            } else {
                break;
            }
        }
    }
}
