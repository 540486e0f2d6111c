//! footy library
//!
//! A data-access layer for the football-data.org API. Outbound requests pass
//! through a sliding-window rate limiter; successful responses are cached so a
//! denied, failed or cancelled request can fall back to the last good body.

pub mod cache;
pub mod cli;
pub mod data;
pub mod fetch;
pub mod rate_limit;

pub use data::{ClientError, FootballClient};
pub use fetch::{FallbackReason, FetchConfig, FetchCoordinator, FetchError, Fetched, Freshness};
pub use rate_limit::{RateLimitConfig, RateLimiter};
