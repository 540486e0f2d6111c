//! In-memory caches backing the fetch fallback path
//!
//! Two process-lifetime caches live here. `ResponseCache` keeps the last
//! successful raw body for every request URL, and `DomainCache` groups the
//! latest results and fixtures payloads of a competition under its code. Both
//! are consulted only when a fresh fetch cannot be made or fails, so a caller
//! degrades to the last known good value instead of an error. Nothing is
//! persisted across restarts.

mod domain;
mod response;

pub use domain::{CompetitionRecord, DomainCache, Slot};
pub use response::{CachedBody, ResponseCache};
