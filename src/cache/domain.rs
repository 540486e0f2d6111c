//! Per-competition cache of results and fixtures payloads

use std::fmt;

use chrono::Utc;
use dashmap::DashMap;

use super::CachedBody;

/// Named payload slots stored for each competition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// Latest finished matches
    Results,
    /// Upcoming scheduled matches
    Fixtures,
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Results => write!(f, "results"),
            Slot::Fixtures => write!(f, "fixtures"),
        }
    }
}

/// Cached payloads for one competition
///
/// Each slot is independently empty or filled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompetitionRecord {
    pub results: Option<CachedBody>,
    pub fixtures: Option<CachedBody>,
}

impl CompetitionRecord {
    fn slot(&self, slot: Slot) -> Option<&CachedBody> {
        match slot {
            Slot::Results => self.results.as_ref(),
            Slot::Fixtures => self.fixtures.as_ref(),
        }
    }

    fn slot_mut(&mut self, slot: Slot) -> &mut Option<CachedBody> {
        match slot {
            Slot::Results => &mut self.results,
            Slot::Fixtures => &mut self.fixtures,
        }
    }
}

/// Competition code to cached payloads
///
/// Writing a slot only ever touches that slot: the record is created empty on
/// first use and then updated in place under the entry's shard lock, so a
/// concurrent write to the other slot of the same competition is never lost.
#[derive(Debug, Default)]
pub struct DomainCache {
    records: DashMap<String, CompetitionRecord>,
}

impl DomainCache {
    /// Creates an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the payload stored in `slot` for `key`
    pub fn get_slot(&self, key: &str, slot: Slot) -> Option<CachedBody> {
        self.records
            .get(key)
            .and_then(|record| record.slot(slot).cloned())
    }

    /// Stores `body` in `slot` for `key`, leaving the other slot untouched
    pub fn put_slot(&self, key: &str, slot: Slot, body: impl Into<String>) {
        let mut record = self.records.entry(key.to_string()).or_default();
        *record.slot_mut(slot) = Some(CachedBody {
            body: body.into(),
            cached_at: Utc::now(),
        });
    }

    /// Returns a copy of everything cached for `key`
    pub fn record(&self, key: &str) -> Option<CompetitionRecord> {
        self.records.get(key).map(|record| record.value().clone())
    }
}
