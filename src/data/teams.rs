//! Team name to upstream identifier lookup
//!
//! The upstream API addresses teams by numeric id, while callers know them by
//! name. `TeamIndex` is filled once at startup from the competition's team
//! listing and then answers `resolve` lookups, falling back to the name itself
//! when a team is unknown so the caller can still attempt the request.

use std::future::Future;

use dashmap::DashMap;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::Team;
use crate::fetch::{FetchError, Fetched};

/// Suffix the upstream uses in club names (e.g. "Liverpool FC")
pub const TEAM_NAME_SUFFIX: &str = " FC";

/// Appends [`TEAM_NAME_SUFFIX`] unless the name already ends with "FC"
///
/// Lookups only hit when the name matches the upstream spelling, so callers
/// normalize user input with this before calling [`TeamIndex::resolve`].
pub fn normalize_team_name(name: &str) -> String {
    let name = name.trim();
    if name.ends_with(TEAM_NAME_SUFFIX.trim_start()) {
        name.to_string()
    } else {
        format!("{}{}", name, TEAM_NAME_SUFFIX)
    }
}

/// Team listing as served by the API, either bare or wrapped in `{"teams": [...]}`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Listing {
    Bare(Vec<Value>),
    Envelope { teams: Vec<Value> },
}

/// A single listing record; both fields are optional so partial records can be skipped
#[derive(Debug, Deserialize)]
struct TeamRecord {
    id: Option<TeamId>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TeamId {
    Number(u64),
    Text(String),
}

impl TeamRecord {
    fn into_team(self) -> Option<Team> {
        let id = match self.id? {
            TeamId::Number(n) => n.to_string(),
            TeamId::Text(s) => s,
        };
        Some(Team {
            id,
            name: self.name?,
        })
    }
}

/// Concurrent map from team name to upstream id
///
/// Entries are only ever added or refreshed, never removed.
#[derive(Debug, Default)]
pub struct TeamIndex {
    ids: DashMap<String, String>,
}

impl TeamIndex {
    /// Creates an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id for `name`, or `name` itself if the team is unknown
    pub fn resolve(&self, name: &str) -> String {
        match self.ids.get(name) {
            Some(id) => id.value().clone(),
            None => name.to_string(),
        }
    }

    /// Adds or refreshes one team
    pub fn insert(&self, team: Team) {
        self.ids.insert(team.name, team.id);
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Parses a team listing and indexes every record with both an id and a name
    ///
    /// Records missing either field, or with fields of the wrong type, are skipped.
    ///
    /// # Returns
    /// * `Ok(count)` - Number of teams indexed
    /// * `Err` - If the payload is not a JSON listing at all
    pub fn load_listing(&self, payload: &str) -> Result<usize, serde_json::Error> {
        let records = match serde_json::from_str::<Listing>(payload)? {
            Listing::Bare(teams) => teams,
            Listing::Envelope { teams } => teams,
        };

        let mut indexed = 0;
        for record in records {
            match serde_json::from_value::<TeamRecord>(record)
                .ok()
                .and_then(TeamRecord::into_team)
            {
                Some(team) => {
                    self.insert(team);
                    indexed += 1;
                }
                None => debug!("Skipping incomplete team record"),
            }
        }
        Ok(indexed)
    }

    /// Fills the index from the listing returned by `fetch`
    ///
    /// Failures are not fatal: a failed fetch or an unparseable payload leaves the
    /// index as it was and every later `resolve` degrades to returning its input.
    /// Returns the number of teams indexed.
    pub async fn bootstrap<F, Fut>(&self, fetch: F) -> usize
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Fetched, FetchError>>,
    {
        let fetched = match fetch().await {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!(error = %e, "Team listing unavailable, team names will not be resolved");
                return 0;
            }
        };

        match self.load_listing(&fetched.body) {
            Ok(count) => {
                info!(count, stale = fetched.is_stale(), "Team index loaded");
                count
            }
            Err(e) => {
                warn!(error = %e, "Error parsing team listing");
                0
            }
        }
    }
}
