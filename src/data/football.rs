//! football-data.org API client
//!
//! Builds endpoint URLs for competitions, teams and matches and sends them
//! through the shared [`FetchCoordinator`]. Competition results and fixtures
//! are additionally recorded per competition code, giving a second fallback
//! when neither the network nor the URL cache can serve a request.

use chrono::{Duration, NaiveDate, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::teams::{normalize_team_name, TeamIndex};
use crate::cache::{DomainCache, Slot};
use crate::fetch::{FetchConfig, FetchCoordinator, FetchError, Fetched, SetupError};

/// Base URL for the football-data.org v4 API
pub const DEFAULT_BASE_URL: &str = "https://api.football-data.org/v4";

/// Competition whose team listing seeds the team index
pub const DEFAULT_TEAM_LISTING_COMPETITION: &str = "PL";

/// Errors that can occur when querying the football API
#[derive(Debug, Error)]
pub enum ClientError {
    /// No API key was supplied when the client was built
    #[error("No API key configured")]
    MissingCredential,

    /// Neither a fresh nor a cached body was available
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Match status filter understood by the matches endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchStatus {
    Finished,
    Scheduled,
}

impl MatchStatus {
    fn as_query(self) -> &'static str {
        match self {
            MatchStatus::Finished => "FINISHED",
            MatchStatus::Scheduled => "SCHEDULED",
        }
    }

    fn slot(self) -> Slot {
        match self {
            MatchStatus::Finished => Slot::Results,
            MatchStatus::Scheduled => Slot::Fixtures,
        }
    }
}

/// Client for the football-data.org API
///
/// Owns the request pipeline and the process-wide caches; share it between
/// tasks behind an `Arc`.
#[derive(Debug)]
pub struct FootballClient {
    coordinator: FetchCoordinator,
    competitions: DomainCache,
    teams: TeamIndex,
    api_key: Option<String>,
    base_url: String,
    team_listing_competition: String,
}

impl FootballClient {
    /// Creates a client against the public API
    ///
    /// Without an `api_key` every endpoint fails with `ClientError::MissingCredential`.
    pub fn new(api_key: Option<String>, config: FetchConfig) -> Result<Self, SetupError> {
        Ok(Self {
            coordinator: FetchCoordinator::new(config)?,
            competitions: DomainCache::new(),
            teams: TeamIndex::new(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            base_url: DEFAULT_BASE_URL.to_string(),
            team_listing_competition: DEFAULT_TEAM_LISTING_COMPETITION.to_string(),
        })
    }

    /// Points the client at a different API root (mirrors, tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Seeds the team index from another competition's listing
    pub fn with_team_listing(mut self, competition: impl Into<String>) -> Self {
        self.team_listing_competition = competition.into();
        self
    }

    pub fn coordinator(&self) -> &FetchCoordinator {
        &self.coordinator
    }

    pub fn team_index(&self) -> &TeamIndex {
        &self.teams
    }

    fn credential(&self) -> Result<&str, ClientError> {
        self.api_key.as_deref().ok_or(ClientError::MissingCredential)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str) -> Result<Fetched, ClientError> {
        let credential = self.credential()?;
        Ok(self.coordinator.fetch(&self.url(path), credential).await?)
    }

    /// Loads the team index from the configured competition's team listing
    ///
    /// Meant to run once at startup before any `resolve_team` call. Never fails:
    /// without a credential, or when the listing cannot be fetched or parsed, the
    /// index stays empty and names resolve to themselves.
    pub async fn bootstrap_team_index(&self) -> usize {
        let Ok(credential) = self.credential() else {
            info!("No API key configured, skipping team index bootstrap");
            return 0;
        };

        let url = self.url(&format!(
            "/competitions/{}/teams",
            urlencoded(&self.team_listing_competition)
        ));
        self.teams
            .bootstrap(|| self.coordinator.fetch(&url, credential))
            .await
    }

    /// Returns the upstream id for a team name, or the name unchanged if unknown
    pub fn resolve_team(&self, name: &str) -> String {
        self.teams.resolve(name)
    }

    /// Records a payload under a competition code
    pub fn record_resource_result(&self, key: &str, slot: Slot, body: &str) {
        self.competitions.put_slot(key, slot, body);
    }

    /// Reads a payload recorded under a competition code
    pub fn read_resource_result(&self, key: &str, slot: Slot) -> Option<String> {
        self.competitions.get_slot(key, slot).map(|cached| cached.body)
    }

    /// Fetches competition details (e.g. "PL")
    pub async fn competition_details(&self, competition: &str) -> Result<Fetched, ClientError> {
        self.get(&format!("/competitions/{}", urlencoded(competition)))
            .await
    }

    /// Fetches the finished matches of a competition
    pub async fn latest_results(&self, competition: &str) -> Result<Fetched, ClientError> {
        self.competition_matches(competition, MatchStatus::Finished)
            .await
    }

    /// Fetches the scheduled matches of a competition
    pub async fn competition_fixtures(&self, competition: &str) -> Result<Fetched, ClientError> {
        self.competition_matches(competition, MatchStatus::Scheduled)
            .await
    }

    /// Fetches a competition's matches with the given status
    ///
    /// # Behavior
    /// - Fresh bodies are recorded in the competition's slot
    /// - Stale bodies from the URL cache are returned as they are
    /// - With no URL-cache entry, the competition's slot is the last resort
    async fn competition_matches(
        &self,
        competition: &str,
        status: MatchStatus,
    ) -> Result<Fetched, ClientError> {
        let slot = status.slot();
        let path = format!(
            "/competitions/{}/matches?status={}",
            urlencoded(competition),
            status.as_query()
        );

        match self.get(&path).await {
            Ok(fetched) => {
                if !fetched.is_stale() {
                    self.record_resource_result(competition, slot, &fetched.body);
                }
                Ok(fetched)
            }
            Err(ClientError::Fetch(error)) => match self.competitions.get_slot(competition, slot) {
                Some(cached) => {
                    info!(competition, %slot, "Returning cached competition data");
                    Ok(Fetched::stale(cached, error.fallback_reason()))
                }
                None => {
                    warn!(competition, %slot, error = %error, "Failed to fetch competition matches");
                    Err(ClientError::Fetch(error))
                }
            },
            Err(e) => Err(e),
        }
    }

    /// Fetches upcoming matches for a team, given its id or name
    ///
    /// Names are normalized with the " FC" suffix and resolved through the team
    /// index; unknown names are sent as they are.
    pub async fn team_fixtures(&self, team: &str) -> Result<Fetched, ClientError> {
        let team_id = if is_numeric_id(team) {
            team.to_string()
        } else {
            self.resolve_team(&normalize_team_name(team))
        };
        debug!(team, team_id = %team_id, "Resolved team");

        self.get(&format!(
            "/teams/{}/matches?status={}",
            urlencoded(&team_id),
            MatchStatus::Scheduled.as_query()
        ))
        .await
    }

    /// Fetches a single match by id
    pub async fn match_details(&self, match_id: &str) -> Result<Fetched, ClientError> {
        self.get(&format!("/matches/{}", urlencoded(match_id))).await
    }

    /// Fetches all matches played on `date`
    pub async fn matches_on(&self, date: NaiveDate) -> Result<Fetched, ClientError> {
        let day = date.format("%Y-%m-%d");
        self.get(&format!("/matches?dateFrom={}&dateTo={}", day, day))
            .await
    }

    /// Fetches yesterday's matches (UTC)
    pub async fn yesterdays_matches(&self) -> Result<Fetched, ClientError> {
        let yesterday = Utc::now().date_naive() - Duration::days(1);
        self.matches_on(yesterday).await
    }
}

fn is_numeric_id(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// URL-encodes a path segment or query value
fn urlencoded(s: &str) -> String {
    s.replace('%', "%25")
        .replace(' ', "%20")
        .replace('\'', "%27")
        .replace('/', "%2F")
        .replace('?', "%3F")
        .replace('&', "%26")
        .replace('#', "%23")
}
