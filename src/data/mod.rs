//! Football data access
//!
//! This module contains the football-data.org client and the team lookup it
//! uses to turn club names into upstream identifiers.

pub mod football;
pub mod teams;

pub use football::{ClientError, FootballClient, DEFAULT_BASE_URL, DEFAULT_TEAM_LISTING_COMPETITION};
pub use teams::{normalize_team_name, TeamIndex, TEAM_NAME_SUFFIX};

/// A club as listed by the upstream API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Team {
    /// Upstream identifier, kept as a string for use in URL paths
    pub id: String,
    /// Full club name (e.g. "Liverpool FC")
    pub name: String,
}
