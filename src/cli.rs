//! Command-line interface parsing for the footy CLI
//!
//! This module handles parsing of CLI arguments using clap and turns them into
//! the client configuration used at startup.

use std::time::Duration;

use clap::{Parser, Subcommand};
use thiserror::Error;

use crate::data::DEFAULT_BASE_URL;
use crate::fetch::FetchConfig;
use crate::rate_limit::{RateLimitConfig, RateLimitError};

/// Error types for CLI argument validation
#[derive(Debug, Error)]
pub enum CliError {
    /// The rate limit flags describe an unusable quota
    #[error("Invalid rate limit: {0}")]
    InvalidRateLimit(#[from] RateLimitError),

    /// A zero request timeout would fail every call
    #[error("Invalid timeout: --timeout-secs must be greater than zero")]
    ZeroTimeout,
}

/// footy - Query football-data.org with rate limiting and cached fallbacks
#[derive(Parser, Debug)]
#[command(name = "footy")]
#[command(about = "Football results, fixtures and match data from football-data.org")]
#[command(version)]
pub struct Cli {
    /// API key sent in the X-Auth-Token header
    #[arg(long, value_name = "KEY")]
    pub api_key: Option<String>,

    /// API root to query
    #[arg(long, value_name = "URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Maximum requests allowed per window
    #[arg(long, value_name = "N", default_value_t = 10)]
    pub max_requests: usize,

    /// Length of the rate limit window in seconds
    #[arg(long, value_name = "SECS", default_value_t = 60)]
    pub window_secs: u64,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = 10)]
    pub timeout_secs: u64,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Queries available from the command line
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Competition details (e.g. PL)
    Competition { code: String },
    /// Latest finished matches of a competition
    Results { code: String },
    /// Upcoming matches of a competition
    Fixtures { code: String },
    /// Upcoming matches of a team, by name or id
    TeamFixtures { team: String },
    /// Details of a single match
    Match { id: String },
    /// All matches played yesterday
    Yesterday,
    /// Print the upstream id a team name resolves to
    Resolve { team: String },
}

impl Command {
    /// Whether the command looks up team names and so needs the team index
    pub fn needs_team_index(&self) -> bool {
        matches!(self, Command::TeamFixtures { .. } | Command::Resolve { .. })
    }
}

/// Configuration derived from CLI arguments for application startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub fetch: FetchConfig,
}

impl StartupConfig {
    /// Creates a StartupConfig from parsed CLI arguments.
    ///
    /// # Returns
    /// * `Ok(StartupConfig)` with the rate limit and timeout applied
    /// * `Err(CliError)` if the quota, window or timeout is zero
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let rate_limit = RateLimitConfig {
            max_requests: cli.max_requests,
            window: Duration::from_secs(cli.window_secs),
        };
        rate_limit.validate()?;

        if cli.timeout_secs == 0 {
            return Err(CliError::ZeroTimeout);
        }

        Ok(StartupConfig {
            api_key: cli.api_key.clone(),
            base_url: cli.base_url.clone(),
            fetch: FetchConfig {
                rate_limit,
                request_timeout: Duration::from_secs(cli.timeout_secs),
            },
        })
    }
}
