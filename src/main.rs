//! footy - Football data from the command line
//!
//! Runs a single query against football-data.org and prints the raw JSON
//! response. When the API cannot be reached or the request quota is used up,
//! the last cached response is printed instead, with a note on stderr.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use footy::cli::{Cli, Command, StartupConfig};
use footy::{ClientError, Fetched, FootballClient, Freshness};

/// Sets up log output on stderr, honouring `RUST_LOG` when it is set
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Runs the selected query
async fn run(client: &FootballClient, command: &Command) -> Result<Fetched, ClientError> {
    match command {
        Command::Competition { code } => client.competition_details(code).await,
        Command::Results { code } => client.latest_results(code).await,
        Command::Fixtures { code } => client.competition_fixtures(code).await,
        Command::TeamFixtures { team } => client.team_fixtures(team).await,
        Command::Match { id } => client.match_details(id).await,
        Command::Yesterday => client.yesterdays_matches().await,
        Command::Resolve { team } => {
            let name = footy::data::normalize_team_name(team);
            Ok(Fetched::fresh(client.resolve_team(&name)))
        }
    }
}

fn print_result(fetched: &Fetched) {
    println!("{}", fetched.body);
    if let Freshness::Stale { reason, cached_at } = &fetched.freshness {
        eprintln!(
            "(Note: this is cached data from {} returned because of: {})",
            cached_at.format("%Y-%m-%d %H:%M:%S UTC"),
            reason
        );
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match StartupConfig::from_cli(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(2);
        }
    };

    let client = match FootballClient::new(config.api_key, config.fetch) {
        Ok(client) => client.with_base_url(config.base_url),
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Team names can only be resolved once the index is loaded
    if cli.command.needs_team_index() {
        client.bootstrap_team_index().await;
    }

    match run(&client, &cli.command).await {
        Ok(fetched) => {
            print_result(&fetched);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
