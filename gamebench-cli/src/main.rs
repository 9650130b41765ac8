//! GameBench CLI - Command-line interface
//!
//! Commands:
//! - match: Play a single match between two agents
//! - tournament: Round-robin tournament with ELO ratings

mod common;
mod match_cmd;
mod tournament_cmd;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use match_cmd::MatchArgs;
use tournament_cmd::TournamentArgs;

#[derive(Parser)]
#[command(name = "gamebench")]
#[command(about = "Deterministic benchmark for game-playing agents")]
struct Cli {
    /// Random seed for reproducibility
    #[arg(long, global = true, default_value = "42")]
    seed: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a single match
    Match(MatchArgs),
    /// Run a round-robin tournament
    Tournament(TournamentArgs),
}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Match(args) => match_cmd::run(args, cli.seed),
        Commands::Tournament(args) => tournament_cmd::run(args, cli.seed),
    }
}
