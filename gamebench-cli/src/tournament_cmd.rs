//! Tournament command - round-robin between built-in agents
//!
//! ## Architecture (4-layer granularity)
//!
//! - Level 1: run() - orchestration
//! - Level 2: load_ratings(), play_tournament(), report_results()
//! - Level 3: build_config(), progress_bar()
//! - Level 4: formatting utilities

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};

use gamebench_arena::{
    run_tournament_with, CancelToken, EloTable, Entrant, MatchConfig, MatchResult,
    TournamentConfig, TournamentResult,
};
use gamebench_core::GameId;

use crate::common::{anticheat_config, parse_game, resolve_agents, write_json};

// ============================================================================
// COMMAND ARGUMENTS (Level 4 - Configuration)
// ============================================================================

#[derive(Args)]
pub struct TournamentArgs {
    /// Game to play (sport, strategy, tactical)
    #[arg(long, value_parser = parse_game)]
    pub game: GameId,

    /// Entrants, at least two (e.g. `random,ballchaser,striker`)
    #[arg(long, value_delimiter = ',', required = true)]
    pub agents: Vec<String>,

    /// Matches per pairing, both legs included
    #[arg(long, default_value = "10")]
    pub matches: usize,

    /// Keep every agent on its first seat
    #[arg(long)]
    pub no_side_swap: bool,

    /// Run matches one at a time
    #[arg(long)]
    pub sequential: bool,

    /// Hard tick ceiling per match
    #[arg(long, default_value = "10000")]
    pub max_ticks: u32,

    /// Time budget per decision in milliseconds (0 = unlimited)
    #[arg(long, default_value = "30")]
    pub timeout_ms: u64,

    /// ELO table to start from; updated in place
    #[arg(long, value_name = "FILE")]
    pub ratings: Option<PathBuf>,

    /// Write the tournament result to this file
    #[arg(long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Print the full result as JSON
    #[arg(long)]
    pub json: bool,
}

// ============================================================================
// LEVEL 1 - ORCHESTRATION
// ============================================================================

/// Run tournament command
///
/// 1. Resolve entrants and load the ratings table
/// 2. Play every scheduled match
/// 3. Report, then save ratings and results
pub fn run(args: TournamentArgs, seed: u64) -> Result<()> {
    let kinds = resolve_agents(&args.agents, args.game, 2)?;
    let entrants: Vec<Entrant> = kinds.into_iter().map(Entrant::builtin).collect();
    let config = build_config(&args, seed);
    let ratings = load_ratings(args.ratings.as_deref())?;

    let (result, ratings) = play_tournament(&config, &entrants, ratings)?;

    report_results(&result, args.json)?;
    if let Some(path) = &args.ratings {
        write_json(path, &ratings)?;
    }
    if let Some(path) = &args.output {
        write_json(path, &result)?;
    }
    Ok(())
}

// ============================================================================
// LEVEL 2 - PHASES
// ============================================================================

/// Load an ELO table, or start fresh when the file does not exist yet
fn load_ratings(path: Option<&Path>) -> Result<EloTable> {
    match path {
        Some(path) if path.exists() => {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read ratings: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse ratings: {}", path.display()))
        }
        _ => Ok(EloTable::new()),
    }
}

fn play_tournament(
    config: &TournamentConfig,
    entrants: &[Entrant],
    ratings: EloTable,
) -> Result<(TournamentResult, EloTable)> {
    let pairs = entrants.len() * entrants.len().saturating_sub(1) / 2;
    let pb = progress_bar((pairs * config.matches_per_pair) as u64)?;

    tracing::info!(
        "Starting {} tournament: {} entrants, {} matches per pair",
        config.game_id(),
        entrants.len(),
        config.matches_per_pair
    );

    let outcome = run_tournament_with(
        config,
        entrants,
        ratings,
        &CancelToken::new(),
        &|_: &MatchResult| pb.inc(1),
    );
    pb.finish_and_clear();
    outcome.context("Tournament failed")
}

fn report_results(result: &TournamentResult, json: bool) -> Result<()> {
    if json {
        let json = serde_json::to_string_pretty(result).context("Failed to serialize result")?;
        println!("{}", json);
    } else {
        print_text_results(result);
    }
    Ok(())
}

// ============================================================================
// LEVEL 3 - STEPS
// ============================================================================

fn build_config(args: &TournamentArgs, seed: u64) -> TournamentConfig {
    let game = MatchConfig::for_game(args.game)
        .with_max_ticks(args.max_ticks)
        .with_anticheat(anticheat_config(args.timeout_ms));
    TournamentConfig::new(game)
        .with_matches_per_pair(args.matches)
        .with_seed(seed)
        .with_side_swap(!args.no_side_swap)
        .with_parallel(!args.sequential)
}

fn progress_bar(len: u64) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{bar:40}] {pos}/{len} matches ({eta})")
            .context("Invalid progress template")?
            .progress_chars("=> "),
    );
    Ok(pb)
}

// ============================================================================
// LEVEL 4 - UTILITIES
// ============================================================================

fn print_text_results(result: &TournamentResult) {
    println!("\n=== Tournament Results ({}) ===", result.game);
    println!(
        "Matches: {}{}",
        result.total_matches,
        if result.aborted { " (aborted)" } else { "" }
    );

    println!("\nLeaderboard:");
    println!("{:<4} {:<16} {:>8} {:>5} {:>5} {:>5}", "#", "Agent", "ELO", "W", "L", "D");
    println!("{}", "-".repeat(48));
    for (rank, (name, rating)) in result.leaderboard.iter().enumerate() {
        println!(
            "{:<4} {:<16} {:>8.1} {:>5} {:>5} {:>5}",
            rank + 1,
            name,
            rating.rating,
            rating.wins,
            rating.losses,
            rating.draws
        );
    }

    println!("\nHead to head:");
    for m in &result.matchups {
        println!(
            "  {} vs {}: {}-{}-{}",
            m.agent_a, m.agent_b, m.wins_a, m.wins_b, m.draws
        );
    }

    let balance = &result.side_balance;
    println!(
        "\nSide balance: player_1 {} / player_2 {} / draws {}",
        balance.player_1_wins, balance.player_2_wins, balance.draws
    );

    if !result.event_totals.is_empty() {
        println!("\nEvents:");
        for (kind, count) in &result.event_totals {
            println!("  {:<20} {}", kind, count);
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> TournamentArgs {
        TournamentArgs {
            game: GameId::Sport,
            agents: vec!["random".to_string(), "goalie".to_string()],
            matches: 2,
            no_side_swap: false,
            sequential: true,
            max_ticks: 60,
            timeout_ms: 0,
            ratings: None,
            output: None,
            json: false,
        }
    }

    #[test]
    fn test_build_config_from_flags() {
        let mut a = args();
        a.no_side_swap = true;
        let config = build_config(&a, 77);
        assert_eq!(config.seed, 77);
        assert!(!config.side_swap);
        assert!(!config.parallel);
        assert_eq!(config.game.max_ticks, 60);
    }

    #[test]
    fn test_missing_ratings_file_starts_fresh() {
        let table = load_ratings(Some(Path::new("/nonexistent/ratings.json"))).unwrap();
        assert!(table.is_empty());
        assert!(load_ratings(None).unwrap().is_empty());
    }

    #[test]
    fn test_play_tournament_returns_table() {
        let a = args();
        let kinds = resolve_agents(&a.agents, a.game, 2).unwrap();
        let entrants: Vec<Entrant> = kinds.into_iter().map(Entrant::builtin).collect();
        let (result, table) = play_tournament(&build_config(&a, 1), &entrants, EloTable::new()).unwrap();
        assert_eq!(result.total_matches, 2);
        assert!(!result.aborted);
        assert_eq!(table.len(), 2);
    }
}
