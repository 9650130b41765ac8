//! Match command - play a single match between two agents
//!
//! ## Architecture (4-layer granularity)
//!
//! - Level 1: run() - orchestration
//! - Level 2: build_runner(), play_match(), report_results()
//! - Level 3: resolve_pair(), event_summary()
//! - Level 4: formatting utilities

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;

use gamebench_arena::{derive_seed, MatchConfig, MatchResult, MatchRunner};
use gamebench_core::{AgentKind, GameId, Side};

use crate::common::{anticheat_config, parse_game, resolve_agents, write_json};

// ============================================================================
// COMMAND ARGUMENTS (Level 4 - Configuration)
// ============================================================================

#[derive(Args)]
pub struct MatchArgs {
    /// Game to play (sport, strategy, tactical)
    #[arg(long, value_parser = parse_game)]
    pub game: GameId,

    /// Two agents, player_1 first (e.g. `striker,goalie`)
    #[arg(long, value_delimiter = ',', required = true)]
    pub agents: Vec<String>,

    /// Hard tick ceiling
    #[arg(long, default_value = "10000")]
    pub max_ticks: u32,

    /// Time budget per decision in milliseconds (0 = unlimited)
    #[arg(long, default_value = "30")]
    pub timeout_ms: u64,

    /// Keep the per-tick action log in the result
    #[arg(long)]
    pub replay: bool,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,

    /// Write the result to this file
    #[arg(long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

// ============================================================================
// LEVEL 1 - ORCHESTRATION
// ============================================================================

/// Run match command
pub fn run(args: MatchArgs, seed: u64) -> Result<()> {
    let (kind_a, kind_b) = resolve_pair(&args)?;
    let runner = build_runner(&args)?;

    tracing::info!(
        "Starting {} match: {} vs {} (seed={})",
        args.game,
        kind_a,
        kind_b,
        seed
    );

    let result = play_match(&runner, kind_a, kind_b, seed)?;

    report_results(&result, args.json)?;
    if let Some(path) = &args.output {
        write_json(path, &result)?;
    }
    Ok(())
}

// ============================================================================
// LEVEL 2 - PHASES
// ============================================================================

fn build_runner(args: &MatchArgs) -> Result<MatchRunner> {
    let mut config = MatchConfig::for_game(args.game)
        .with_max_ticks(args.max_ticks)
        .with_anticheat(anticheat_config(args.timeout_ms));
    if args.replay {
        config = config.with_replay();
    }
    MatchRunner::new(config).context("Invalid match configuration")
}

fn play_match(
    runner: &MatchRunner,
    kind_a: AgentKind,
    kind_b: AgentKind,
    seed: u64,
) -> Result<MatchResult> {
    let mut agent_a = kind_a.create_agent(Side::Player1, derive_seed(seed, 1));
    let mut agent_b = kind_b.create_agent(Side::Player2, derive_seed(seed, 2));
    runner
        .run(agent_a.as_mut(), agent_b.as_mut(), seed)
        .context("Match aborted")
}

fn report_results(result: &MatchResult, json: bool) -> Result<()> {
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

/// Exactly two agents, player_1 first
fn resolve_pair(args: &MatchArgs) -> Result<(AgentKind, AgentKind)> {
    if args.agents.len() != 2 {
        bail!("a match needs exactly 2 agents, got {}", args.agents.len());
    }
    let kinds = resolve_agents(&args.agents, args.game, 2)?;
    Ok((kinds[0], kinds[1]))
}

/// Event counts by type
fn event_summary(result: &MatchResult) -> BTreeMap<&'static str, usize> {
    let mut counts = BTreeMap::new();
    for event in &result.events {
        *counts.entry(event.type_name()).or_insert(0) += 1;
    }
    counts
}

// ============================================================================
// LEVEL 4 - UTILITIES
// ============================================================================

fn print_text_results(result: &MatchResult) {
    println!("\n=== Match Result ({}) ===", result.game);
    println!("Seed:      {}", result.seed);
    println!("player_1:  {}", result.agent_a);
    println!("player_2:  {}", result.agent_b);
    println!(
        "Score:     {} - {}",
        result.final_scores.player_1, result.final_scores.player_2
    );
    match result.winner {
        Some(side) => println!("Winner:    {} ({})", result.agent_on(side), side),
        None => println!("Winner:    draw"),
    }
    println!(
        "Ticks:     {}{}",
        result.ticks,
        if result.truncated { " (tick ceiling)" } else { "" }
    );

    println!(
        "Rewards:   {:.2} / {:.2}",
        result.rewards.player_1, result.rewards.player_2
    );

    let summary = event_summary(result);
    if !summary.is_empty() {
        println!("\nEvents:");
        for (kind, count) in summary {
            println!("  {:<20} {}", kind, count);
        }
    }

    if !result.anticheat.is_clean() {
        println!("\nAnti-cheat:");
        for (agent, count) in &result.anticheat.violation_counts {
            println!(
                "  {:<20} {} violations ({} timeouts)",
                agent,
                count,
                result.anticheat.timeouts_for(agent)
            );
        }
        for agent in &result.anticheat.disqualified {
            println!("  {} was disqualified", agent);
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
