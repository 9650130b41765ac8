//! Tournament execution - round-robin with side swap
//!
//! Level 1 - Orchestration and Level 2 - Phases

use gamebench_core::{AgentFactory, AgentKind, GameId, PerSide, Side};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::TournamentConfig;
use crate::elo::{EloRating, EloTable};
use crate::error::ArenaError;
use crate::match_runner::{MatchResult, MatchRunner};

/// A named participant. The factory builds a fresh agent for every match.
#[derive(Clone)]
pub struct Entrant {
    pub name: String,
    pub factory: Arc<dyn AgentFactory>,
}

impl Entrant {
    pub fn new(name: impl Into<String>, factory: impl AgentFactory + 'static) -> Self {
        Self {
            name: name.into(),
            factory: Arc::new(factory),
        }
    }

    /// Built-in agent under its own name
    pub fn builtin(kind: AgentKind) -> Self {
        Self::new(kind.as_str(), kind)
    }
}

impl fmt::Debug for Entrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entrant").field("name", &self.name).finish()
    }
}

/// Cooperative cancellation, checked before each match starts
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// One entry of the match schedule, fixed before anything runs
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScheduledMatch {
    pub index: usize,
    /// Index into the pairing list
    pub pairing: usize,
    /// Entrant index seated on each side
    pub seats: PerSide<usize>,
    pub seed: u64,
}

/// Head-to-head record of one pairing, by agent name
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchupRecord {
    pub agent_a: String,
    pub agent_b: String,
    pub wins_a: u32,
    pub wins_b: u32,
    pub draws: u32,
}

impl MatchupRecord {
    fn new(agent_a: &str, agent_b: &str) -> Self {
        Self {
            agent_a: agent_a.to_string(),
            agent_b: agent_b.to_string(),
            wins_a: 0,
            wins_b: 0,
            draws: 0,
        }
    }

    pub fn games(&self) -> u32 {
        self.wins_a + self.wins_b + self.draws
    }

    fn record(&mut self, result: &MatchResult) {
        match result.winner_name() {
            Some(name) if name == self.agent_a => self.wins_a += 1,
            Some(_) => self.wins_b += 1,
            None => self.draws += 1,
        }
    }
}

/// Wins by seat, to measure positional bias
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideBalance {
    pub player_1_wins: u32,
    pub player_2_wins: u32,
    pub draws: u32,
}

impl SideBalance {
    fn record(&mut self, winner: Option<Side>) {
        match winner {
            Some(Side::Player1) => self.player_1_wins += 1,
            Some(Side::Player2) => self.player_2_wins += 1,
            None => self.draws += 1,
        }
    }
}

/// Result of a tournament
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TournamentResult {
    pub game: GameId,
    /// Completed matches in schedule order
    pub matches: Vec<MatchResult>,
    /// Final ratings, best first
    pub leaderboard: Vec<(String, EloRating)>,
    pub total_matches: usize,
    pub side_swap: bool,
    pub matchups: Vec<MatchupRecord>,
    /// Event counts by `type` across all matches
    pub event_totals: BTreeMap<String, u64>,
    pub side_balance: SideBalance,
    /// Cancelled before the schedule finished
    pub aborted: bool,
}

impl TournamentResult {
    /// Top of the leaderboard
    pub fn leader(&self) -> Option<&str> {
        self.leaderboard.first().map(|(name, _)| name.as_str())
    }

    /// Head-to-head record for two agents, in either order
    pub fn matchup(&self, a: &str, b: &str) -> Option<&MatchupRecord> {
        self.matchups.iter().find(|m| {
            (m.agent_a == a && m.agent_b == b) || (m.agent_a == b && m.agent_b == a)
        })
    }
}

// ============================================================================
// Level 1 - Orchestration
// ============================================================================

/// Run a round-robin tournament (Level 1 orchestration)
///
/// `ratings` is consumed and returned updated, so a caller can carry a
/// table across tournaments.
pub fn run_tournament(
    config: &TournamentConfig,
    entrants: &[Entrant],
    ratings: EloTable,
) -> Result<(TournamentResult, EloTable), ArenaError> {
    run_tournament_with(config, entrants, ratings, &CancelToken::new(), &|_: &MatchResult| {})
}

/// Run a tournament with cancellation and a per-match callback
///
/// `on_match` fires as each match completes, possibly from a worker
/// thread and out of schedule order.
pub fn run_tournament_with(
    config: &TournamentConfig,
    entrants: &[Entrant],
    mut ratings: EloTable,
    cancel: &CancelToken,
    on_match: &(dyn Fn(&MatchResult) + Sync),
) -> Result<(TournamentResult, EloTable), ArenaError> {
    config.validate()?;
    validate_entrants(config.game_id(), entrants)?;
    let runner = MatchRunner::new(config.game.clone())?;

    let pairings = round_robin_pairings(entrants.len());
    let schedule = build_schedule(config, entrants.len());
    info!(
        "Tournament ({}): {} entrants, {} matches (side_swap={}, parallel={})",
        config.game_id(),
        entrants.len(),
        schedule.len(),
        config.side_swap,
        config.parallel
    );

    let outcomes = execute_schedule(&runner, entrants, &schedule, config.parallel, cancel, on_match);

    for entrant in entrants {
        ratings.ensure(&entrant.name);
    }
    let mut matchups: Vec<MatchupRecord> = pairings
        .iter()
        .map(|&(i, j)| MatchupRecord::new(&entrants[i].name, &entrants[j].name))
        .collect();
    let mut event_totals = BTreeMap::new();
    let mut side_balance = SideBalance::default();
    let mut matches = Vec::with_capacity(schedule.len());
    let mut aborted = false;

    // single writer, schedule order
    for (scheduled, outcome) in schedule.iter().zip(outcomes) {
        let Some(result) = outcome else {
            aborted = true;
            break;
        };
        let result = result?;
        record_match(&result, &mut ratings, &mut event_totals, &mut side_balance);
        matchups[scheduled.pairing].record(&result);
        matches.push(result);
    }

    let leaderboard = ratings.leaderboard();
    info!(
        "Tournament finished: {} matches played{}, leader {}",
        matches.len(),
        if aborted { " (aborted)" } else { "" },
        leaderboard.first().map_or("none", |(name, _)| name.as_str())
    );

    let result = TournamentResult {
        game: config.game_id(),
        total_matches: matches.len(),
        matches,
        leaderboard,
        side_swap: config.side_swap,
        matchups,
        event_totals,
        side_balance,
        aborted,
    };
    Ok((result, ratings))
}

// ============================================================================
// Level 2 - Phases
// ============================================================================

fn validate_entrants(game: GameId, entrants: &[Entrant]) -> Result<(), ArenaError> {
    if entrants.len() < 2 {
        return Err(ArenaError::NotEnoughEntrants(entrants.len()));
    }
    let mut seen = HashSet::new();
    for entrant in entrants {
        if !seen.insert(entrant.name.as_str()) {
            return Err(ArenaError::DuplicateEntrant(entrant.name.clone()));
        }
        if !entrant.factory.supports(game) {
            return Err(ArenaError::UnsupportedGame {
                name: entrant.name.clone(),
                game,
            });
        }
    }
    Ok(())
}

/// Every match of the tournament with its seats and seed (Level 2 phase)
///
/// Side-swapped legs of a pairing are adjacent and share a seed.
pub fn build_schedule(config: &TournamentConfig, entrant_count: usize) -> Vec<ScheduledMatch> {
    let seeds_per_pair = config.seeds_per_pair();
    let mut schedule = Vec::new();

    for (pairing, (i, j)) in round_robin_pairings(entrant_count).into_iter().enumerate() {
        for round in 0..seeds_per_pair {
            let seed = derive_seed(config.seed, (pairing * seeds_per_pair + round) as u64);
            schedule.push(ScheduledMatch {
                index: schedule.len(),
                pairing,
                seats: PerSide::new(i, j),
                seed,
            });
            if config.side_swap {
                schedule.push(ScheduledMatch {
                    index: schedule.len(),
                    pairing,
                    seats: PerSide::new(j, i),
                    seed,
                });
            }
        }
    }
    schedule
}

/// Run the schedule; `None` marks matches skipped after cancellation
fn execute_schedule(
    runner: &MatchRunner,
    entrants: &[Entrant],
    schedule: &[ScheduledMatch],
    parallel: bool,
    cancel: &CancelToken,
    on_match: &(dyn Fn(&MatchResult) + Sync),
) -> Vec<Option<Result<MatchResult, ArenaError>>> {
    if parallel {
        schedule
            .par_iter()
            .map(|m| play_scheduled(runner, entrants, m, cancel, on_match))
            .collect()
    } else {
        schedule
            .iter()
            .map(|m| play_scheduled(runner, entrants, m, cancel, on_match))
            .collect()
    }
}

// ============================================================================
// Level 3 - Steps
// ============================================================================

/// Generate all pairings for round-robin
fn round_robin_pairings(n: usize) -> Vec<(usize, usize)> {
    let mut pairings = Vec::new();
    for i in 0..n {
        for j in (i + 1)..n {
            pairings.push((i, j));
        }
    }
    pairings
}

fn play_scheduled(
    runner: &MatchRunner,
    entrants: &[Entrant],
    scheduled: &ScheduledMatch,
    cancel: &CancelToken,
    on_match: &(dyn Fn(&MatchResult) + Sync),
) -> Option<Result<MatchResult, ArenaError>> {
    if cancel.is_cancelled() {
        return None;
    }
    let names = scheduled.seats.map(|_, idx| entrants[idx].name.clone());
    let mut agents = scheduled.seats.map(|side, idx| {
        entrants[idx]
            .factory
            .create(side, derive_seed(scheduled.seed, side.index() as u64 + 1))
    });
    debug!("Match {} starting (seed={})", scheduled.index, scheduled.seed);

    let result = runner.run_named(
        names,
        agents.player_1.as_mut(),
        agents.player_2.as_mut(),
        scheduled.seed,
    );
    if let Ok(result) = &result {
        on_match(result);
    }
    Some(result)
}

/// Fold one result into the running aggregates
fn record_match(
    result: &MatchResult,
    ratings: &mut EloTable,
    event_totals: &mut BTreeMap<String, u64>,
    side_balance: &mut SideBalance,
) {
    ratings.update(
        result.agent_on(Side::Player1),
        result.agent_on(Side::Player2),
        result.outcome().score_for(Side::Player1),
    );
    for event in &result.events {
        *event_totals.entry(event.type_name().to_string()).or_insert(0) += 1;
    }
    side_balance.record(result.winner);
}

/// Stable seed mixer (SplitMix64)
fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Seed for slot `index` of a run seeded with `base`
pub fn derive_seed(base: u64, index: u64) -> u64 {
    splitmix64(base ^ splitmix64(index))
}
