//! GameBench Arena - Running agents against each other
//!
//! This crate provides the match and tournament infrastructure:
//! - Anti-cheat validation of every agent decision
//! - Single matches with a hard tick ceiling
//! - ELO ratings
//! - Round-robin tournaments with side swap
//!
//! ## Architecture (4-layer granularity)
//!
//! - Level 1: run_tournament (orchestration)
//! - Level 2: MatchRunner::run, build_schedule (phases)
//! - Level 3: ActionValidator::decide, result aggregation (steps)
//! - Level 4: ELO math, configuration

mod anticheat;
mod config;
mod elo;
mod error;
mod match_runner;
mod tournament;

pub use anticheat::{
    ActionValidator, AntiCheatReport, Clock, ManualClock, SystemClock, Violation, ViolationKind,
};
pub use config::{AntiCheatConfig, MatchConfig, TimeBudget, TournamentConfig};
pub use elo::{expected_score, EloRating, EloTable, DEFAULT_RATING, K_FACTOR};
pub use error::ArenaError;
pub use match_runner::{MatchResult, MatchRunner, ReplayFrame};
pub use tournament::{
    build_schedule, derive_seed, run_tournament, run_tournament_with, CancelToken, Entrant,
    MatchupRecord, ScheduledMatch, SideBalance, TournamentResult,
};
