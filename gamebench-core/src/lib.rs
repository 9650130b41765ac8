//! GameBench Core - Game engines and agents
//!
//! This crate provides everything that runs inside a single match:
//! - Side, score and event types shared by every game
//! - The `Environment` contract and the `GameEnv` tagged union
//! - Three deterministic engines: Sport (2D car-ball), Strategy (grid RTS)
//!   and Tactical (round-based team shooter)
//! - The `Agent` contract plus random and scripted baseline agents
//!
//! Nothing here reads the clock or touches I/O; timing and validation of
//! agents belong to the arena crate.

pub mod agents;
pub mod env;
pub mod error;
pub mod events;
pub mod geometry;
pub mod sport;
pub mod strategy;
pub mod tactical;
pub mod types;

// Re-exports for convenient access
pub use agents::{Agent, AgentFactory, AgentKind, RandomAgent};
pub use env::{Action, Environment, GameConfig, GameEnv, Observation, Step, StepInfo};
pub use error::{ConfigError, EnvError};
pub use events::{Event, EventKind};
pub use sport::{SportAction, SportConfig, SportEnv, SportObservation};
pub use strategy::{
    StrategyAction, StrategyConfig, StrategyEnv, StrategyObservation, UnitKind, ZoneId, MAX_INCOME,
};
pub use tactical::{
    MemberOrder, TacticalAction, TacticalConfig, TacticalEnv, TacticalObservation, Team,
    MAX_TEAM_SIZE,
};
pub use types::{GameId, Outcome, PerSide, Scores, Side};
