//! Configuration types for matches and tournaments
//!
//! Level 4 - Utilities and configuration

use gamebench_core::{ConfigError, GameConfig, GameId};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-decision time allowance for an agent
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeBudget {
    /// Never time out (useful for debugging slow agents)
    Unlimited,
    /// Decisions slower than this are discarded
    WallClock(Duration),
}

impl TimeBudget {
    pub fn from_millis(ms: u64) -> Self {
        TimeBudget::WallClock(Duration::from_millis(ms))
    }

    /// Whether `elapsed` overruns the budget
    pub fn exceeded_by(&self, elapsed: Duration) -> bool {
        match self {
            TimeBudget::Unlimited => false,
            TimeBudget::WallClock(limit) => elapsed > *limit,
        }
    }
}

impl Default for TimeBudget {
    fn default() -> Self {
        TimeBudget::from_millis(30)
    }
}

/// Anti-cheat configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AntiCheatConfig {
    /// Time allowed for each `act` call
    pub time_budget: TimeBudget,
    /// Violations before disqualification
    pub max_violations: u32,
    /// Disqualify on the first violation
    pub strict: bool,
    /// Reward deducted per tick for each violation on record
    pub penalty_per_violation: f64,
}

impl Default for AntiCheatConfig {
    fn default() -> Self {
        Self {
            time_budget: TimeBudget::default(),
            max_violations: 10,
            strict: false,
            penalty_per_violation: 0.01,
        }
    }
}

impl AntiCheatConfig {
    /// Set the time budget
    pub fn with_time_budget(mut self, time_budget: TimeBudget) -> Self {
        self.time_budget = time_budget;
        self
    }

    pub fn with_max_violations(mut self, max_violations: u32) -> Self {
        self.max_violations = max_violations;
        self
    }

    /// Enable strict mode
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    pub fn with_penalty_per_violation(mut self, penalty: f64) -> Self {
        self.penalty_per_violation = penalty;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_violations == 0 {
            return Err(ConfigError::invalid("max_violations", "must be at least 1"));
        }
        if self.time_budget == TimeBudget::WallClock(Duration::ZERO) {
            return Err(ConfigError::invalid("time_budget", "must be positive"));
        }
        if !self.penalty_per_violation.is_finite() || self.penalty_per_violation < 0.0 {
            return Err(ConfigError::invalid(
                "penalty_per_violation",
                "must be a non-negative number",
            ));
        }
        Ok(())
    }
}

/// Configuration for a single match
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchConfig {
    /// Game and its rules
    pub game: GameConfig,
    /// Hard tick ceiling, independent of the game's own time limit
    pub max_ticks: u32,
    pub anticheat: AntiCheatConfig,
    /// Keep the per-tick action log in the result
    pub record_replay: bool,
}

impl MatchConfig {
    pub fn new(game: GameConfig) -> Self {
        Self {
            game,
            max_ticks: 10_000,
            anticheat: AntiCheatConfig::default(),
            record_replay: false,
        }
    }

    /// Default rules for `game`
    pub fn for_game(game: GameId) -> Self {
        Self::new(GameConfig::default_for(game))
    }

    pub fn with_max_ticks(mut self, max_ticks: u32) -> Self {
        self.max_ticks = max_ticks;
        self
    }

    pub fn with_anticheat(mut self, anticheat: AntiCheatConfig) -> Self {
        self.anticheat = anticheat;
        self
    }

    pub fn with_replay(mut self) -> Self {
        self.record_replay = true;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_ticks == 0 {
            return Err(ConfigError::invalid("max_ticks", "must be at least 1"));
        }
        self.game.validate()?;
        self.anticheat.validate()
    }
}

/// Tournament configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TournamentConfig {
    /// Rules shared by every match
    pub game: MatchConfig,
    /// Matches per entrant pair, both legs included
    pub matches_per_pair: usize,
    /// Tournament seed; every match seed derives from it
    pub seed: u64,
    /// Alternate roles between legs (needs an even match count)
    pub side_swap: bool,
    /// Whether to run matches in parallel
    pub parallel: bool,
}

impl TournamentConfig {
    pub fn new(game: MatchConfig) -> Self {
        Self {
            game,
            matches_per_pair: 10,
            seed: 0,
            side_swap: true,
            parallel: true,
        }
    }

    /// Default rules for `game`
    pub fn for_game(game: GameId) -> Self {
        Self::new(MatchConfig::for_game(game))
    }

    pub fn with_matches_per_pair(mut self, matches_per_pair: usize) -> Self {
        self.matches_per_pair = matches_per_pair;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_side_swap(mut self, side_swap: bool) -> Self {
        self.side_swap = side_swap;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn game_id(&self) -> GameId {
        self.game.game.game_id()
    }

    /// Distinct seeds each pairing plays
    pub fn seeds_per_pair(&self) -> usize {
        if self.side_swap {
            self.matches_per_pair / 2
        } else {
            self.matches_per_pair
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.matches_per_pair == 0 {
            return Err(ConfigError::invalid("matches_per_pair", "must be at least 1"));
        }
        if self.side_swap && self.matches_per_pair % 2 != 0 {
            return Err(ConfigError::invalid(
                "matches_per_pair",
                format!("side swap needs an even count, got {}", self.matches_per_pair),
            ));
        }
        self.game.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anticheat_defaults() {
        let config = AntiCheatConfig::default();
        assert_eq!(config.time_budget, TimeBudget::WallClock(Duration::from_millis(30)));
        assert_eq!(config.max_violations, 10);
        assert!(!config.strict);
        assert_eq!(config.penalty_per_violation, 0.01);
    }

    #[test]
    fn test_time_budget_exceeded() {
        let budget = TimeBudget::from_millis(30);
        assert!(!budget.exceeded_by(Duration::from_millis(30)));
        assert!(budget.exceeded_by(Duration::from_millis(31)));
        assert!(!TimeBudget::Unlimited.exceeded_by(Duration::from_secs(3600)));
    }

    #[test]
    fn test_match_config_defaults() {
        let config = MatchConfig::for_game(GameId::Sport);
        assert_eq!(config.max_ticks, 10_000);
        assert!(!config.record_replay);
        assert!(config.validate().is_ok());
        assert!(config.with_max_ticks(0).validate().is_err());
    }

    #[test]
    fn test_tournament_config_side_swap_needs_even() {
        let config = TournamentConfig::for_game(GameId::Strategy).with_matches_per_pair(3);
        assert!(config.validate().is_err());
        let config = config.with_side_swap(false);
        assert!(config.validate().is_ok());
        assert_eq!(config.seeds_per_pair(), 3);
        assert_eq!(
            TournamentConfig::for_game(GameId::Sport).seeds_per_pair(),
            5
        );
    }

    #[test]
    fn test_zero_violation_limit_rejected() {
        let config = AntiCheatConfig::default().with_max_violations(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_negative_penalty_rejected() {
        let config = AntiCheatConfig::default().with_penalty_per_violation(-0.5);
        assert!(config.validate().is_err());
        let config = AntiCheatConfig::default().with_penalty_per_violation(f64::NAN);
        assert!(config.validate().is_err());
        assert!(AntiCheatConfig::default()
            .with_penalty_per_violation(0.0)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_config_json_roundtrip() {
        let config = TournamentConfig::for_game(GameId::Tactical).with_seed(9);
        let json = serde_json::to_string(&config).unwrap();
        let back: TournamentConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
