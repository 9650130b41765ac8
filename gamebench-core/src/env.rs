//! The environment contract and the game-agnostic tagged union
//!
//! Each game implements [`Environment`] with its own action and observation
//! types. [`GameEnv`] wraps the closed set of games behind the unified
//! [`Action`] / [`Observation`] enums so the runner never needs to know
//! which game it is driving.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ConfigError, EnvError};
use crate::events::Event;
use crate::sport::{SportAction, SportConfig, SportEnv, SportObservation};
use crate::strategy::{StrategyAction, StrategyConfig, StrategyEnv, StrategyObservation};
use crate::tactical::{TacticalAction, TacticalConfig, TacticalEnv, TacticalObservation};
use crate::types::{GameId, Outcome, PerSide, Scores, Side};

// ============================================================================
// CONTRACT
// ============================================================================

/// Outcome of a single tick
#[derive(Clone, Debug)]
pub struct Step<O> {
    pub observations: PerSide<O>,
    pub rewards: PerSide<f64>,
    pub done: bool,
    pub info: StepInfo,
}

/// Side information reported by every step
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepInfo {
    pub tick: u32,
    pub scores: Scores,
    /// Events raised during this tick, in order
    pub events: Vec<Event>,
}

/// Four-operation state machine shared by all games
///
/// Implementations must be deterministic: the same seed followed by the same
/// action sequence reproduces the same trajectory.
pub trait Environment {
    type Action: Clone + PartialEq + fmt::Debug;
    type Observation: Clone + fmt::Debug;

    fn game_id(&self) -> GameId;

    /// Reinitialize from `seed` and return the opening observations
    fn reset(&mut self, seed: u64) -> PerSide<Self::Observation>;

    /// Advance exactly one tick. Illegal actions are replaced by the no-op.
    fn step(&mut self, actions: &PerSide<Self::Action>)
        -> Result<Step<Self::Observation>, EnvError>;

    /// Legal actions for `side` on the current tick
    fn valid_actions(&self, side: Side) -> Vec<Self::Action>;

    /// Membership test against [`Environment::valid_actions`]
    fn is_valid_action(&self, side: Side, action: &Self::Action) -> bool {
        self.valid_actions(side).contains(action)
    }

    /// The do-nothing action, always legal
    fn noop(&self, side: Side) -> Self::Action;

    fn observe(&self, side: Side) -> Self::Observation;

    /// `None` until the match is done
    fn winner(&self) -> Option<Outcome>;

    fn scores(&self) -> Scores;

    fn tick(&self) -> u32;

    fn is_done(&self) -> bool;

    /// Standard score comparison, used when a match is cut short
    fn score_outcome(&self) -> Outcome {
        self.scores().outcome()
    }
}

/// Replace every illegal action with the side's no-op
pub(crate) fn legalize<E: Environment + ?Sized>(
    env: &E,
    actions: &PerSide<E::Action>,
) -> PerSide<E::Action> {
    PerSide::from_fn(|side| {
        if env.is_valid_action(side, &actions[side]) {
            actions[side].clone()
        } else {
            env.noop(side)
        }
    })
}

// ============================================================================
// UNIFIED ACTIONS AND OBSERVATIONS
// ============================================================================

/// Action for any game
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Sport(SportAction),
    Strategy(StrategyAction),
    Tactical(TacticalAction),
}

impl Action {
    pub fn game_id(&self) -> GameId {
        match self {
            Action::Sport(_) => GameId::Sport,
            Action::Strategy(_) => GameId::Strategy,
            Action::Tactical(_) => GameId::Tactical,
        }
    }
}

/// Observation for any game
#[derive(Clone, Debug)]
pub enum Observation {
    Sport(SportObservation),
    Strategy(StrategyObservation),
    Tactical(TacticalObservation),
}

impl Observation {
    pub fn game_id(&self) -> GameId {
        match self {
            Observation::Sport(_) => GameId::Sport,
            Observation::Strategy(_) => GameId::Strategy,
            Observation::Tactical(_) => GameId::Tactical,
        }
    }

    pub fn tick(&self) -> u32 {
        match self {
            Observation::Sport(o) => o.tick,
            Observation::Strategy(o) => o.tick,
            Observation::Tactical(o) => o.tick,
        }
    }
}

// ============================================================================
// CONFIGURATION (environment factory)
// ============================================================================

/// Per-game configuration; building one yields a fresh [`GameEnv`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "game", rename_all = "snake_case")]
pub enum GameConfig {
    Sport(SportConfig),
    Strategy(StrategyConfig),
    Tactical(TacticalConfig),
}

impl GameConfig {
    /// Default configuration for a game
    pub fn default_for(game: GameId) -> Self {
        match game {
            GameId::Sport => GameConfig::Sport(SportConfig::default()),
            GameId::Strategy => GameConfig::Strategy(StrategyConfig::default()),
            GameId::Tactical => GameConfig::Tactical(TacticalConfig::default()),
        }
    }

    pub fn game_id(&self) -> GameId {
        match self {
            GameConfig::Sport(_) => GameId::Sport,
            GameConfig::Strategy(_) => GameId::Strategy,
            GameConfig::Tactical(_) => GameId::Tactical,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            GameConfig::Sport(c) => c.validate(),
            GameConfig::Strategy(c) => c.validate(),
            GameConfig::Tactical(c) => c.validate(),
        }
    }

    /// Create a new, not yet reset environment
    pub fn build(&self) -> Result<GameEnv, ConfigError> {
        self.validate()?;
        Ok(match self {
            GameConfig::Sport(c) => GameEnv::Sport(SportEnv::new(c.clone())),
            GameConfig::Strategy(c) => GameEnv::Strategy(StrategyEnv::new(c.clone())),
            GameConfig::Tactical(c) => GameEnv::Tactical(TacticalEnv::new(c.clone())),
        })
    }
}

// ============================================================================
// TAGGED UNION
// ============================================================================

/// One environment instance of any game
#[derive(Clone, Debug)]
pub enum GameEnv {
    Sport(SportEnv),
    Strategy(StrategyEnv),
    Tactical(TacticalEnv),
}

/// Unwrap the matching action variant or fall back to the game's no-op
fn narrow<E, F>(env: &E, side: Side, action: &Action, pick: F) -> E::Action
where
    E: Environment,
    F: Fn(&Action) -> Option<&E::Action>,
{
    pick(action).cloned().unwrap_or_else(|| env.noop(side))
}

fn widen_step<O>(step: Step<O>, wrap: fn(O) -> Observation) -> Step<Observation> {
    Step {
        observations: step.observations.map(|_, o| wrap(o)),
        rewards: step.rewards,
        done: step.done,
        info: step.info,
    }
}

impl Environment for GameEnv {
    type Action = Action;
    type Observation = Observation;

    fn game_id(&self) -> GameId {
        match self {
            GameEnv::Sport(e) => e.game_id(),
            GameEnv::Strategy(e) => e.game_id(),
            GameEnv::Tactical(e) => e.game_id(),
        }
    }

    fn reset(&mut self, seed: u64) -> PerSide<Observation> {
        match self {
            GameEnv::Sport(e) => e.reset(seed).map(|_, o| Observation::Sport(o)),
            GameEnv::Strategy(e) => e.reset(seed).map(|_, o| Observation::Strategy(o)),
            GameEnv::Tactical(e) => e.reset(seed).map(|_, o| Observation::Tactical(o)),
        }
    }

    fn step(&mut self, actions: &PerSide<Action>) -> Result<Step<Observation>, EnvError> {
        match self {
            GameEnv::Sport(e) => {
                let typed = PerSide::from_fn(|side| {
                    narrow(&*e, side, &actions[side], |a| match a {
                        Action::Sport(inner) => Some(inner),
                        _ => None,
                    })
                });
                Ok(widen_step(e.step(&typed)?, Observation::Sport))
            }
            GameEnv::Strategy(e) => {
                let typed = PerSide::from_fn(|side| {
                    narrow(&*e, side, &actions[side], |a| match a {
                        Action::Strategy(inner) => Some(inner),
                        _ => None,
                    })
                });
                Ok(widen_step(e.step(&typed)?, Observation::Strategy))
            }
            GameEnv::Tactical(e) => {
                let typed = PerSide::from_fn(|side| {
                    narrow(&*e, side, &actions[side], |a| match a {
                        Action::Tactical(inner) => Some(inner),
                        _ => None,
                    })
                });
                Ok(widen_step(e.step(&typed)?, Observation::Tactical))
            }
        }
    }

    fn valid_actions(&self, side: Side) -> Vec<Action> {
        match self {
            GameEnv::Sport(e) => e.valid_actions(side).into_iter().map(Action::Sport).collect(),
            GameEnv::Strategy(e) => e
                .valid_actions(side)
                .into_iter()
                .map(Action::Strategy)
                .collect(),
            GameEnv::Tactical(e) => e
                .valid_actions(side)
                .into_iter()
                .map(Action::Tactical)
                .collect(),
        }
    }

    fn is_valid_action(&self, side: Side, action: &Action) -> bool {
        match (self, action) {
            (GameEnv::Sport(e), Action::Sport(a)) => e.is_valid_action(side, a),
            (GameEnv::Strategy(e), Action::Strategy(a)) => e.is_valid_action(side, a),
            (GameEnv::Tactical(e), Action::Tactical(a)) => e.is_valid_action(side, a),
            _ => false,
        }
    }

    fn noop(&self, side: Side) -> Action {
        match self {
            GameEnv::Sport(e) => Action::Sport(e.noop(side)),
            GameEnv::Strategy(e) => Action::Strategy(e.noop(side)),
            GameEnv::Tactical(e) => Action::Tactical(e.noop(side)),
        }
    }

    fn observe(&self, side: Side) -> Observation {
        match self {
            GameEnv::Sport(e) => Observation::Sport(e.observe(side)),
            GameEnv::Strategy(e) => Observation::Strategy(e.observe(side)),
            GameEnv::Tactical(e) => Observation::Tactical(e.observe(side)),
        }
    }

    fn winner(&self) -> Option<Outcome> {
        match self {
            GameEnv::Sport(e) => e.winner(),
            GameEnv::Strategy(e) => e.winner(),
            GameEnv::Tactical(e) => e.winner(),
        }
    }

    fn scores(&self) -> Scores {
        match self {
            GameEnv::Sport(e) => e.scores(),
            GameEnv::Strategy(e) => e.scores(),
            GameEnv::Tactical(e) => e.scores(),
        }
    }

    fn tick(&self) -> u32 {
        match self {
            GameEnv::Sport(e) => e.tick(),
            GameEnv::Strategy(e) => e.tick(),
            GameEnv::Tactical(e) => e.tick(),
        }
    }

    fn is_done(&self) -> bool {
        match self {
            GameEnv::Sport(e) => e.is_done(),
            GameEnv::Strategy(e) => e.is_done(),
            GameEnv::Tactical(e) => e.is_done(),
        }
    }

    fn score_outcome(&self) -> Outcome {
        match self {
            GameEnv::Sport(e) => e.score_outcome(),
            GameEnv::Strategy(e) => e.score_outcome(),
            GameEnv::Tactical(e) => e.score_outcome(),
        }
    }
}
