//! Agents: the decision-making side of a match
//!
//! An [`Agent`] maps an observation to an action once per tick. Agents own
//! whatever memory they like but only ever see the observation for their
//! own side. Scripted baselines live in the per-game submodules; anything
//! else (learned policies, remote players) plugs in through
//! [`AgentFactory`].

mod sport_bots;
mod strategy_bots;
mod tactical_bot;

pub use sport_bots::{BallChaser, Goalie, Striker};
pub use strategy_bots::{EconomyBot, RushBot};
pub use tactical_bot::SquadBot;

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use std::fmt;
use std::str::FromStr;

use crate::env::{Action, Observation};
use crate::error::ConfigError;
use crate::sport::SportAction;
use crate::strategy::StrategyAction;
use crate::tactical::{MemberOrder, TacticalAction};
use crate::types::{GameId, Side};

// ============================================================================
// CONTRACT
// ============================================================================

/// A player. `act` is timed and validated by the arena.
pub trait Agent: Send {
    fn name(&self) -> &str;

    fn act(&mut self, observation: &Observation) -> Action;

    /// Forget per-match memory
    fn reset(&mut self) {}
}

/// Creates a fresh agent for one match
pub trait AgentFactory: Send + Sync {
    fn create(&self, side: Side, seed: u64) -> Box<dyn Agent>;

    /// Whether agents from this factory can play `game`
    fn supports(&self, _game: GameId) -> bool {
        true
    }
}

impl<F> AgentFactory for F
where
    F: Fn(Side, u64) -> Box<dyn Agent> + Send + Sync,
{
    fn create(&self, side: Side, seed: u64) -> Box<dyn Agent> {
        self(side, seed)
    }
}

// ============================================================================
// BUILT-IN AGENTS
// ============================================================================

/// Built-in agent types, selectable by name
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AgentKind {
    Random,
    BallChaser,
    Goalie,
    Striker,
    Rush,
    Economy,
    Squad,
}

impl AgentKind {
    pub const ALL: [AgentKind; 7] = [
        AgentKind::Random,
        AgentKind::BallChaser,
        AgentKind::Goalie,
        AgentKind::Striker,
        AgentKind::Rush,
        AgentKind::Economy,
        AgentKind::Squad,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AgentKind::Random => "random",
            AgentKind::BallChaser => "ballchaser",
            AgentKind::Goalie => "goalie",
            AgentKind::Striker => "striker",
            AgentKind::Rush => "rush",
            AgentKind::Economy => "economy",
            AgentKind::Squad => "squad",
        }
    }

    /// The reference scripted bot for a game
    pub fn baseline(game: GameId) -> AgentKind {
        match game {
            GameId::Sport => AgentKind::BallChaser,
            GameId::Strategy => AgentKind::Rush,
            GameId::Tactical => AgentKind::Squad,
        }
    }

    pub fn supports(self, game: GameId) -> bool {
        match self {
            AgentKind::Random => true,
            AgentKind::BallChaser | AgentKind::Goalie | AgentKind::Striker => game == GameId::Sport,
            AgentKind::Rush | AgentKind::Economy => game == GameId::Strategy,
            AgentKind::Squad => game == GameId::Tactical,
        }
    }

    /// Parse a name in the context of a game; `baseline` resolves per game
    pub fn parse_for(name: &str, game: GameId) -> Result<AgentKind, ConfigError> {
        let kind = if name.eq_ignore_ascii_case("baseline") {
            AgentKind::baseline(game)
        } else {
            name.parse()?
        };
        if kind.supports(game) {
            Ok(kind)
        } else {
            Err(ConfigError::invalid(
                "agent",
                format!("'{}' cannot play {}", kind, game),
            ))
        }
    }

    /// Instantiate the agent for a seat
    pub fn create_agent(self, side: Side, seed: u64) -> Box<dyn Agent> {
        match self {
            AgentKind::Random => Box::new(RandomAgent::new(seed)),
            AgentKind::BallChaser => Box::new(BallChaser::new()),
            AgentKind::Goalie => Box::new(Goalie::new()),
            AgentKind::Striker => Box::new(Striker::new()),
            AgentKind::Rush => Box::new(RushBot::new(side)),
            AgentKind::Economy => Box::new(EconomyBot::new(side)),
            AgentKind::Squad => Box::new(SquadBot::new()),
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        AgentKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == lower)
            .ok_or_else(|| ConfigError::UnknownAgent(s.to_string()))
    }
}

impl AgentFactory for AgentKind {
    fn create(&self, side: Side, seed: u64) -> Box<dyn Agent> {
        self.create_agent(side, seed)
    }

    fn supports(&self, game: GameId) -> bool {
        AgentKind::supports(*self, game)
    }
}

/// Uniformly random over the legal set, reproducible from its seed
pub struct RandomAgent {
    seed: u64,
    rng: ChaCha8Rng,
}

impl RandomAgent {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl Agent for RandomAgent {
    fn name(&self) -> &str {
        "random"
    }

    fn act(&mut self, observation: &Observation) -> Action {
        match observation {
            Observation::Sport(o) => Action::Sport(
                o.valid_actions
                    .choose(&mut self.rng)
                    .copied()
                    .unwrap_or_default(),
            ),
            Observation::Strategy(o) => Action::Strategy(
                o.valid_actions
                    .choose(&mut self.rng)
                    .copied()
                    .unwrap_or(StrategyAction::Noop),
            ),
            // independent pick per member; every combination is legal
            Observation::Tactical(o) => Action::Tactical(TacticalAction::new(
                o.legal_orders
                    .iter()
                    .map(|options| options.choose(&mut self.rng).copied().unwrap_or_default())
                    .collect::<Vec<MemberOrder>>(),
            )),
        }
    }

    fn reset(&mut self) {
        self.rng = ChaCha8Rng::seed_from_u64(self.seed);
    }
}

/// First candidate present in the legal list, else the fallback
pub(crate) fn first_legal<T: PartialEq + Copy>(
    legal: &[T],
    candidates: impl IntoIterator<Item = T>,
    fallback: T,
) -> T {
    candidates
        .into_iter()
        .find(|c| legal.contains(c))
        .unwrap_or(fallback)
}

/// Sport fallback chain: drop dash, then boost, then idle
pub(crate) fn legal_sport(legal: &[SportAction], want: SportAction) -> SportAction {
    first_legal(
        legal,
        [
            want,
            SportAction { dash: false, ..want },
            SportAction {
                dash: false,
                boost: false,
                ..want
            },
        ],
        SportAction::default(),
    )
}
