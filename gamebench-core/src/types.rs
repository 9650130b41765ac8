//! Side, score and outcome types shared by every game

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

// ============================================================================
// SIDES
// ============================================================================

/// Generic seat in a match. Every game maps its own roles onto these two.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Side {
    #[serde(rename = "player_1")]
    Player1,
    #[serde(rename = "player_2")]
    Player2,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Player1, Side::Player2];

    pub fn opponent(self) -> Self {
        match self {
            Side::Player1 => Side::Player2,
            Side::Player2 => Side::Player1,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Side::Player1 => 0,
            Side::Player2 => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Player1 => "player_1",
            Side::Player2 => "player_2",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One value per side, serialized as `{player_1, player_2}`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PerSide<T> {
    pub player_1: T,
    pub player_2: T,
}

impl<T> PerSide<T> {
    pub fn new(player_1: T, player_2: T) -> Self {
        Self { player_1, player_2 }
    }

    /// Build both entries from a per-side closure
    pub fn from_fn(mut f: impl FnMut(Side) -> T) -> Self {
        Self {
            player_1: f(Side::Player1),
            player_2: f(Side::Player2),
        }
    }

    pub fn map<U>(self, mut f: impl FnMut(Side, T) -> U) -> PerSide<U> {
        PerSide {
            player_1: f(Side::Player1, self.player_1),
            player_2: f(Side::Player2, self.player_2),
        }
    }

    pub fn as_ref(&self) -> PerSide<&T> {
        PerSide {
            player_1: &self.player_1,
            player_2: &self.player_2,
        }
    }
}

impl<T> Index<Side> for PerSide<T> {
    type Output = T;

    fn index(&self, side: Side) -> &T {
        match side {
            Side::Player1 => &self.player_1,
            Side::Player2 => &self.player_2,
        }
    }
}

impl<T> IndexMut<Side> for PerSide<T> {
    fn index_mut(&mut self, side: Side) -> &mut T {
        match side {
            Side::Player1 => &mut self.player_1,
            Side::Player2 => &mut self.player_2,
        }
    }
}

/// Final or running score per side
pub type Scores = PerSide<u32>;

impl Scores {
    /// Standard score comparison: higher wins, equal is a draw
    pub fn outcome(&self) -> Outcome {
        match self.player_1.cmp(&self.player_2) {
            std::cmp::Ordering::Greater => Outcome::Win(Side::Player1),
            std::cmp::Ordering::Less => Outcome::Win(Side::Player2),
            std::cmp::Ordering::Equal => Outcome::Draw,
        }
    }
}

// ============================================================================
// OUTCOMES
// ============================================================================

/// Result of a finished match
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Win(Side),
    Draw,
}

impl Outcome {
    /// Winning side, `None` for a draw
    pub fn winner(self) -> Option<Side> {
        match self {
            Outcome::Win(side) => Some(side),
            Outcome::Draw => None,
        }
    }

    /// ELO-style score from `side`'s point of view
    pub fn score_for(self, side: Side) -> f64 {
        match self {
            Outcome::Win(w) if w == side => 1.0,
            Outcome::Win(_) => 0.0,
            Outcome::Draw => 0.5,
        }
    }
}

// ============================================================================
// GAME IDS
// ============================================================================

/// The closed set of games
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameId {
    Sport,
    Strategy,
    Tactical,
}

impl GameId {
    pub const ALL: [GameId; 3] = [GameId::Sport, GameId::Strategy, GameId::Tactical];

    pub fn as_str(self) -> &'static str {
        match self {
            GameId::Sport => "sport",
            GameId::Strategy => "strategy",
            GameId::Tactical => "tactical",
        }
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameId {
    type Err = crate::ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sport" | "carball" => Ok(GameId::Sport),
            "strategy" | "rts" | "microrts" => Ok(GameId::Strategy),
            "tactical" | "fps" | "tacticfps" => Ok(GameId::Tactical),
            other => Err(crate::ConfigError::UnknownGame(other.to_string())),
        }
    }
}
