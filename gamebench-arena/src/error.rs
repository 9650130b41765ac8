//! Error types for the arena
//!
//! Everything here is a configuration problem reported before the first
//! match starts, or contract misuse bubbling up from an environment. Agent
//! misbehaviour never shows up as an error; it becomes a violation in the
//! anti-cheat report instead.

use gamebench_core::{ConfigError, EnvError, GameId};

#[derive(Debug, thiserror::Error)]
pub enum ArenaError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Env(#[from] EnvError),

    #[error("a tournament needs at least two entrants, got {0}")]
    NotEnoughEntrants(usize),

    #[error("entrant name '{0}' is used twice")]
    DuplicateEntrant(String),

    #[error("entrant '{name}' cannot play {game}")]
    UnsupportedGame { name: String, game: GameId },
}
