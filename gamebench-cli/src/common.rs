//! Shared argument parsing and output helpers
//!
//! Level 4 - Utilities

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Serialize;

use gamebench_arena::{AntiCheatConfig, TimeBudget};
use gamebench_core::{AgentKind, GameId};

/// clap value parser for `--game`
pub fn parse_game(s: &str) -> Result<GameId, String> {
    s.parse::<GameId>().map_err(|e| e.to_string())
}

/// Resolve agent names for `game`, requiring at least `min` of them
pub fn resolve_agents(names: &[String], game: GameId, min: usize) -> Result<Vec<AgentKind>> {
    if names.len() < min {
        bail!("need at least {} agents, got {}", min, names.len());
    }
    names
        .iter()
        .map(|name| {
            AgentKind::parse_for(name.trim(), game)
                .with_context(|| format!("Invalid agent '{}' for {}", name, game))
        })
        .collect()
}

/// Anti-cheat settings from `--timeout-ms` (0 disables the time limit)
pub fn anticheat_config(timeout_ms: u64) -> AntiCheatConfig {
    let budget = match timeout_ms {
        0 => TimeBudget::Unlimited,
        ms => TimeBudget::from_millis(ms),
    };
    AntiCheatConfig::default().with_time_budget(budget)
}

/// Pretty-print `value` as JSON into `path`, creating parent directories
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(value).context("Failed to serialize results")?;
    fs::write(path, json).with_context(|| format!("Failed to write file: {}", path.display()))?;
    tracing::info!("Results written to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_game_aliases() {
        assert_eq!(parse_game("rts"), Ok(GameId::Strategy));
        assert!(parse_game("chess").is_err());
    }

    #[test]
    fn test_resolve_agents() {
        let names = vec!["baseline".to_string(), " random".to_string()];
        let kinds = resolve_agents(&names, GameId::Sport, 2).unwrap();
        assert_eq!(kinds, vec![AgentKind::BallChaser, AgentKind::Random]);

        assert!(resolve_agents(&names[..1], GameId::Sport, 2).is_err());
        let wrong = vec!["squad".to_string(), "random".to_string()];
        assert!(resolve_agents(&wrong, GameId::Sport, 2).is_err());
    }

    #[test]
    fn test_zero_timeout_is_unlimited() {
        assert_eq!(anticheat_config(0).time_budget, TimeBudget::Unlimited);
        assert_eq!(anticheat_config(50).time_budget, TimeBudget::from_millis(50));
    }
}
