//! Error types for environment construction and use

/// Rejected configuration. Surfaced before any match starts.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown game '{0}'")]
    UnknownGame(String),

    #[error("unknown agent '{0}'")]
    UnknownAgent(String),

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Misuse of the environment contract
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvError {
    #[error("step called after the match finished at tick {tick}")]
    AlreadyDone { tick: u32 },
}
