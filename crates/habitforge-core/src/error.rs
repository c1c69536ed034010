//! Error types for habitforge-core

use thiserror::Error;

/// Core error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Referenced user or habit does not exist, or is not owned by the caller
    #[error("Not found: {0}")]
    NotFound(String),

    /// The habit already has a completion for the current period
    #[error("Habit {habit} already completed for {period}")]
    AlreadyCompleted { habit: String, period: String },

    /// Malformed input, rejected before any state is touched
    #[error("Validation error: {0}")]
    Validation(String),

    /// A level-gated reward was requested below its level
    #[error("Level {required} required to unlock {theme}")]
    LevelRequired { theme: String, required: u32 },

    /// The underlying store failed
    #[error("Storage error: {0}")]
    Storage(String),
}

impl Error {
    /// Shorthand for a `NotFound` error
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Error::NotFound(what.to_string())
    }

    /// Shorthand for a `Validation` error
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// Whether the error was caused by the caller rather than the system
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Error::Storage(_))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = Error::AlreadyCompleted {
            habit: "habit:3".to_string(),
            period: "2025-03-01".to_string(),
        };
        assert_eq!(err.to_string(), "Habit habit:3 already completed for 2025-03-01");
        assert_eq!(Error::not_found("user:9").to_string(), "Not found: user:9");
    }

    #[test]
    fn test_client_errors() {
        assert!(Error::validation("empty name").is_client_error());
        assert!(!Error::Storage("disk full".to_string()).is_client_error());
    }
}
