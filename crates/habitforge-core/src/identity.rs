//! Identity types for users, habits and records

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Create a new ID
            pub fn new(id: u64) -> Self {
                Self(id)
            }

            /// Get the raw ID value
            pub fn raw(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }
    };
}

record_id!(
    /// Unique identifier for a user
    UserId,
    "user"
);
record_id!(
    /// Unique identifier for a habit
    HabitId,
    "habit"
);
record_id!(
    /// Unique identifier for a completion record
    CompletionId,
    "completion"
);

/// Identifier of an achievement in the static catalog
///
/// Uses a string-based ID so unlock records stay readable across catalog changes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AchievementId(pub String);

impl AchievementId {
    /// Create a new achievement ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AchievementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AchievementId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for AchievementId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Tables that draw ids from the store's sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdKind {
    User,
    Habit,
    Completion,
}

impl IdKind {
    /// Stable name used as the sequence key
    pub fn as_str(&self) -> &'static str {
        match self {
            IdKind::User => "user",
            IdKind::Habit => "habit",
            IdKind::Completion => "completion",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_ids() {
        let id = HabitId::new(42);
        assert_eq!(id.raw(), 42);
        assert_eq!(format!("{}", id), "habit:42");
        assert_eq!(format!("{}", UserId::new(7)), "user:7");
    }

    #[test]
    fn test_achievement_id() {
        let id = AchievementId::new("first_step");
        assert_eq!(id.as_str(), "first_step");
        assert_eq!(AchievementId::from("first_step"), id);
    }
}
