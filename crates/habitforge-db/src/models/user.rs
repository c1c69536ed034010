//! User and sequence models for database storage.

use super::{from_millis, to_millis};
use crate::error::Result;
use habitforge_core::{User, UserId};
use native_db::*;
use native_model::{native_model, Model};
use serde::{Deserialize, Serialize};

/// Stored user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[native_model(id = 1, version = 1)]
#[native_db]
pub struct StoredUser {
    /// Primary key - user ID.
    #[primary_key]
    pub id: u64,
    /// Identity provider subject, unique.
    #[secondary_key(unique)]
    pub subject: String,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub xp: u64,
    pub level: u32,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub total_habits_completed: u64,
    /// Milliseconds since the epoch.
    pub created_at: i64,
    /// Milliseconds since the epoch.
    pub updated_at: i64,
}

impl StoredUser {
    /// Create from a user record.
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id.raw(),
            subject: user.subject.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            avatar: user.avatar.clone(),
            xp: user.xp,
            level: user.level,
            current_streak: user.current_streak,
            longest_streak: user.longest_streak,
            total_habits_completed: user.total_habits_completed,
            created_at: to_millis(user.created_at),
            updated_at: to_millis(user.updated_at),
        }
    }

    /// Convert to a user record.
    pub fn to_user(&self) -> Result<User> {
        Ok(User {
            id: UserId::new(self.id),
            subject: self.subject.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            avatar: self.avatar.clone(),
            xp: self.xp,
            level: self.level,
            current_streak: self.current_streak,
            longest_streak: self.longest_streak,
            total_habits_completed: self.total_habits_completed,
            created_at: from_millis(self.created_at)?,
            updated_at: from_millis(self.updated_at)?,
        })
    }
}

/// Last id handed out for one table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[native_model(id = 2, version = 1)]
#[native_db]
pub struct StoredSequence {
    /// Primary key - table name.
    #[primary_key]
    pub name: String,
    /// Highest id issued so far.
    pub last: u64,
}
