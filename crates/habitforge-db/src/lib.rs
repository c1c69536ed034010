//! Habitforge DB - native_db storage backend
//!
//! Provides persistent storage for:
//! - Users, unique by identity provider subject
//! - Habits, indexed by owner
//! - Completions, unique per habit and period
//! - Achievement unlocks, unique per user and achievement
//!
//! `NativeStore` implements `habitforge_core::Store`; every `write` is one
//! native_db read-write transaction.

mod error;
mod models;
mod queries;
mod store;

pub use error::{Error, Result};
pub use queries::TableCounts;
pub use store::NativeStore;
