//! HTTP front end for the habitforge tracker
//!
//! - `config`: RON configuration with defaults
//! - `router`: regex route table mapping paths to endpoints
//! - `api`: JSON handlers over a [`habitforge_core::Tracker`]
//! - `reminder`: background scan for habits still open today

pub mod api;
pub mod config;
pub mod reminder;
pub mod router;

pub use api::{dispatch, ApiError, AppState, Reply};
pub use config::{Config, ConfigError, DatabaseConfig, ReminderConfig, DEFAULT_CONFIG_PATH};
pub use router::{Endpoint, RouteError, RouteMatch, Router};
