//! Request router with regex route matching

use habitforge_core::{HabitId, UserId};
use hyper::Method;
use regex::Regex;
use thiserror::Error;

/// Operation a request maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Health,
    RegisterUser,
    User,
    UserStats,
    ListHabits,
    CreateHabit,
    TodaysHabits,
    Habit,
    UpdateHabit,
    DeleteHabit,
    TogglePause,
    CompleteHabit,
    HabitHistory,
    Achievements,
    AchievementProgress,
    UpcomingAchievements,
    CheckAchievements,
    AchievementCatalog,
    Achievement,
    Analytics,
    Report,
    UnlockTheme,
}

/// Compiled route with its method and anchored pattern
#[derive(Debug, Clone)]
pub struct CompiledRoute {
    pub method: Method,
    pub regex: Regex,
    pub endpoint: Endpoint,
}

impl CompiledRoute {
    /// Compile a route pattern.
    ///
    /// `{uid}` and `{hid}` match numeric ids, `{name}` matches one path segment.
    pub fn compile(method: Method, pattern: &str, endpoint: Endpoint) -> Result<Self, regex::Error> {
        let expanded = pattern
            .replace("{uid}", r"(?P<uid>\d+)")
            .replace("{hid}", r"(?P<hid>\d+)")
            .replace("{name}", r"(?P<name>[A-Za-z0-9_\-]+)");
        Ok(Self {
            method,
            regex: Regex::new(&format!("^{}/?$", expanded))?,
            endpoint,
        })
    }

    /// Captures when this route's pattern matches `path`
    pub fn matches(&self, path: &str) -> Option<RouteMatch> {
        let captures = self.regex.captures(path)?;
        let id = |group: &str| captures.name(group).and_then(|m| m.as_str().parse::<u64>().ok());
        Some(RouteMatch {
            endpoint: self.endpoint,
            user: id("uid").map(UserId::new),
            habit: id("hid").map(HabitId::new),
            name: captures.name("name").map(|m| m.as_str().to_string()),
        })
    }
}

/// Result of routing a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    pub endpoint: Endpoint,
    pub user: Option<UserId>,
    pub habit: Option<HabitId>,
    /// Trailing name segment (analytics kind, report period, theme)
    pub name: Option<String>,
}

/// Routing failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("no route for {0}")]
    NotFound(String),
    #[error("method {method} not allowed on {path}")]
    MethodNotAllowed { method: Method, path: String },
}

/// Router for matching requests to endpoints
pub struct Router {
    routes: Vec<CompiledRoute>,
}

static ROUTES: &[(Method, &str, Endpoint)] = &[
    (Method::GET, "/health", Endpoint::Health),
    (Method::POST, "/api/users", Endpoint::RegisterUser),
    (Method::GET, "/api/achievements", Endpoint::AchievementCatalog),
    (Method::GET, "/api/achievements/{name}", Endpoint::Achievement),
    (Method::GET, "/api/users/{uid}", Endpoint::User),
    (Method::GET, "/api/users/{uid}/stats", Endpoint::UserStats),
    (Method::GET, "/api/users/{uid}/habits", Endpoint::ListHabits),
    (Method::POST, "/api/users/{uid}/habits", Endpoint::CreateHabit),
    (Method::GET, "/api/users/{uid}/habits/today", Endpoint::TodaysHabits),
    (Method::GET, "/api/users/{uid}/habits/{hid}", Endpoint::Habit),
    (Method::PATCH, "/api/users/{uid}/habits/{hid}", Endpoint::UpdateHabit),
    (Method::DELETE, "/api/users/{uid}/habits/{hid}", Endpoint::DeleteHabit),
    (Method::POST, "/api/users/{uid}/habits/{hid}/pause", Endpoint::TogglePause),
    (Method::POST, "/api/users/{uid}/habits/{hid}/complete", Endpoint::CompleteHabit),
    (Method::GET, "/api/users/{uid}/habits/{hid}/history", Endpoint::HabitHistory),
    (Method::GET, "/api/users/{uid}/achievements", Endpoint::Achievements),
    (Method::GET, "/api/users/{uid}/achievements/progress", Endpoint::AchievementProgress),
    (Method::GET, "/api/users/{uid}/achievements/upcoming", Endpoint::UpcomingAchievements),
    (Method::POST, "/api/users/{uid}/achievements/check", Endpoint::CheckAchievements),
    (Method::GET, "/api/users/{uid}/analytics/{name}", Endpoint::Analytics),
    (Method::GET, "/api/users/{uid}/reports/{name}", Endpoint::Report),
    (Method::POST, "/api/users/{uid}/themes/{name}/unlock", Endpoint::UnlockTheme),
];

impl Router {
    /// Build the API route table
    pub fn new() -> Result<Self, regex::Error> {
        let routes = ROUTES
            .iter()
            .map(|(method, pattern, endpoint)| CompiledRoute::compile(method.clone(), pattern, *endpoint))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { routes })
    }

    /// Match a request to an endpoint
    ///
    /// A path that exists under another method yields `MethodNotAllowed`.
    pub fn route(&self, method: &Method, path: &str) -> Result<RouteMatch, RouteError> {
        let mut path_known = false;
        for route in &self.routes {
            if let Some(found) = route.matches(path) {
                if route.method == *method {
                    return Ok(found);
                }
                path_known = true;
            }
        }
        if path_known {
            Err(RouteError::MethodNotAllowed {
                method: method.clone(),
                path: path.to_string(),
            })
        } else {
            Err(RouteError::NotFound(path.to_string()))
        }
    }
}
