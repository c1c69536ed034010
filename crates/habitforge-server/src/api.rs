//! JSON API: maps routed requests onto tracker operations
//!
//! Handlers are synchronous; each one is a single short store transaction.

use crate::router::{Endpoint, RouteError, RouteMatch, Router};
use chrono::{DateTime, Utc};
use habitforge_core::time::day_key;
use habitforge_core::{HabitFilter, HabitId, HabitPatch, NewHabit, NewUser, ReportSpan, Tracker, UserId};
use habitforge_db::{NativeStore, TableCounts};
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, warn};

/// HTTP response type used throughout the server
pub type Reply = Response<Full<Bytes>>;

/// Server state shared across all connections
pub struct AppState {
    pub tracker: Tracker<NativeStore>,
    router: Router,
}

impl AppState {
    pub fn new(store: NativeStore) -> Result<Self, regex::Error> {
        Ok(Self {
            tracker: Tracker::new(store),
            router: Router::new()?,
        })
    }
}

/// Request failure, rendered as a JSON error body
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] habitforge_core::Error),
    #[error(transparent)]
    Route(#[from] RouteError),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Encoding error: {0}")]
    Encode(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<habitforge_db::Error> for ApiError {
    fn from(err: habitforge_db::Error) -> Self {
        ApiError::Core(err.into())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        use habitforge_core::Error as E;
        match self {
            ApiError::Core(E::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Core(E::AlreadyCompleted { .. }) => StatusCode::CONFLICT,
            ApiError::Core(E::Validation(_)) => StatusCode::BAD_REQUEST,
            ApiError::Core(E::LevelRequired { .. }) => StatusCode::FORBIDDEN,
            ApiError::Core(E::Storage(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Route(RouteError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Route(RouteError::MethodNotAllowed { .. }) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Encode(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    status: u16,
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    tables: TableCounts,
    completions_today: usize,
}

#[derive(Debug, Serialize)]
struct Deleted {
    deleted: HabitId,
    completions_removed: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CompleteRequest {
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HabitsQuery {
    filter: Option<String>,
    category: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DaysQuery {
    days: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct LimitQuery {
    limit: Option<usize>,
}

/// Serialize `value` into a JSON response
pub fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Reply {
    match serde_json::to_vec(value) {
        Ok(body) => with_json_body(status, body),
        Err(e) => error_response(&ApiError::Encode(e.to_string())),
    }
}

/// Render an error as `{"error": ..., "status": ...}`
///
/// Server-side failures are logged and answered with a generic message.
pub fn error_response(err: &ApiError) -> Reply {
    let status = err.status();
    let message = if status.is_server_error() {
        error!(error = %err, "request failed");
        "internal server error".to_string()
    } else {
        err.to_string()
    };
    let body = ErrorBody {
        error: &message,
        status: status.as_u16(),
    };
    let bytes = serde_json::to_vec(&body).unwrap_or_else(|_| b"{\"error\":\"internal server error\"}".to_vec());
    with_json_body(status, bytes)
}

fn with_json_body(status: StatusCode, body: Vec<u8>) -> Reply {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// Handle one request. Never fails; errors become JSON error responses.
pub fn dispatch(
    state: &AppState,
    method: &Method,
    path: &str,
    query: Option<&str>,
    body: &[u8],
    now: DateTime<Utc>,
) -> Reply {
    let response = match handle(state, method, path, query, body, now) {
        Ok(response) => response,
        Err(err) => {
            if err.status().is_client_error() {
                warn!(%method, path, error = %err, "request rejected");
            }
            error_response(&err)
        }
    };
    debug!(%method, path, status = response.status().as_u16(), "request handled");
    response
}

fn handle(
    state: &AppState,
    method: &Method,
    path: &str,
    query: Option<&str>,
    body: &[u8],
    now: DateTime<Utc>,
) -> Result<Reply, ApiError> {
    let route = state.router.route(method, path)?;
    let tracker = &state.tracker;

    match route.endpoint {
        Endpoint::Health => ok(&Health {
            status: "ok",
            tables: tracker.store().counts()?,
            completions_today: tracker.store().completions_on(&day_key(now))?,
        }),
        Endpoint::AchievementCatalog => ok(&tracker.achievement_catalog()),
        Endpoint::Achievement => ok(&tracker.achievement_def(name_of(&route)?)?),
        Endpoint::RegisterUser => {
            let new: NewUser = json(body)?;
            created(&tracker.register_user(new, now)?)
        }
        Endpoint::User => ok(&tracker.user(user_of(&route)?)?),
        Endpoint::UserStats => ok(&tracker.user_stats(user_of(&route)?)?),
        Endpoint::ListHabits => {
            let q: HabitsQuery = parse_query(query)?;
            let filter = match q.filter.as_deref() {
                Some(f) => f.parse::<HabitFilter>()?,
                None => HabitFilter::All,
            };
            ok(&tracker.habits(user_of(&route)?, filter, q.category.as_deref(), now)?)
        }
        Endpoint::CreateHabit => {
            let new: NewHabit = json(body)?;
            created(&tracker.create_habit(user_of(&route)?, new, now)?)
        }
        Endpoint::TodaysHabits => ok(&tracker.todays_habits(user_of(&route)?, now)?),
        Endpoint::Habit => {
            let (user, habit) = habit_of(&route)?;
            ok(&tracker.habit(user, habit, now)?)
        }
        Endpoint::UpdateHabit => {
            let (user, habit) = habit_of(&route)?;
            let patch: HabitPatch = json(body)?;
            ok(&tracker.update_habit(user, habit, patch, now)?)
        }
        Endpoint::DeleteHabit => {
            let (user, habit) = habit_of(&route)?;
            let completions_removed = tracker.delete_habit(user, habit)?;
            ok(&Deleted {
                deleted: habit,
                completions_removed,
            })
        }
        Endpoint::TogglePause => {
            let (user, habit) = habit_of(&route)?;
            ok(&tracker.toggle_pause(user, habit, now)?)
        }
        Endpoint::CompleteHabit => {
            let (user, habit) = habit_of(&route)?;
            let request: CompleteRequest = json_or_default(body)?;
            ok(&tracker.complete_habit(user, habit, request.notes, now)?)
        }
        Endpoint::HabitHistory => {
            let (user, habit) = habit_of(&route)?;
            let q: DaysQuery = parse_query(query)?;
            ok(&tracker.habit_history(user, habit, q.days, now)?)
        }
        Endpoint::Achievements => ok(&tracker.achievements(user_of(&route)?)?),
        Endpoint::AchievementProgress => ok(&tracker.achievement_progress(user_of(&route)?)?),
        Endpoint::UpcomingAchievements => ok(&tracker.upcoming_achievements(user_of(&route)?)?),
        Endpoint::CheckAchievements => ok(&tracker.check_achievements(user_of(&route)?, now)?),
        Endpoint::Analytics => analytics(tracker, &route, path, query, now),
        Endpoint::Report => {
            let span: ReportSpan = name_of(&route)?.parse()?;
            ok(&tracker.summary(user_of(&route)?, span, now)?)
        }
        Endpoint::UnlockTheme => ok(&tracker.unlock_theme(user_of(&route)?, name_of(&route)?)?),
    }
}

fn analytics(
    tracker: &Tracker<NativeStore>,
    route: &RouteMatch,
    path: &str,
    query: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Reply, ApiError> {
    let user = user_of(route)?;
    match name_of(route)? {
        "completions" => {
            let q: DaysQuery = parse_query(query)?;
            ok(&tracker.completion_stats(user, q.days, now)?)
        }
        "categories" => ok(&tracker.category_stats(user)?),
        "streaks" => ok(&tracker.streak_stats(user)?),
        "time-of-day" => ok(&tracker.time_of_day_stats(user)?),
        "weekly" => ok(&tracker.weekly_stats(user, now)?),
        "best" => {
            let q: LimitQuery = parse_query(query)?;
            ok(&tracker.best_habits(user, q.limit)?)
        }
        _ => Err(RouteError::NotFound(path.to_string()).into()),
    }
}

fn ok<T: Serialize>(value: &T) -> Result<Reply, ApiError> {
    Ok(json_response(StatusCode::OK, value))
}

fn created<T: Serialize>(value: &T) -> Result<Reply, ApiError> {
    Ok(json_response(StatusCode::CREATED, value))
}

fn user_of(route: &RouteMatch) -> Result<UserId, ApiError> {
    route
        .user
        .ok_or_else(|| habitforge_core::Error::not_found("user").into())
}

fn habit_of(route: &RouteMatch) -> Result<(UserId, HabitId), ApiError> {
    let habit = route
        .habit
        .ok_or_else(|| ApiError::from(habitforge_core::Error::not_found("habit")))?;
    Ok((user_of(route)?, habit))
}

fn name_of(route: &RouteMatch) -> Result<&str, ApiError> {
    route
        .name
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest("missing path segment".to_string()))
}

fn json<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {}", e)))
}

fn json_or_default<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        Ok(T::default())
    } else {
        json(body)
    }
}

fn parse_query<T: DeserializeOwned>(query: Option<&str>) -> Result<T, ApiError> {
    serde_urlencoded::from_str(query.unwrap_or(""))
        .map_err(|e| ApiError::BadRequest(format!("invalid query string: {}", e)))
}
