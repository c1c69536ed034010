//! habitforge server binary
//!
//! Usage: `habitforge [config.ron]`. A missing config file means defaults;
//! `RUST_LOG` overrides the configured log filter.

use chrono::Utc;
use habitforge_db::NativeStore;
use habitforge_server::api::{self, ApiError, AppState, Reply};
use habitforge_server::config::{Config, DEFAULT_CONFIG_PATH};
use habitforge_server::reminder;
use http_body_util::{BodyExt, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Largest request body accepted, in bytes
const MAX_BODY_BYTES: usize = 64 * 1024;

async fn handle_request(
    state: Arc<AppState>,
    remote_addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Reply, Infallible> {
    let (parts, body) = req.into_parts();
    debug!(remote = %remote_addr, method = %parts.method, uri = %parts.uri, "request received");

    let body = match Limited::new(body, MAX_BODY_BYTES).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(remote = %remote_addr, error = %e, "request body rejected");
            let mut response = api::error_response(&ApiError::BadRequest(format!(
                "request body exceeds {} bytes or could not be read",
                MAX_BODY_BYTES
            )));
            *response.status_mut() = StatusCode::PAYLOAD_TOO_LARGE;
            return Ok(response);
        }
    };

    // native_db transactions block; keep them off the async workers
    let response = tokio::task::spawn_blocking(move || {
        api::dispatch(
            &state,
            &parts.method,
            parts.uri.path(),
            parts.uri.query(),
            &body,
            Utc::now(),
        )
    })
    .await;

    Ok(response.unwrap_or_else(|e| api::error_response(&ApiError::Internal(e.to_string()))))
}

fn open_store(config: &Config) -> habitforge_db::Result<NativeStore> {
    match &config.database.path {
        Some(path) => NativeStore::open(path),
        None => {
            warn!("no database path configured, data will not survive a restart");
            NativeStore::in_memory()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load_or_default(&config_path)?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter)))
        .with(fmt::layer())
        .init();
    info!(config = %config_path, "configuration loaded");

    let store = open_store(&config)?;
    let state = Arc::new(AppState::new(store)?);
    info!(tables = ?state.tracker.store().counts()?, "store ready");

    let _reminders = reminder::spawn(state.clone(), &config.reminders);

    let addr = config.listen_addr()?;
    let listener = TcpListener::bind(addr).await?;
    info!("listening on http://{}", addr);

    loop {
        let (stream, remote_addr) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    error!(error = %e, "accept failed");
                    continue;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
        };

        let state = state.clone();
        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            let service = service_fn(move |req| {
                let state = state.clone();
                async move { handle_request(state, remote_addr, req).await }
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                debug!(remote = %remote_addr, error = %e, "connection closed with error");
            }
        });
    }

    Ok(())
}
