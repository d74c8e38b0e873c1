//! Documentation of a small bug tracking backend.
//!
//! # API
//!
//! | Method | Path | Result |
//! |---|---|---|
//! | GET | `/api/bugs` | page of bugs + pagination |
//! | GET | `/api/bugs/stats` | counts by status and priority |
//! | GET | `/api/bugs/{id}` | one bug |
//! | POST | `/api/bugs` | created bug, 201 |
//! | PUT | `/api/bugs/{id}` | updated bug |
//! | PATCH | `/api/bugs/{id}/status` | bug with new status |
//! | DELETE | `/api/bugs/{id}` | deleted snapshot |
//! | GET | `/health` | liveness |
//!
//! Every `/api/bugs` response is an envelope:
//! `{ success, message?, data?, errors?, pagination? }`.
//!
//! ## Listing
//!
//! `GET /api/bugs?status=&priority=&assignee=&search=&page=&limit=&sortBy=&order=`
//!
//! - Pagination counts the filtered bugs, not the whole collection
//! - `limit` is capped at 100
//! - See [`query`] for the full rules
//!
//! ## Writes
//!
//! - Free text is sanitized ([`sanitize`]) and then validated ([`validation`])
//! - All field errors come back together as `errors: [{ field, message }]`
//! - Updates merge the body over the stored bug and validate the result
//!
//!
//!
//! # Errors
//!
//! - 400: validation failed, bad id, body not a JSON object
//! - 404: no bug with that id
//! - 409: the bug changed between reading and writing an update, retry it
//! - 413: body over 10 MiB
//! - 429: client used up its request budget, see `Retry-After`
//! - 500: store failure, detail only echoed with the `verbose` feature
//!
//!
//!
//! # Setup
//!
//! | Variable | Default |
//! |---|---|
//! | `RUST_PORT` | `1111` |
//! | `REDIS_URL` | `redis://127.0.0.1:6379` |
//! | `BUGS_STORE` | `redis` (or `memory`) |
//! | `BUGS_KEY` | `bugs` |
//! | `RATE_LIMIT_MAX` | `100` requests per client, `0` turns it off |
//! | `RATE_LIMIT_WINDOW_SECS` | `900` |
//! | `RUST_LOG` | tracing filter, e.g. `info` |
//!
//! Run against a local Redis.
//! ```sh
//! RUST_LOG=info cargo run -p bugs
//! ```
//!
//! Run without Redis, nothing is kept across restarts.
//! ```sh
//! BUGS_STORE=memory RUST_LOG=info cargo run -p bugs
//! ```
//!
//! View current docs.
//! ```sh
//! cargo doc --open
//! ```
use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{Method, header::CONTENT_TYPE},
    middleware,
    routing::{get, patch},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

pub mod config;
pub mod database;
pub mod error;
pub mod memory;
pub mod models;
pub mod query;
pub mod rate_limit;
pub mod routes;
pub mod sanitize;
pub mod state;
pub mod stats;
pub mod utils;
pub mod validation;

use rate_limit::rate_limit;
use routes::{
    create_handler, delete_handler, get_handler, health_handler, list_handler, stats_handler,
    status_handler, update_handler,
};
use state::AppState;

pub const BODY_LIMIT: usize = 10 * 1024 * 1024;

pub async fn start_server() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = AppState::load().await?;

    info!("Starting server...");

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!("Server running on {address}");

    let service = app(state).into_make_service_with_connect_info::<SocketAddr>();

    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down");

    Ok(())
}

pub fn app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/api/bugs", get(list_handler).post(create_handler))
        .route("/api/bugs/stats", get(stats_handler))
        .route(
            "/api/bugs/{id}",
            get(get_handler).put(update_handler).delete(delete_handler),
        )
        .route("/api/bugs/{id}/status", patch(status_handler))
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to listen for Ctrl+C: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
