//! # Rate Limiting
//!
//! Fixed window per client address, 100 requests per 15 minutes unless
//! `RATE_LIMIT_MAX` / `RATE_LIMIT_WINDOW_SECS` say otherwise. A budget of 0
//! turns the limit off.
//!
//! Requests without a peer address (in-process tests) share one window.
use std::{
    collections::HashMap,
    net::{IpAddr, SocketAddr},
    sync::Arc,
    time::Duration,
};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use tokio::{sync::Mutex, time::Instant};
use tracing::warn;

use crate::{error::AppError, state::AppState};

/// Above this many tracked clients, expired windows are dropped.
const SWEEP_THRESHOLD: usize = 1024;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

pub struct RateLimiter {
    window: Duration,
    max_requests: u32,
    clients: Mutex<HashMap<Option<IpAddr>, Window>>,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Counts one request. `Err` holds the time left in the client's window.
    pub async fn check(&self, client: Option<IpAddr>) -> Result<(), Duration> {
        if self.max_requests == 0 {
            return Ok(());
        }

        let now = Instant::now();
        let mut clients = self.clients.lock().await;

        if clients.len() > SWEEP_THRESHOLD {
            clients.retain(|_, window| now.duration_since(window.started) < self.window);
        }

        let window = clients.entry(client).or_insert(Window {
            started: now,
            count: 0,
        });

        if now.duration_since(window.started) >= self.window {
            *window = Window {
                started: now,
                count: 0,
            };
        }

        if window.count < self.max_requests {
            window.count += 1;
            Ok(())
        } else {
            Err(self.window.saturating_sub(now.duration_since(window.started)))
        }
    }
}

pub async fn rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(address)| address.ip());

    if let Err(wait) = state.limiter.check(client).await {
        warn!(
            client = client.map(|ip| ip.to_string()).unwrap_or_default(),
            "Rate limit exceeded"
        );
        return Err(AppError::RateLimited(wait));
    }

    Ok(next.run(request).await)
}
