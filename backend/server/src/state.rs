use std::{sync::Arc, time::Duration};

use anyhow::Result;

use super::{
    config::{Config, StoreKind},
    database::{BugStore, RedisStore},
    memory::MemoryStore,
    rate_limit::RateLimiter,
};

/// Shared by every handler through axum state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn BugStore>,
    pub limiter: RateLimiter,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn BugStore>) -> Arc<Self> {
        let limiter = RateLimiter::new(
            Duration::from_secs(config.rate_limit_window_secs),
            config.rate_limit_max,
        );

        Arc::new(Self {
            config,
            store,
            limiter,
        })
    }

    /// Fails when Redis is unreachable; the server does not start without it.
    pub async fn load() -> Result<Arc<Self>> {
        let config = Config::load()?;

        let store: Arc<dyn BugStore> = match config.store {
            StoreKind::Redis => Arc::new(RedisStore::connect(&config.redis_url, &config.bugs_key).await?),
            StoreKind::Memory => Arc::new(MemoryStore::new()),
        };

        Ok(Self::new(config, store))
    }
}
