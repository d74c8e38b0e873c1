//! # Redis
//!
//! Document store for bugs.
//!
//! ## Layout
//!
//! - One Redis hash, key from `BUGS_KEY` (default `bugs`)
//! - Field: the 24 hex char bug id
//! - Value: the bug as a JSON document
//!
//! ## Atomicity
//!
//! - Insert is `HSETNX`, a colliding id is never overwritten
//! - Replace and delete are Lua scripts, so the check and the write happen
//!   as one Redis operation
//! - Replace only lands when the stored `updatedAt` is still the one the
//!   caller read, so two edits racing on one bug cannot overwrite each other
//! - Listing loads the hash and runs the query in process, which is fine
//!   for the size of a bug tracker
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::{
    AsyncCommands, Client, RedisError, Script,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use thiserror::Error;
use tracing::info;

use crate::{
    models::{Bug, BugId},
    query::BugQuery,
};

const REPLACE_IF_UNCHANGED: &str = r"
local stored = redis.call('HGET', KEYS[1], ARGV[1])
if not stored then
    return 0
end
if cjson.decode(stored).updatedAt ~= ARGV[3] then
    return 2
end
redis.call('HSET', KEYS[1], ARGV[1], ARGV[2])
return 1
";

const TAKE: &str = r"
local document = redis.call('HGET', KEYS[1], ARGV[1])
if document then
    redis.call('HDEL', KEYS[1], ARGV[1])
end
return document
";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] RedisError),

    #[error("Corrupt bug document: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Duplicate bug id {0}")]
    Duplicate(BugId),
}

/// Outcome of a conditional replace.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Replace {
    Replaced,
    Missing,
    /// Someone else updated the bug after it was read.
    Stale,
}

/// Persistence for bugs. Each method is one atomic store operation.
#[async_trait]
pub trait BugStore: Send + Sync {
    async fn insert(&self, bug: &Bug) -> Result<(), StoreError>;

    async fn get(&self, id: &BugId) -> Result<Option<Bug>, StoreError>;

    /// One page of matches plus the number of bugs matching the filter.
    async fn find(&self, query: &BugQuery) -> Result<(Vec<Bug>, u64), StoreError>;

    async fn all(&self) -> Result<Vec<Bug>, StoreError>;

    /// Writes `bug` only if the stored copy still has `read_at` as its
    /// `updatedAt`.
    async fn replace(&self, bug: &Bug, read_at: DateTime<Utc>) -> Result<Replace, StoreError>;

    /// Returns the removed bug.
    async fn delete(&self, id: &BugId) -> Result<Option<Bug>, StoreError>;
}

pub struct RedisStore {
    connection: ConnectionManager,
    key: String,
}

impl RedisStore {
    pub async fn connect(redis_url: &str, key: &str) -> Result<Self, StoreError> {
        let config = ConnectionManagerConfig::new()
            .set_number_of_retries(1)
            .set_connection_timeout(Duration::from_millis(100));

        let client = Client::open(redis_url)?;
        let connection = client.get_connection_manager_with_config(config).await?;

        info!("Connected to Redis, storing bugs under {key}");

        Ok(Self {
            connection,
            key: key.to_string(),
        })
    }
}

#[async_trait]
impl BugStore for RedisStore {
    async fn insert(&self, bug: &Bug) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        let document = serde_json::to_string(bug)?;

        let inserted: bool = connection
            .hset_nx(&self.key, bug.id.as_str(), document)
            .await?;

        if inserted {
            Ok(())
        } else {
            Err(StoreError::Duplicate(bug.id.clone()))
        }
    }

    async fn get(&self, id: &BugId) -> Result<Option<Bug>, StoreError> {
        let mut connection = self.connection.clone();
        let document: Option<String> = connection.hget(&self.key, id.as_str()).await?;

        document.as_deref().map(decode).transpose()
    }

    async fn find(&self, query: &BugQuery) -> Result<(Vec<Bug>, u64), StoreError> {
        Ok(query.select(self.all().await?))
    }

    async fn all(&self) -> Result<Vec<Bug>, StoreError> {
        let mut connection = self.connection.clone();
        let documents: Vec<String> = connection.hvals(&self.key).await?;

        documents.iter().map(|document| decode(document)).collect()
    }

    async fn replace(&self, bug: &Bug, read_at: DateTime<Utc>) -> Result<Replace, StoreError> {
        let mut connection = self.connection.clone();
        let document = serde_json::to_string(bug)?;
        // Same text the stored document carries for updatedAt.
        let read_at = serde_json::to_value(read_at)?;

        let outcome: i64 = Script::new(REPLACE_IF_UNCHANGED)
            .key(&self.key)
            .arg(bug.id.as_str())
            .arg(document)
            .arg(read_at.as_str().unwrap_or_default())
            .invoke_async(&mut connection)
            .await?;

        Ok(match outcome {
            1 => Replace::Replaced,
            2 => Replace::Stale,
            _ => Replace::Missing,
        })
    }

    async fn delete(&self, id: &BugId) -> Result<Option<Bug>, StoreError> {
        let mut connection = self.connection.clone();

        let document: Option<String> = Script::new(TAKE)
            .key(&self.key)
            .arg(id.as_str())
            .invoke_async(&mut connection)
            .await?;

        document.as_deref().map(decode).transpose()
    }
}

fn decode(document: &str) -> Result<Bug, StoreError> {
    Ok(serde_json::from_str(document)?)
}
