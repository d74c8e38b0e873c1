//! # Bug
//!
//! The only record this service stores.
//!
//! ## Fields
//! - id: 24 hex chars, assigned on create
//! - title, description, reporter: required text
//! - assignee: optional text, omitted from the document when empty
//! - status: open, in-progress, resolved
//! - priority: low, medium, high, critical
//! - createdAt/updatedAt: UTC, `updatedAt >= createdAt`
use std::fmt::{self, Display};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const ID_LENGTH: usize = 24;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BugId(String);

impl BugId {
    pub fn parse(raw: &str) -> Option<Self> {
        is_hex_id(raw).then(|| Self(raw.to_ascii_lowercase()))
    }

    /// Creation seconds as 8 hex digits, then 16 random hex digits.
    pub fn generate(now: DateTime<Utc>) -> Self {
        let seconds = now.timestamp().clamp(0, u32::MAX as i64) as u32;

        Self(format!("{seconds:08x}{:016x}", rand::random::<u64>()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for BugId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Accepts any JSON value; only 24-char hex strings pass.
pub fn is_valid_id(candidate: &Value) -> bool {
    candidate.as_str().is_some_and(is_hex_id)
}

fn is_hex_id(raw: &str) -> bool {
    raw.len() == ID_LENGTH && raw.bytes().all(|b| b.is_ascii_hexdigit())
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    #[default]
    Open,
    InProgress,
    Resolved,
}

impl Status {
    pub const ALL: [Status; 3] = [Status::Open, Status::InProgress, Status::Resolved];

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Open => "open",
            Status::InProgress => "in-progress",
            Status::Resolved => "resolved",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == raw)
    }
}

/// Declared in severity order, which is also the sort order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Low,
        Priority::Medium,
        Priority::High,
        Priority::Critical,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|priority| priority.as_str() == raw)
    }
}

/// Writable fields after sanitizing and validating.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BugFields {
    pub title: String,
    pub description: String,
    pub status: Status,
    pub priority: Priority,
    pub assignee: Option<String>,
    pub reporter: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bug {
    pub id: BugId,
    pub title: String,
    pub description: String,
    pub status: Status,
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    pub reporter: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Bug {
    pub fn create(fields: BugFields, now: DateTime<Utc>) -> Self {
        Self {
            id: BugId::generate(now),
            title: fields.title,
            description: fields.description,
            status: fields.status,
            priority: fields.priority,
            assignee: fields.assignee,
            reporter: fields.reporter,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replaces every writable field; id and createdAt are kept.
    pub fn apply(&mut self, fields: BugFields, now: DateTime<Utc>) {
        self.title = fields.title;
        self.description = fields.description;
        self.status = fields.status;
        self.priority = fields.priority;
        self.assignee = fields.assignee;
        self.reporter = fields.reporter;
        self.touch(now);
    }

    /// Always moves `updated_at` forward, even when the clock has not.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now.max(self.updated_at + TimeDelta::nanoseconds(1));
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}
