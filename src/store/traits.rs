//! Repository traits for sessions and the message log.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::session::model::{Session, SessionPatch};

/// Direction of a logged message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inbound" => Ok(Self::Inbound),
            "outbound" => Ok(Self::Outbound),
            other => Err(format!("unknown direction '{other}'")),
        }
    }
}

/// One entry of the append-only message log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: Uuid,
    pub sender_id: String,
    pub direction: Direction,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Durable, externally shared session store keyed by sender id.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Return the existing session or create one at the welcome step.
    ///
    /// Repeated calls for the same sender never create duplicates.
    async fn get_or_create(&self, sender_id: &str) -> Result<Session, DatabaseError>;

    /// Look up a session without creating it.
    async fn get(&self, sender_id: &str) -> Result<Option<Session>, DatabaseError>;

    /// Merge the set fields of `patch` into the stored session and refresh
    /// `updated_at`.
    async fn update(&self, sender_id: &str, patch: &SessionPatch) -> Result<(), DatabaseError>;
}

/// Append-only audit sink for inbound and outbound text.
#[async_trait]
pub trait MessageLog: Send + Sync {
    async fn append_log(
        &self,
        sender_id: &str,
        direction: Direction,
        text: &str,
        meta: Option<&serde_json::Value>,
    ) -> Result<(), DatabaseError>;

    /// Most recent entries for a sender, newest first.
    async fn recent_log(&self, sender_id: &str, limit: usize)
    -> Result<Vec<LogEntry>, DatabaseError>;
}
