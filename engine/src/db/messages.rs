//! Conversation log persistence
//!
//! The log is append-only; rows leave it only through `clear_all`.
//! All queries use parameterized queries for SQL injection prevention.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sdk::errors::EngineError;
use sdk::types::{ChatTurn, Role};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

/// Durable, ordered log of chat turns.
///
/// Implementations must make a turn durable before `append` returns and must
/// never hand out a timestamp older than the newest stored turn.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Store one turn and return it with its assigned id and timestamp.
    async fn append(&self, role: Role, content: &str) -> Result<ChatTurn, EngineError>;

    /// Up to `limit` turns, newest first.
    async fn recent(&self, limit: usize) -> Result<Vec<ChatTurn>, EngineError>;

    /// Remove every turn. Clearing an empty log succeeds.
    async fn clear_all(&self) -> Result<(), EngineError>;
}

/// SQLite-backed conversation log
#[derive(Clone)]
pub struct MessageRepository {
    pool: SqlitePool,
}

impl MessageRepository {
    /// Create a new message repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Total number of stored turns
    pub async fn count(&self) -> Result<i64, EngineError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM messages")
            .fetch_one(&self.pool)
            .await
            .map_err(persistence("count messages"))
    }
}

#[async_trait]
impl ConversationStore for MessageRepository {
    async fn append(&self, role: Role, content: &str) -> Result<ChatTurn, EngineError> {
        let now = Utc::now().timestamp_millis();

        // The stored timestamp never goes behind the newest row, so ordering
        // by (timestamp, id) matches insertion order even if the clock steps back.
        let row = sqlx::query(
            "INSERT INTO messages (role, content, timestamp) \
             VALUES (?, ?, MAX(?, COALESCE((SELECT MAX(timestamp) FROM messages), 0))) \
             RETURNING id, role, content, timestamp",
        )
        .bind(role.as_str())
        .bind(content)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(persistence("append message"))?;

        let turn = turn_from_row(&row)?;
        debug!(id = turn.id, role = %turn.role, "Stored chat turn");
        Ok(turn)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<ChatTurn>, EngineError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let rows = sqlx::query(
            "SELECT id, role, content, timestamp FROM messages \
             ORDER BY timestamp DESC, id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(persistence("fetch recent messages"))?;

        rows.iter().map(turn_from_row).collect()
    }

    async fn clear_all(&self) -> Result<(), EngineError> {
        let result = sqlx::query("DELETE FROM messages")
            .execute(&self.pool)
            .await
            .map_err(persistence("clear messages"))?;

        debug!(removed = result.rows_affected(), "Cleared conversation log");
        Ok(())
    }
}

fn turn_from_row(row: &SqliteRow) -> Result<ChatTurn, EngineError> {
    let role: String = row.try_get("role").map_err(persistence("decode role"))?;
    let millis: i64 = row
        .try_get("timestamp")
        .map_err(persistence("decode timestamp"))?;

    Ok(ChatTurn {
        id: row.try_get("id").map_err(persistence("decode id"))?,
        role: role.parse().map_err(EngineError::Persistence)?,
        content: row.try_get("content").map_err(persistence("decode content"))?,
        timestamp: millis_to_datetime(millis)?,
    })
}

pub(crate) fn millis_to_datetime(millis: i64) -> Result<DateTime<Utc>, EngineError> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| EngineError::Persistence(format!("Timestamp out of range: {}", millis)))
}

pub(crate) fn persistence(action: &'static str) -> impl Fn(sqlx::Error) -> EngineError {
    move |e| EngineError::Persistence(format!("Failed to {}: {}", action, e))
}
