//! API key management for the external chat endpoint
//!
//! Keys are `ak_` followed by 26 lowercase alphanumerics.

use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use sdk::errors::EngineError;
use sdk::types::ApiKey;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::info;

use super::messages::{millis_to_datetime, persistence};

const KEY_PREFIX: &str = "ak_";
const KEY_RANDOM_LEN: usize = 26;

/// API key repository for database operations
#[derive(Clone)]
pub struct ApiKeyRepository {
    pool: SqlitePool,
}

impl ApiKeyRepository {
    /// Create a new API key repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Issue a new key under `name`
    pub async fn create(&self, name: &str) -> Result<ApiKey, EngineError> {
        let key = generate_key();
        let now = Utc::now().timestamp_millis();

        let row = sqlx::query(
            "INSERT INTO api_keys (key, name, created_at) VALUES (?, ?, ?) \
             RETURNING id, key, name, created_at",
        )
        .bind(&key)
        .bind(name)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(persistence("create API key"))?;

        let api_key = key_from_row(&row)?;
        info!(id = api_key.id, name = %api_key.name, "Created API key");
        Ok(api_key)
    }

    /// Look up a key by its secret value
    pub async fn find_by_key(&self, key: &str) -> Result<Option<ApiKey>, EngineError> {
        let row = sqlx::query("SELECT id, key, name, created_at FROM api_keys WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(persistence("look up API key"))?;

        row.as_ref().map(key_from_row).transpose()
    }

    /// All keys, newest first
    pub async fn list(&self) -> Result<Vec<ApiKey>, EngineError> {
        let rows = sqlx::query("SELECT id, key, name, created_at FROM api_keys ORDER BY id DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(persistence("list API keys"))?;

        rows.iter().map(key_from_row).collect()
    }

    /// Revoke a key. Returns whether a row was removed.
    pub async fn delete(&self, id: i64) -> Result<bool, EngineError> {
        let result = sqlx::query("DELETE FROM api_keys WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(persistence("delete API key"))?;

        let removed = result.rows_affected() > 0;
        if removed {
            info!(id, "Revoked API key");
        }
        Ok(removed)
    }
}

fn generate_key() -> String {
    let random: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(KEY_RANDOM_LEN)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("{}{}", KEY_PREFIX, random)
}

fn key_from_row(row: &SqliteRow) -> Result<ApiKey, EngineError> {
    let millis: i64 = row
        .try_get("created_at")
        .map_err(persistence("decode created_at"))?;

    Ok(ApiKey {
        id: row.try_get("id").map_err(persistence("decode id"))?,
        key: row.try_get("key").map_err(persistence("decode key"))?,
        name: row.try_get("name").map_err(persistence("decode name"))?,
        created_at: millis_to_datetime(millis)?,
    })
}
