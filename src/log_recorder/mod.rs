//! LogRecorder - Event log persistence
//!
//! ## Responsibilities
//!
//! - Append timestamped event records, optionally linked to a spot
//! - List entries newest first
//! - CRUD for operator-entered entries
//! - Clear everything on full system reset

mod types;

pub use types::*;

use crate::error::{Error, Result};
use chrono::Utc;
use sqlx::SqlitePool;

/// LogRecorder instance
#[derive(Clone)]
pub struct LogRecorder {
    pool: SqlitePool,
}

impl LogRecorder {
    const LOG_COLUMNS: &'static str = "id, timestamp, type, message, spot_id";

    /// Create new LogRecorder
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append an entry stamped with the current time
    pub async fn append(
        &self,
        entry_type: &str,
        message: &str,
        spot_id: Option<&str>,
    ) -> Result<LogEntry> {
        let entry = self
            .insert(Utc::now(), entry_type, message, spot_id)
            .await?;

        tracing::debug!(
            log_id = entry.id,
            entry_type = %entry.entry_type,
            spot_id = ?entry.spot_id,
            "Log entry appended"
        );

        Ok(entry)
    }

    /// All entries, newest first
    pub async fn list_recent(&self) -> Result<Vec<LogEntry>> {
        let query = format!(
            "SELECT {} FROM log_entries ORDER BY timestamp DESC, id DESC",
            Self::LOG_COLUMNS
        );
        let entries = sqlx::query_as::<_, LogEntry>(&query)
            .fetch_all(&self.pool)
            .await?;

        Ok(entries)
    }

    /// Get entry by id
    pub async fn get(&self, id: i64) -> Result<Option<LogEntry>> {
        let query = format!("SELECT {} FROM log_entries WHERE id = ?", Self::LOG_COLUMNS);
        let entry = sqlx::query_as::<_, LogEntry>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(entry)
    }

    /// Create an entry from an API request
    pub async fn create(&self, req: CreateLogRequest) -> Result<LogEntry> {
        validate_type(&req.entry_type)?;
        if let Some(ref spot_id) = req.spot_id {
            self.ensure_spot_exists(spot_id).await?;
        }

        self.insert(
            req.timestamp.unwrap_or_else(Utc::now),
            &req.entry_type,
            &req.message,
            req.spot_id.as_deref(),
        )
        .await
    }

    /// Replace every field of an entry; an omitted timestamp keeps the old one
    pub async fn replace(&self, id: i64, req: CreateLogRequest) -> Result<LogEntry> {
        let current = self
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Log entry {} not found", id)))?;

        validate_type(&req.entry_type)?;
        if let Some(ref spot_id) = req.spot_id {
            self.ensure_spot_exists(spot_id).await?;
        }

        let entry = LogEntry {
            id,
            timestamp: req.timestamp.unwrap_or(current.timestamp),
            entry_type: req.entry_type,
            message: req.message,
            spot_id: req.spot_id,
        };
        self.store(&entry).await?;

        Ok(entry)
    }

    /// Partially update an entry
    pub async fn update(&self, id: i64, req: UpdateLogRequest) -> Result<LogEntry> {
        let mut entry = self
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Log entry {} not found", id)))?;

        if let Some(timestamp) = req.timestamp {
            entry.timestamp = timestamp;
        }
        if let Some(entry_type) = req.entry_type {
            validate_type(&entry_type)?;
            entry.entry_type = entry_type;
        }
        if let Some(message) = req.message {
            entry.message = message;
        }
        if let Some(spot_id) = req.spot_id {
            self.ensure_spot_exists(&spot_id).await?;
            entry.spot_id = Some(spot_id);
        }

        self.store(&entry).await?;

        Ok(entry)
    }

    /// Delete an entry
    pub async fn delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM log_entries WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Log entry {} not found", id)));
        }
        Ok(())
    }

    /// Delete every entry
    pub async fn clear_all(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM log_entries")
            .execute(&self.pool)
            .await?;

        tracing::info!(deleted = result.rows_affected(), "Log entries cleared");
        Ok(result.rows_affected())
    }

    /// Entry count
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM log_entries")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn insert(
        &self,
        timestamp: chrono::DateTime<Utc>,
        entry_type: &str,
        message: &str,
        spot_id: Option<&str>,
    ) -> Result<LogEntry> {
        let result = sqlx::query(
            "INSERT INTO log_entries (timestamp, type, message, spot_id) VALUES (?, ?, ?, ?)",
        )
        .bind(timestamp)
        .bind(entry_type)
        .bind(message)
        .bind(spot_id)
        .execute(&self.pool)
        .await?;

        Ok(LogEntry {
            id: result.last_insert_rowid(),
            timestamp,
            entry_type: entry_type.to_string(),
            message: message.to_string(),
            spot_id: spot_id.map(str::to_string),
        })
    }

    async fn store(&self, entry: &LogEntry) -> Result<()> {
        sqlx::query(
            "UPDATE log_entries SET timestamp = ?, type = ?, message = ?, spot_id = ? WHERE id = ?",
        )
        .bind(entry.timestamp)
        .bind(&entry.entry_type)
        .bind(&entry.message)
        .bind(&entry.spot_id)
        .bind(entry.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn ensure_spot_exists(&self, spot_id: &str) -> Result<()> {
        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM parking_spots WHERE id = ?")
            .bind(spot_id)
            .fetch_optional(&self.pool)
            .await?;

        if exists.is_none() {
            return Err(Error::Validation(format!("Unknown spot {}", spot_id)));
        }
        Ok(())
    }
}

fn validate_type(entry_type: &str) -> Result<()> {
    let len = entry_type.chars().count();
    if len == 0 || len > MAX_TYPE_LEN {
        return Err(Error::Validation(format!(
            "type must be 1-{} characters",
            MAX_TYPE_LEN
        )));
    }
    Ok(())
}
