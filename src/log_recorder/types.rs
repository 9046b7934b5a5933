//! Log recorder data types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Maximum length of an event category
pub const MAX_TYPE_LEN: usize = 32;

/// Well-known event categories
pub mod log_types {
    /// Vehicle parked
    pub const ENTRY: &str = "ENTRY";
    /// Vehicle left
    pub const EXIT: &str = "EXIT";
    /// Spot flagged abnormal
    pub const ABNORMAL: &str = "ABNORMAL";
    /// Operator or system action
    pub const SYSTEM: &str = "SYSTEM";
}

/// Log entry (matches log_entries table)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct LogEntry {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub entry_type: String,
    pub message: String,
    /// Weak reference to a spot; nulled when the spot is deleted
    #[serde(rename = "spot")]
    pub spot_id: Option<String>,
}

/// Log creation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLogRequest {
    /// Defaults to now
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(rename = "type")]
    pub entry_type: String,
    pub message: String,
    #[serde(default, rename = "spot", alias = "spot_id")]
    pub spot_id: Option<String>,
}

/// Log partial update request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateLogRequest {
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(rename = "type")]
    pub entry_type: Option<String>,
    pub message: Option<String>,
    #[serde(default, rename = "spot", alias = "spot_id")]
    pub spot_id: Option<String>,
}
