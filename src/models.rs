//! Shared request and response bodies for the HTTP surface

use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub db_connected: bool,
    pub camera_open: bool,
    /// Successful camera opens since startup
    pub camera_open_count: u64,
}

/// `{"detail": ...}` acknowledgement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailResponse {
    pub detail: String,
}

impl DetailResponse {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

/// `{"message": ...}` acknowledgement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Occupy request body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OccupyRequest {
    #[serde(default)]
    pub plate_number: Option<String>,
}

/// Recognition request body; `image` is base64, optionally a data URI
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecognizeRequest {
    #[serde(default)]
    pub image: Option<String>,
}

/// Recognition result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlateResponse {
    pub plate_number: String,
}

/// Camera snapshot as a JPEG data URI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotResponse {
    pub image: String,
}
