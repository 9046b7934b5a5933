//! Application state
//!
//! Holds all shared components and configuration

use crate::camera_source::CameraSource;
use crate::log_recorder::LogRecorder;
use crate::recognition_client::{RecognitionClient, DEFAULT_TIMEOUT_SECS};
use crate::spot_registry::SpotService;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Database URL
    pub database_url: String,
    /// Recognition backend generate endpoint
    pub recognition_url: String,
    /// Recognition request timeout
    pub recognition_timeout: Duration,
    /// Camera input (device path or stream URL)
    pub camera_input: String,
    /// Camera input format passed to ffmpeg (empty to probe)
    pub camera_format: String,
    /// Bound on a single camera frame read
    pub camera_frame_timeout: Duration,
    /// Server port
    pub port: u16,
    /// Server host
    pub host: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://parking.db?mode=rwc".to_string()),
            recognition_url: std::env::var("RECOGNITION_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:5000/generate".to_string()),
            recognition_timeout: Duration::from_secs(
                std::env::var("RECOGNITION_TIMEOUT_SEC")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
            camera_input: std::env::var("CAMERA_INPUT")
                .unwrap_or_else(|_| "/dev/video0".to_string()),
            camera_format: std::env::var("CAMERA_FORMAT").unwrap_or_else(|_| "v4l2".to_string()),
            camera_frame_timeout: Duration::from_millis(
                std::env::var("CAMERA_FRAME_TIMEOUT_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(5000),
            ),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8000),
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database pool
    pub pool: SqlitePool,
    /// Application config
    pub config: AppConfig,
    /// SpotService (registry + transitions)
    pub spots: Arc<SpotService>,
    /// LogRecorder (event log)
    pub logs: Arc<LogRecorder>,
    /// RecognitionClient (remote plate recognition)
    pub recognizer: Arc<RecognitionClient>,
    /// CameraSource (shared capture handle)
    pub camera: Arc<CameraSource>,
}

impl AppState {
    /// Wire components around an already-migrated pool
    pub fn new(
        pool: SqlitePool,
        config: AppConfig,
        recognizer: RecognitionClient,
        camera: CameraSource,
    ) -> Self {
        let logs = Arc::new(LogRecorder::new(pool.clone()));
        let spots = Arc::new(SpotService::new(pool.clone(), logs.clone()));

        Self {
            pool,
            config,
            spots,
            logs,
            recognizer: Arc::new(recognizer),
            camera: Arc::new(camera),
        }
    }
}
