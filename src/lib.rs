//! Parking Server Library
//!
//! Parking spot occupancy over REST, with camera snapshots and remote
//! license plate recognition.
//!
//! ## Architecture
//!
//! 1. PlateParser - Model output text -> plate number
//! 2. RecognitionClient - Remote vision model adapter
//! 3. CameraSource - Single shared capture handle
//! 4. SpotRegistry - Parking spots and their transitions
//! 5. LogRecorder - Timestamped event log
//! 6. WebAPI - REST API endpoints

pub mod camera_source;
pub mod db;
pub mod error;
pub mod log_recorder;
pub mod models;
pub mod plate_parser;
pub mod recognition_client;
pub mod spot_registry;
pub mod state;
pub mod web_api;

pub use error::{Error, Result};
pub use state::AppState;
