//! API Routes

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, patch, post, put},
    Json, Router,
};
use base64::Engine;

use crate::camera_source::to_data_uri;
use crate::error::Error;
use crate::log_recorder::{CreateLogRequest, UpdateLogRequest};
use crate::models::{
    DetailResponse, MessageResponse, OccupyRequest, PlateResponse, RecognizeRequest,
    SnapshotResponse,
};
use crate::plate_parser::UNKNOWN_PLATE;
use crate::recognition_client::strip_data_uri;
use crate::spot_registry::{CreateSpotRequest, ReplaceSpotRequest, UpdateSpotRequest};
use crate::state::AppState;

/// Create API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/healthz", get(super::health_check))
        // Spots
        .route("/api/spots", get(list_spots))
        .route("/api/spots", post(create_spot))
        .route("/api/spots/:id", get(get_spot))
        .route("/api/spots/:id", put(replace_spot))
        .route("/api/spots/:id", patch(patch_spot))
        .route("/api/spots/:id", delete(delete_spot))
        .route("/api/spots/:id/occupy", post(occupy_spot))
        // Logs
        .route("/api/logs", get(list_logs))
        .route("/api/logs", post(create_log))
        .route("/api/logs/:id", get(get_log))
        .route("/api/logs/:id", put(replace_log))
        .route("/api/logs/:id", patch(update_log))
        .route("/api/logs/:id", delete(delete_log))
        // Recognition & Camera
        .route("/api/recognize", post(recognize_plate))
        .route("/api/camera/snapshot", get(camera_snapshot))
        .route("/api/camera", delete(release_camera))
        // System
        .route("/api/reset", post(reset_system))
        .with_state(state)
}

// ========================================
// Spot API Handlers
// ========================================

/// List all spots ordered by id
async fn list_spots(State(state): State<AppState>) -> Result<impl IntoResponse, Error> {
    let spots = state.spots.list().await?;
    Ok(Json(spots))
}

/// Create spot
async fn create_spot(
    State(state): State<AppState>,
    Json(req): Json<CreateSpotRequest>,
) -> Result<impl IntoResponse, Error> {
    let spot = state.spots.create(req).await?;
    Ok((StatusCode::CREATED, Json(spot)))
}

/// Get spot by id
async fn get_spot(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, Error> {
    let spot = state.spots.get(&id).await?;
    Ok(Json(spot))
}

/// Replace spot fields
async fn replace_spot(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ReplaceSpotRequest>,
) -> Result<impl IntoResponse, Error> {
    let spot = state.spots.replace(&id, req).await?;
    Ok(Json(spot))
}

/// Partially update spot
async fn patch_spot(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateSpotRequest>,
) -> Result<impl IntoResponse, Error> {
    let spot = state.spots.patch(&id, req).await?;
    Ok(Json(spot))
}

/// Delete spot
async fn delete_spot(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, Error> {
    state.spots.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Mark spot occupied
///
/// A missing or unparsable body is treated like a missing plate.
async fn occupy_spot(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<OccupyRequest>>,
) -> Result<impl IntoResponse, Error> {
    let plate_number = body
        .and_then(|Json(req)| req.plate_number)
        .unwrap_or_default();

    state.spots.occupy(&id, &plate_number).await?;
    Ok(Json(DetailResponse::new("occupied")))
}

// ========================================
// Log API Handlers
// ========================================

/// List log entries, newest first
async fn list_logs(State(state): State<AppState>) -> Result<impl IntoResponse, Error> {
    let entries = state.logs.list_recent().await?;
    Ok(Json(entries))
}

/// Create log entry
async fn create_log(
    State(state): State<AppState>,
    Json(req): Json<CreateLogRequest>,
) -> Result<impl IntoResponse, Error> {
    let entry = state.logs.create(req).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// Get log entry by id
async fn get_log(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, Error> {
    let entry = state
        .logs
        .get(id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Log entry {} not found", id)))?;
    Ok(Json(entry))
}

/// Replace log entry
async fn replace_log(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<CreateLogRequest>,
) -> Result<impl IntoResponse, Error> {
    let entry = state.logs.replace(id, req).await?;
    Ok(Json(entry))
}

/// Partially update log entry
async fn update_log(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateLogRequest>,
) -> Result<impl IntoResponse, Error> {
    let entry = state.logs.update(id, req).await?;
    Ok(Json(entry))
}

/// Delete log entry
async fn delete_log(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, Error> {
    state.logs.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ========================================
// Recognition & Camera Handlers
// ========================================

/// Recognize the plate in a base64 image
///
/// Always answers 200 once an image is supplied; every downstream failure
/// becomes `UNKNOWN`.
async fn recognize_plate(
    State(state): State<AppState>,
    body: Option<Json<RecognizeRequest>>,
) -> Result<impl IntoResponse, Error> {
    let image = body
        .and_then(|Json(req)| req.image)
        .filter(|image| !image.is_empty())
        .ok_or_else(|| Error::Validation("No image provided".to_string()))?;

    let payload = strip_data_uri(&image);
    let plate_number = match base64::engine::general_purpose::STANDARD.decode(payload) {
        Ok(bytes) if !bytes.is_empty() => state.recognizer.recognize(payload).await,
        Ok(_) => {
            tracing::warn!("Recognition image decoded to zero bytes");
            UNKNOWN_PLATE.to_string()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Recognition image is not valid base64");
            UNKNOWN_PLATE.to_string()
        }
    };

    Ok(Json(PlateResponse { plate_number }))
}

/// Grab one camera frame as a JPEG data URI
async fn camera_snapshot(State(state): State<AppState>) -> Result<impl IntoResponse, Error> {
    let jpeg = state.camera.grab_frame().await?;
    Ok(Json(SnapshotResponse {
        image: to_data_uri(&jpeg),
    }))
}

/// Release the camera handle
async fn release_camera(State(state): State<AppState>) -> impl IntoResponse {
    state.camera.release().await;
    Json(MessageResponse::new("Camera released"))
}

// ========================================
// System Handlers
// ========================================

/// Reset every spot and clear the event log
async fn reset_system(State(state): State<AppState>) -> Result<impl IntoResponse, Error> {
    let spots = state.spots.reset_all().await?;
    let logs = state.logs.clear_all().await?;

    tracing::info!(spots = spots, logs_cleared = logs, "System reset");
    Ok(Json(MessageResponse::new("System reset successfully")))
}
