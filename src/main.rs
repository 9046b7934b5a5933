//! Parking Server
//!
//! Main entry point for the parking spot server.

use axum::extract::Request;
use axum::ServiceExt;
use parking_server::{
    camera_source::{CameraSource, FfmpegOpener},
    db,
    recognition_client::RecognitionClient,
    state::{AppConfig, AppState},
    web_api,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parking_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Parking Server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::default();
    tracing::info!(
        database_url = %config.database_url,
        recognition_url = %config.recognition_url,
        recognition_timeout_sec = config.recognition_timeout.as_secs(),
        camera_input = %config.camera_input,
        camera_format = %config.camera_format,
        "Configuration loaded"
    );

    // Create database pool
    let pool = db::connect(&config.database_url, 5).await?;
    db::migrate(&pool).await?;
    tracing::info!("Database connected");

    // Initialize components
    let recognizer = RecognitionClient::with_timeout(
        config.recognition_url.clone(),
        config.recognition_timeout,
    )?;
    tracing::info!(
        endpoint = %recognizer.endpoint(),
        timeout_ms = recognizer.timeout().as_millis() as u64,
        "RecognitionClient initialized"
    );

    // Camera is opened lazily on the first snapshot
    let camera = CameraSource::new(Arc::new(FfmpegOpener::new(
        config.camera_input.clone(),
        config.camera_format.clone(),
        config.camera_frame_timeout,
    )));

    let state = AppState::new(pool, config, recognizer, camera);
    tracing::info!("Components initialized (SpotService, LogRecorder, RecognitionClient, CameraSource)");

    let app = web_api::create_app(state.clone());

    // Start server
    let addr = format!("{}:{}", state.config.host, state.config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.camera.release().await;
    state.pool.close().await;
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
