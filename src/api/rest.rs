//! Axum REST API handlers

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::engine::ModelLoadingState;
use crate::error::PipelineError;
use crate::service::AttributeService;

use super::dto::*;

/// Application state shared across handlers
pub struct AppState {
    pub service: Arc<AttributeService>,
    pub start_time: Instant,
}

/// Create the REST API router
pub fn create_rest_router(state: Arc<AppState>) -> Router {
    // Leave form-encoding headroom above the upload limit so oversized
    // files reach the validator and fail as 400, not as a bare 413.
    let body_limit = state.service.max_upload_bytes() + 64 * 1024;

    Router::new()
        .route(
            "/api/v1/predict",
            post(predict_handler).fallback(method_not_allowed_handler),
        )
        .route("/api/v1/models/status", get(status_handler))
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn error_status(err: &PipelineError) -> StatusCode {
    match err {
        PipelineError::Validation(_)
        | PipelineError::Decode(_)
        | PipelineError::Dimension { .. } => StatusCode::BAD_REQUEST,
        PipelineError::NotLoaded | PipelineError::Load(_) => StatusCode::SERVICE_UNAVAILABLE,
        PipelineError::Prediction(_)
        | PipelineError::ShapeMismatch { .. }
        | PipelineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Run a prediction on an uploaded image
async fn predict_handler(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> (StatusCode, Json<PredictEnvelope>) {
    let mut image_data: Option<Vec<u8>> = None;

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                let name = field.name().unwrap_or("").to_string();
                if name == "image" {
                    match field.bytes().await {
                        Ok(bytes) => image_data = Some(bytes.to_vec()),
                        Err(e) => {
                            return (
                                StatusCode::BAD_REQUEST,
                                Json(PredictEnvelope::err(e.to_string())),
                            )
                        }
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(PredictEnvelope::err(e.to_string())),
                )
            }
        }
    }

    let Some(image_data) = image_data else {
        return (
            StatusCode::BAD_REQUEST,
            Json(PredictEnvelope::err("Missing image field")),
        );
    };

    match state.service.predict(&image_data).await {
        Ok(outcome) => (StatusCode::OK, Json(PredictEnvelope::ok(&outcome))),
        Err(e) => {
            error!("Prediction failed: {}", e);
            (error_status(&e), Json(PredictEnvelope::err(e.to_string())))
        }
    }
}

/// Same envelope shape for unsupported methods on the predict route.
async fn method_not_allowed_handler() -> (StatusCode, Json<PredictEnvelope>) {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(PredictEnvelope::err("method not allowed; use POST")),
    )
}

/// Model loading state snapshot (the UI's loading-progress poll target)
async fn status_handler(State(state): State<Arc<AppState>>) -> Json<ModelLoadingState> {
    Json(state.service.loading_state())
}

/// Health check
async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let health = state.service.health();
    let uptime = state.start_time.elapsed().as_secs();

    Json(HealthResponse {
        healthy: health.healthy,
        version: health.version,
        models_loaded: health.models_loaded,
        uptime_seconds: uptime,
    })
}
