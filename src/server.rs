//! HTTP surface: routing, upload intake, health and fallbacks.

use crate::controller::{ImageUpload, Pipeline, SolveResponse};
use crate::error::AppError;
use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
        DefaultBodyLimit, Multipart, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::any::Any;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info_span, Instrument};
use uuid::Uuid;

/// Largest accepted image.
pub const MAX_UPLOAD_BYTES: usize = crate::ocr::MAX_IMAGE_BYTES;

/// Whole-body cap; leaves room for multipart framing around a full-size image.
const BODY_LIMIT_BYTES: usize = MAX_UPLOAD_BYTES + 1024 * 1024;

/// Multipart field carrying the image.
const IMAGE_FIELD: &str = "image";

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    pipeline: Pipeline,
}

pub fn router(pipeline: Pipeline) -> Router {
    Router::new()
        .route("/health", get(health).fallback(route_not_found))
        .route("/solve-math", post(solve_math).fallback(route_not_found))
        .route(
            "/solve-math-url",
            post(solve_math_url).fallback(route_not_found),
        )
        .fallback(route_not_found)
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(AppState { pipeline })
}

// ============================================================================
// Handlers
// ============================================================================

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    message: &'static str,
    timestamp: String,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        message: "Math Solver API is running",
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

/// Upload an image of a math problem and solve it.
async fn solve_math(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<SolveResponse>, AppError> {
    let span = info_span!("solve_math", request_id = %Uuid::new_v4());
    solve_uploaded(state, multipart).instrument(span).await
}

async fn solve_uploaded(
    state: AppState,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<SolveResponse>, AppError> {
    // Anything that isn't multipart can't carry an image field.
    let multipart = multipart.map_err(|_| AppError::NoImage)?;
    let upload = read_image_field(multipart).await?.ok_or(AppError::NoImage)?;
    let response = state.pipeline.solve_upload(upload).await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SolveUrlRequest {
    #[serde(default)]
    image_url: Option<String>,
}

/// Solve the problem shown in a remote image.
async fn solve_math_url(
    State(state): State<AppState>,
    payload: Result<Json<SolveUrlRequest>, JsonRejection>,
) -> Result<Json<SolveResponse>, AppError> {
    let span = info_span!("solve_math_url", request_id = %Uuid::new_v4());
    solve_remote(state, payload).instrument(span).await
}

async fn solve_remote(
    state: AppState,
    payload: Result<Json<SolveUrlRequest>, JsonRejection>,
) -> Result<Json<SolveResponse>, AppError> {
    let Json(request) = payload.map_err(|e| AppError::InvalidUpload(e.body_text()))?;
    let url = request
        .image_url
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .ok_or(AppError::NoImage)?;

    match reqwest::Url::parse(&url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
        _ => {
            return Err(AppError::InvalidUpload(
                "imageUrl must be an http(s) URL".to_string(),
            ))
        }
    }

    let response = state.pipeline.solve_url(url).await?;
    Ok(Json(response))
}

async fn route_not_found() -> AppError {
    AppError::RouteNotFound
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    tracing::error!("Handler panicked: {}", detail);
    AppError::Internal.into_response()
}

// ============================================================================
// Helper functions
// ============================================================================

/// Pull the first `image` field out of the form, enforcing type and size.
/// Other fields are skipped.
async fn read_image_field(mut multipart: Multipart) -> Result<Option<ImageUpload>, AppError> {
    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        if !content_type.starts_with("image/") {
            return Err(AppError::NotAnImage);
        }
        let filename = field.file_name().unwrap_or("image").to_string();

        let mut data = Vec::new();
        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            if data.len() + chunk.len() > MAX_UPLOAD_BYTES {
                return Err(AppError::FileTooLarge);
            }
            data.extend_from_slice(&chunk);
        }

        return Ok(Some(ImageUpload {
            filename,
            content_type,
            data,
        }));
    }

    Ok(None)
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::FileTooLarge
    } else {
        AppError::InvalidUpload(e.body_text())
    }
}
