use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::models::error::AppError;
use crate::models::style::*;
use crate::AppState;

fn session_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("X-Session-Token")
        .and_then(|v| v.to_str().ok())
}

fn enforce_rate_limit(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    state
        .predict_limiter
        .check(session_token(headers))
        .map_err(|retry_after| AppError::RateLimited { retry_after })
}

fn parse_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    body.map(|Json(v)| v).map_err(|e| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge(e.body_text())
        } else {
            AppError::ValidationError(format!("Invalid request body: {}", e.body_text()))
        }
    })
}

// ---------------------------------------------------------------------------
// GET /api/v1/styles
// ---------------------------------------------------------------------------

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListStylesResponse {
    pub styles: Vec<StyleDescriptor>,
}

pub async fn list_styles(State(state): State<Arc<AppState>>) -> Json<ListStylesResponse> {
    let styles = state
        .registry
        .style_ids()
        .map(|id| StyleDescriptor {
            id: id.to_string(),
            profile: state.registry.lookup(id),
            has_radar: state.radar.contains(id),
        })
        .collect();

    Json(ListStylesResponse { styles })
}

// ---------------------------------------------------------------------------
// POST /api/v1/styles/landscape
// ---------------------------------------------------------------------------

pub async fn predict_landscape(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<LandscapeRequest>, JsonRejection>,
) -> Result<Json<LandscapeResponse>, AppError> {
    enforce_rate_limit(&state, &headers)?;
    let req = parse_body(body)?;

    let styles = req.styles.map(StyleSelection::into_vec).unwrap_or_default();
    if styles.is_empty() {
        return Err(AppError::ValidationError(
            "At least one style must be specified".to_string(),
        ));
    }

    let worker = state.clone();
    let response = tokio::task::spawn_blocking(move || worker.landscape.predict(&styles))
        .await
        .map_err(|e| AppError::Internal(format!("Task panicked: {}", e)))??;
    Ok(Json(response))
}

// ---------------------------------------------------------------------------
// POST /api/v1/styles/radar
// ---------------------------------------------------------------------------

pub async fn style_radar(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<RadarRequest>, JsonRejection>,
) -> Result<Json<RadarResponse>, AppError> {
    enforce_rate_limit(&state, &headers)?;
    let req = parse_body(body)?;

    match req.style.as_deref() {
        Some(style) if !style.is_empty() => Ok(Json(state.radar.respond(style))),
        _ => Err(AppError::ValidationError(
            "Style name is required".to_string(),
        )),
    }
}
