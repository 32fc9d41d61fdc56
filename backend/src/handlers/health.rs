use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Instant;

use crate::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub uptime: f64,
    pub styles_loaded: usize,
    pub tracked_sessions: usize,
}

static START_TIME: OnceLock<Instant> = OnceLock::new();

pub fn init_start_time() {
    START_TIME.get_or_init(Instant::now);
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let uptime = START_TIME
        .get()
        .map(|s| s.elapsed().as_secs_f64())
        .unwrap_or(0.0);

    Json(HealthResponse {
        status: "ok".to_string(),
        uptime,
        styles_loaded: state.registry.len(),
        tracked_sessions: state.predict_limiter.tracked_sessions(),
    })
}

pub async fn version() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "apiVersion": "v1",
        "buildHash": env!("CARGO_PKG_VERSION")
    }))
}
