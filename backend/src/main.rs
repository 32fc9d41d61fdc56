mod handlers;
mod models;
mod services;

use std::net::SocketAddr;
use std::sync::Arc;
use axum::{
    Router,
    middleware,
    extract::{Request, State},
    http::{HeaderName, HeaderValue, Method},
    response::Response,
    body::Body,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::Span;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use models::config::AppConfig;
use models::error::{AppError, REQUEST_ID};
use services::landscape::LandscapeService;
use services::profiles::StyleProfileRegistry;
use services::radar::RadarProfileProvider;
use services::rate_limiter::RateLimiter;

pub struct AppState {
    pub config: Arc<AppConfig>,
    pub registry: Arc<StyleProfileRegistry>,
    pub landscape: LandscapeService,
    pub radar: RadarProfileProvider,
    pub predict_limiter: RateLimiter,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>) -> Self {
        let registry = Arc::new(StyleProfileRegistry::new());
        Self {
            landscape: LandscapeService::new(registry.clone()),
            radar: RadarProfileProvider::new(),
            predict_limiter: RateLimiter::new(config.rate_limit_predict),
            registry,
            config,
        }
    }
}

async fn session_token_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: middleware::Next,
) -> Result<Response, AppError> {
    if !state.config.require_session_token || request.method() != Method::POST {
        return Ok(next.run(request).await);
    }

    let has_token = request
        .headers()
        .get("X-Session-Token")
        .and_then(|v| v.to_str().ok())
        .map_or(false, |t| !t.is_empty());

    if !has_token {
        return Err(AppError::MissingSessionToken);
    }

    Ok(next.run(request).await)
}

/// Headers that must never appear in logs.
const SENSITIVE_HEADERS: &[&str] = &["authorization", "cookie", "x-session-token"];

fn is_sensitive_header(name: &HeaderName) -> bool {
    SENSITIVE_HEADERS.contains(&name.as_str())
}

/// Reject requests that did not arrive over HTTPS at the reverse proxy.
async fn require_https_middleware(
    request: Request<Body>,
    next: middleware::Next,
) -> Result<Response, AppError> {
    let is_https = request
        .headers()
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .map_or(false, |p| p.eq_ignore_ascii_case("https"));

    if !is_https {
        return Err(AppError::HttpsRequired);
    }

    Ok(next.run(request).await)
}

/// Outermost layer: every response, including error bodies built by inner
/// layers, carries the same id.
async fn request_id_middleware(
    request: Request<Body>,
    next: middleware::Next,
) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    let mut response = REQUEST_ID.scope(request_id.clone(), next.run(request)).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("X-Request-Id", value);
    }
    response
}

/// True only for loopback binds. The wildcard `0.0.0.0` / `[::]` is public.
fn is_loopback(listen_addr: &str) -> bool {
    if let Ok(addr) = listen_addr.parse::<SocketAddr>() {
        return addr.ip().is_loopback();
    }
    let host = listen_addr.rsplit_once(':').map(|(h, _)| h).unwrap_or(listen_addr);
    host.eq_ignore_ascii_case("localhost")
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let config = state.config.clone();

    let cors_origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(cors_origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            HeaderName::from_static("content-type"),
            HeaderName::from_static("x-request-id"),
            HeaderName::from_static("x-session-token"),
        ])
        .expose_headers([
            HeaderName::from_static("x-request-id"),
            HeaderName::from_static("retry-after"),
        ]);

    let api_v1 = Router::new()
        .route("/styles", get(handlers::styles::list_styles))
        .route("/styles/landscape", post(handlers::styles::predict_landscape))
        .route("/styles/radar", post(handlers::styles::style_radar));

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<Body>| {
            let safe_headers: Vec<String> = request
                .headers()
                .iter()
                .map(|(name, value)| {
                    if is_sensitive_header(name) {
                        format!("{}=[REDACTED]", name)
                    } else {
                        format!("{}={}", name, value.to_str().unwrap_or(""))
                    }
                })
                .collect();

            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                headers = %safe_headers.join(", "),
            )
        })
        .on_response(|response: &Response, latency: std::time::Duration, _span: &Span| {
            tracing::info!(
                status = response.status().as_u16(),
                latency_ms = latency.as_millis() as u64,
                "response",
            );
        });

    let enforce_https = config.require_https || !is_loopback(&config.listen_addr);

    let mut app = Router::new()
        .nest("/api/v1", api_v1)
        // Paths the existing front end already calls.
        .route("/api/style_effect_prediction", post(handlers::styles::predict_landscape))
        .route("/api/style_radar_data", post(handlers::styles::style_radar))
        .route("/api/health", get(handlers::health::health_check))
        .route("/api/version", get(handlers::health::version))
        .layer(axum::extract::DefaultBodyLimit::max(config.max_body_bytes as usize))
        .layer(middleware::from_fn_with_state(state.clone(), session_token_middleware))
        .layer(trace_layer)
        .layer(cors)
        .with_state(state);

    if enforce_https {
        tracing::warn!(
            "HTTPS enforced (require_https={}, listen_addr={}); non-HTTPS requests will be rejected",
            config.require_https, config.listen_addr
        );
        app = app.layer(middleware::from_fn(require_https_middleware));
    }

    app.layer(middleware::from_fn(request_id_middleware))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    handlers::health::init_start_time();

    let config = Arc::new(config);
    let state = Arc::new(AppState::new(config.clone()));
    tracing::info!(
        styles = state.registry.len(),
        rate_limit_predict = config.rate_limit_predict,
        "style profiles loaded"
    );

    let app = build_router(state.clone());

    let cleanup_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
        loop {
            interval.tick().await;
            cleanup_state.predict_limiter.cleanup();
        }
    });

    let addr = config.listen_addr.clone();
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install CTRL+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, draining connections...");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::StatusCode;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn test_config() -> AppConfig {
        AppConfig {
            listen_addr: "127.0.0.1:0".to_string(),
            ..AppConfig::default()
        }
    }

    fn app_with(config: AppConfig) -> Router {
        build_router(Arc::new(AppState::new(Arc::new(config))))
    }

    fn app() -> Router {
        app_with(test_config())
    }

    async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = axum::http::Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn as_f64s(v: &Value) -> Vec<f64> {
        v.as_array()
            .unwrap()
            .iter()
            .map(|x| x.as_f64().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn landscape_for_single_style() {
        let (status, body) =
            post_json(app(), "/api/v1/styles/landscape", json!({ "styles": ["vangogh"] })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let grid = body["grid"].as_array().unwrap();
        assert_eq!(grid.len(), 10);
        for row in grid {
            let row = as_f64s(row);
            assert_eq!(row.len(), 10);
            assert!(row.iter().all(|v| (0.3..=1.0).contains(v)));
        }

        let style_axis = as_f64s(&body["style_axis"]);
        let content_axis = as_f64s(&body["content_axis"]);
        assert_eq!(style_axis.len(), 10);
        assert!(style_axis.contains(&body["optimum"]["style_weight"].as_f64().unwrap()));
        assert!(content_axis.contains(&body["optimum"]["content_weight"].as_f64().unwrap()));
        assert_eq!(body["title"], "Vangogh style effect prediction");
    }

    #[tokio::test]
    async fn bare_string_is_treated_as_one_style() {
        let (status, body) =
            post_json(app(), "/api/v1/styles/landscape", json!({ "styles": "ink" })).await;
        let (_, listed) =
            post_json(app(), "/api/v1/styles/landscape", json!({ "styles": ["ink"] })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["grid"], listed["grid"]);
        assert_eq!(body["optimum"], listed["optimum"]);
    }

    #[tokio::test]
    async fn empty_or_missing_styles_is_a_validation_error() {
        for payload in [json!({ "styles": [] }), json!({})] {
            let (status, body) = post_json(app(), "/api/v1/styles/landscape", payload).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["code"], "VALIDATION_ERROR");
            assert!(body["error"].as_str().is_some());
            assert!(body.get("grid").is_none());
        }
    }

    #[tokio::test]
    async fn malformed_body_is_a_validation_error() {
        let request = axum::http::Request::builder()
            .method(Method::POST)
            .uri("/api/v1/styles/landscape")
            .header("content-type", "application/json")
            .body(Body::from("{ not json"))
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_style_succeeds_with_default_profile() {
        let (status, unknown) = post_json(
            app(),
            "/api/v1/styles/landscape",
            json!({ "styles": ["totally-unknown-id"] }),
        )
        .await;
        let (_, vangogh) =
            post_json(app(), "/api/v1/styles/landscape", json!({ "styles": ["vangogh"] })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(unknown["grid"], vangogh["grid"]);
        assert_eq!(unknown["title"], "Totally-unknown-id style effect prediction");
    }

    #[tokio::test]
    async fn legacy_landscape_route_matches_v1() {
        let payload = json!({ "styles": ["pop", "candy"] });
        let (_, legacy) = post_json(app(), "/api/style_effect_prediction", payload.clone()).await;
        let (_, v1) = post_json(app(), "/api/v1/styles/landscape", payload).await;
        assert_eq!(legacy["grid"], v1["grid"]);
        assert_eq!(legacy["title"], "Pop + Candy blended style effect prediction");
    }

    #[tokio::test]
    async fn radar_for_ink() {
        let (status, body) =
            post_json(app(), "/api/v1/styles/radar", json!({ "style": "ink" })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["style"], "ink");
        let values = as_f64s(&body["values"]);
        assert_eq!(values, vec![0.8, 0.3, 0.9, 0.9, 0.8, 0.8]);
        assert_eq!(body["labels"].as_array().unwrap().len(), 6);
        assert_eq!(body["labels"][0], body["labels"][5]);
    }

    #[tokio::test]
    async fn radar_for_unknown_style_is_all_zero() {
        let (status, body) =
            post_json(app(), "/api/style_radar_data", json!({ "style": "nope" })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(as_f64s(&body["values"]), vec![0.0; 6]);
        assert_eq!(body["labels"][0], "Brushwork");
    }

    #[tokio::test]
    async fn radar_without_style_is_rejected() {
        for payload in [json!({}), json!({ "style": "" })] {
            let (status, body) = post_json(app(), "/api/v1/styles/radar", payload).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["code"], "VALIDATION_ERROR");
        }
    }

    #[tokio::test]
    async fn style_catalog_lists_every_profile() {
        let request = axum::http::Request::builder()
            .uri("/api/v1/styles")
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        let styles = body["styles"].as_array().unwrap();
        assert_eq!(styles.len(), 10);
        assert_eq!(styles[0]["id"], "vangogh");
        assert_eq!(styles[0]["hasRadar"], true);
        assert_eq!(styles[0]["profile"]["optimalStyleWeight"], 0.75);
    }

    #[tokio::test]
    async fn responses_carry_a_request_id() {
        let request = axum::http::Request::builder()
            .uri("/api/health")
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn rate_limit_rejects_excess_requests() {
        let app = app_with(AppConfig {
            rate_limit_predict: 1,
            ..test_config()
        });
        let payload = json!({ "style": "ink" });
        let (first, _) = post_json(app.clone(), "/api/v1/styles/radar", payload.clone()).await;
        let (second, body) = post_json(app, "/api/v1/styles/radar", payload).await;
        assert_eq!(first, StatusCode::OK);
        assert_eq!(second, StatusCode::TOO_MANY_REQUESTS);
        assert!(body["retryAfter"].as_u64().unwrap() >= 1);
    }

    #[tokio::test]
    async fn session_token_is_required_when_configured() {
        let app = app_with(AppConfig {
            require_session_token: true,
            ..test_config()
        });
        let (status, body) =
            post_json(app.clone(), "/api/v1/styles/radar", json!({ "style": "ink" })).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "MISSING_SESSION_TOKEN");

        let request = axum::http::Request::builder()
            .method(Method::POST)
            .uri("/api/v1/styles/radar")
            .header("content-type", "application/json")
            .header("X-Session-Token", "abc")
            .body(Body::from(json!({ "style": "ink" }).to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn https_is_enforced_when_configured() {
        let app = app_with(AppConfig {
            require_https: true,
            ..test_config()
        });
        let (status, body) =
            post_json(app.clone(), "/api/v1/styles/radar", json!({ "style": "ink" })).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "HTTPS_REQUIRED");
        assert!(body["error"].as_str().is_some());

        let request = axum::http::Request::builder()
            .uri("/api/health")
            .header("x-forwarded-proto", "https")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn error_body_request_id_matches_header() {
        let cases = [
            (test_config(), "/api/v1/styles/landscape", json!({ "styles": [] })),
            (
                AppConfig { require_https: true, ..test_config() },
                "/api/v1/styles/radar",
                json!({ "style": "ink" }),
            ),
            (
                AppConfig { require_session_token: true, ..test_config() },
                "/api/v1/styles/radar",
                json!({ "style": "ink" }),
            ),
        ];
        for (config, uri, payload) in cases {
            let request = axum::http::Request::builder()
                .method(Method::POST)
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap();
            let response = app_with(config).oneshot(request).await.unwrap();
            assert!(!response.status().is_success());
            let header = response.headers()["x-request-id"]
                .to_str()
                .unwrap()
                .to_string();
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let body: Value = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(body["requestId"], header.as_str(), "{uri}");
        }
    }

    #[tokio::test]
    async fn oversized_body_is_payload_too_large() {
        let app = app_with(AppConfig {
            max_body_bytes: 64,
            ..test_config()
        });
        let styles: Vec<String> = (0..50).map(|i| format!("style-{i}")).collect();
        let (status, body) =
            post_json(app, "/api/v1/styles/landscape", json!({ "styles": styles })).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["code"], "PAYLOAD_TOO_LARGE");
    }

    #[test]
    fn loopback_detection() {
        assert!(is_loopback("127.0.0.1:8080"));
        assert!(is_loopback("[::1]:8080"));
        assert!(is_loopback("localhost:8080"));
        assert!(!is_loopback("0.0.0.0:8080"));
        assert!(!is_loopback("[::]:8080"));
        assert!(!is_loopback("10.0.0.5:8080"));
    }
}
