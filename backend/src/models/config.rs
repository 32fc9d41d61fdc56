use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: String,
    pub allowed_origins: Vec<String>,
    pub log_level: String,
    pub max_body_bytes: u64,
    pub rate_limit_predict: u32,
    pub require_session_token: bool,
    pub require_https: bool,
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            listen_addr: env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:5000,http://localhost:3000".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            max_body_bytes: env::var("MAX_BODY_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(65_536),
            rate_limit_predict: env::var("RATE_LIMIT_PREDICT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(120),
            require_session_token: env_flag("REQUIRE_SESSION_TOKEN"),
            require_https: env_flag("REQUIRE_HTTPS"),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            allowed_origins: Vec::new(),
            log_level: "info".to_string(),
            max_body_bytes: 65_536,
            rate_limit_predict: 120,
            require_session_token: false,
            require_https: false,
        }
    }
}
