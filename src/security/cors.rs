use axum::http::{header, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<Method>,
    pub allowed_headers: Vec<header::HeaderName>,
    pub allow_credentials: bool,
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![],
            allowed_methods: vec![
                Method::GET,
                Method::POST,
                Method::PATCH,
                Method::OPTIONS,
            ],
            allowed_headers: vec![header::CONTENT_TYPE, header::ACCEPT, header::COOKIE],
            allow_credentials: true,
            max_age_secs: 3600,
        }
    }
}

impl CorsConfig {
    pub fn with_origins(mut self, origins: Vec<String>) -> Self {
        self.allowed_origins = origins;
        self
    }

    /// Without configured origins any well-formed http(s) origin is mirrored,
    /// which keeps cookie credentials working in development.
    pub fn build(self) -> CorsLayer {
        let origins: Vec<HeaderValue> = self
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();

        let mut cors = if origins.is_empty() {
            warn!("CORS: no origins configured, accepting any http(s) origin with credentials");
            CorsLayer::new().allow_origin(AllowOrigin::predicate(validate_origin))
        } else {
            info!("CORS: {} allowed origins", origins.len());
            CorsLayer::new().allow_origin(origins)
        };

        cors = cors
            .allow_methods(self.allowed_methods)
            .allow_headers(self.allowed_headers)
            .max_age(std::time::Duration::from_secs(self.max_age_secs));

        if self.allow_credentials {
            cors = cors.allow_credentials(true);
        }

        cors
    }
}

pub fn create_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    CorsConfig::default()
        .with_origins(allowed_origins.to_vec())
        .build()
}

fn validate_origin(origin: &HeaderValue, _request: &axum::http::request::Parts) -> bool {
    origin.to_str().is_ok_and(is_valid_origin_format)
}

fn is_valid_origin_format(origin: &str) -> bool {
    let Some(rest) = origin
        .strip_prefix("http://")
        .or_else(|| origin.strip_prefix("https://"))
    else {
        return false;
    };

    if rest.is_empty() || rest.contains("//") || rest.contains("..") {
        return false;
    }

    let lower = rest.to_lowercase();
    !["<", ">", "%3c", "%3e", "\\x", "\\u", "javascript:"]
        .iter()
        .any(|p| lower.contains(p))
}
