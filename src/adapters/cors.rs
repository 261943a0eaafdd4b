//! Edge CORS policy.
//!
//! This layer is the single source of `Access-Control-*` headers seen by
//! browsers: backend supplied ones are stripped by the response sanitizer.
//! Only real preflights (`OPTIONS` with both `Origin` and
//! `Access-Control-Request-Method`) are answered here. Any other `OPTIONS`
//! request goes through route resolution and is forwarded like other methods.
use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, Method, header, request::Parts},
    middleware::{self, Next},
    response::Response,
};
use regex::Regex;
use tower::ServiceExt;
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};

use crate::config::CorsConfig;

/// Origins allowed regardless of configuration (local frontend dev server).
pub const DEFAULT_DEV_ORIGINS: [&str; 2] = ["http://localhost:4200", "http://127.0.0.1:4200"];

/// Methods advertised to browsers.
pub const CORS_ALLOWED_METHODS: [Method; 6] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::OPTIONS,
];

/// Response headers readable by browser scripts.
pub const CORS_EXPOSED_HEADERS: [HeaderName; 2] = [header::AUTHORIZATION, header::LOCATION];

/// Compile an origin pattern into an anchored regex. `*` matches any
/// (possibly empty) run of characters; everything else is literal.
pub fn origin_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let escaped = regex::escape(pattern).replace(r"\*", ".*");
    Regex::new(&format!("^{escaped}$"))
}

/// Ordered, de-duplicated set of origin patterns, compiled once.
#[derive(Debug, Clone)]
pub struct OriginPatterns {
    patterns: Vec<String>,
    matchers: Vec<Regex>,
}

impl OriginPatterns {
    /// The development defaults followed by the configured entries (trimmed,
    /// blanks and duplicates dropped). Patterns that fail to compile are
    /// skipped with a warning.
    pub fn from_config(config: &CorsConfig) -> Self {
        let mut patterns: Vec<String> = Vec::new();
        let mut matchers = Vec::new();
        let candidates = DEFAULT_DEV_ORIGINS
            .iter()
            .map(|origin| origin.to_string())
            .chain(config.allowed_origins.iter().map(|raw| raw.trim().to_string()));
        for pattern in candidates {
            if pattern.is_empty() || patterns.contains(&pattern) {
                continue;
            }
            match origin_regex(&pattern) {
                Ok(matcher) => {
                    matchers.push(matcher);
                    patterns.push(pattern);
                }
                Err(e) => tracing::warn!("Ignoring origin pattern '{}': {}", pattern, e),
            }
        }
        Self { patterns, matchers }
    }

    pub fn as_slice(&self) -> &[String] {
        &self.patterns
    }

    pub fn allows(&self, origin: &str) -> bool {
        self.matchers.iter().any(|matcher| matcher.is_match(origin))
    }

    fn allows_header(&self, origin: &HeaderValue) -> bool {
        origin
            .to_str()
            .map(|origin| self.allows(origin))
            .unwrap_or(false)
    }
}

/// True for a CORS preflight: `OPTIONS` carrying both `Origin` and
/// `Access-Control-Request-Method`.
pub fn is_preflight(method: &Method, headers: &HeaderMap) -> bool {
    method == Method::OPTIONS
        && headers.contains_key(header::ORIGIN)
        && headers.contains_key(header::ACCESS_CONTROL_REQUEST_METHOD)
}

/// Request headers are mirrored rather than answered with a literal `*`,
/// which browsers reject when credentials are allowed.
fn cors_layer(patterns: Arc<OriginPatterns>, max_age_secs: u64) -> CorsLayer {
    tracing::info!(origins = ?patterns.as_slice(), "CORS origin patterns configured");

    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _parts: &Parts| patterns.allows_header(origin),
        ))
        .allow_methods(CORS_ALLOWED_METHODS)
        .allow_headers(AllowHeaders::mirror_request())
        .expose_headers(CORS_EXPOSED_HEADERS)
        .allow_credentials(true)
        .max_age(Duration::from_secs(max_age_secs))
}

/// Routes that non-preflight `OPTIONS` requests are sent to, bypassing the
/// `CorsLayer` (which treats every `OPTIONS` as a preflight).
#[derive(Clone)]
struct PreflightBypass {
    routes: Router,
    patterns: Arc<OriginPatterns>,
}

async fn bypass_non_preflight_options(
    State(bypass): State<PreflightBypass>,
    req: Request,
    next: Next,
) -> Response {
    if req.method() != Method::OPTIONS || is_preflight(req.method(), req.headers()) {
        return next.run(req).await;
    }

    let origin = req
        .headers()
        .get(header::ORIGIN)
        .filter(|origin| bypass.patterns.allows_header(origin))
        .cloned();

    let mut response = match bypass.routes.oneshot(req).await {
        Ok(response) => response,
        Err(infallible) => match infallible {},
    };

    // Cross-origin actual OPTIONS request: same headers as any other method.
    if let Some(origin) = origin {
        let headers = response.headers_mut();
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
        headers.insert(
            header::ACCESS_CONTROL_EXPOSE_HEADERS,
            HeaderValue::from_static("authorization,location"),
        );
        headers.append(header::VARY, HeaderValue::from_static("origin"));
    }
    response
}

/// Wrap `routes` in the edge CORS policy. Preflights are answered by the
/// `CorsLayer`; other `OPTIONS` requests reach `routes` directly.
pub fn with_edge_cors(routes: Router, config: &CorsConfig) -> Router {
    let patterns = Arc::new(OriginPatterns::from_config(config));
    let bypass = PreflightBypass {
        routes: routes.clone(),
        patterns: patterns.clone(),
    };

    routes
        .layer(cors_layer(patterns, config.max_age_secs))
        .layer(middleware::from_fn_with_state(
            bypass,
            bypass_non_preflight_options,
        ))
}
