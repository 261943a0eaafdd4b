//! Axum middleware attached to the gateway router.
//!
//! Both helpers are stateless: one correlates a request across the gateway
//! and its backend through `X-Request-ID`, the other logs per-request latency.
use std::time::Instant;

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;

use crate::tracing_setup::create_request_span;

/// Header carrying the correlation id.
pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Log start/end of a request including latency.
pub async fn request_timing_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let uri = req.uri().clone();

    tracing::debug!("Started processing {} {}", method, uri);

    let response = next.run(req).await;

    tracing::info!(
        http.method = %method,
        http.uri = %uri,
        http.status_code = response.status().as_u16(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Completed request"
    );

    response
}

/// Reuse the caller's `X-Request-ID` or generate a UUID v4, forward it to the
/// backend and echo it on the response.
pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let request_id = req
        .headers()
        .get(&X_REQUEST_ID)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let header_value = HeaderValue::from_str(&request_id).ok();
    if let Some(value) = &header_value {
        req.headers_mut().insert(X_REQUEST_ID.clone(), value.clone());
    }

    let span = create_request_span(req.method().as_str(), req.uri().path(), &request_id);
    let mut response = next.run(req).instrument(span).await;

    if let Some(value) = header_value {
        response.headers_mut().insert(X_REQUEST_ID.clone(), value);
    }

    response
}
