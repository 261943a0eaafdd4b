//! Conversion between the inbound request seen by the gateway, the request
//! sent to a backend and the outcome handed back to the client.
use bytes::Bytes;
use http::{HeaderMap, Method, Request, Response, StatusCode, request::Parts};
use thiserror::Error;

use crate::core::headers::{filter_request_headers, filter_response_headers};

/// Methods the gateway is willing to forward.
pub const SUPPORTED_METHODS: [Method; 7] = [
    Method::GET,
    Method::HEAD,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::OPTIONS,
];

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TranscodeError {
    #[error("invalid backend target '{target}': {reason}")]
    InvalidTarget { target: String, reason: String },
}

/// A fully buffered client request.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    pub path: String,
    pub raw_query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl InboundRequest {
    /// Capture method, path, query and headers from request parts together with
    /// the already collected body.
    pub fn from_parts(parts: &Parts, body: Bytes) -> Self {
        Self {
            method: parts.method.clone(),
            path: parts.uri.path().to_string(),
            raw_query: parts.uri.query().map(str::to_string),
            headers: parts.headers.clone(),
            body,
        }
    }
}

/// Outcome of a single forwarding attempt, as seen by the client.
#[derive(Debug, Clone)]
pub enum OutboundResult {
    /// The backend answered; status may be any class including 4xx/5xx.
    Forwarded {
        status: StatusCode,
        headers: HeaderMap,
        body: Bytes,
    },
    NotFound,
    MethodNotSupported,
    UpstreamTimeout,
    UpstreamUnreachable,
}

impl OutboundResult {
    /// Status code sent to the client for this outcome.
    pub fn status(&self) -> StatusCode {
        match self {
            OutboundResult::Forwarded { status, .. } => *status,
            OutboundResult::NotFound => StatusCode::NOT_FOUND,
            OutboundResult::MethodNotSupported => StatusCode::METHOD_NOT_ALLOWED,
            OutboundResult::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            OutboundResult::UpstreamUnreachable => StatusCode::BAD_GATEWAY,
        }
    }

    /// Short label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundResult::Forwarded { .. } => "forwarded",
            OutboundResult::NotFound => "not_found",
            OutboundResult::MethodNotSupported => "method_not_supported",
            OutboundResult::UpstreamTimeout => "upstream_timeout",
            OutboundResult::UpstreamUnreachable => "upstream_unreachable",
        }
    }
}

pub fn is_supported_method(method: &Method) -> bool {
    SUPPORTED_METHODS.contains(method)
}

/// `base_url + path`, followed by `?query` when the query is non-empty.
pub fn target_url(base_url: &str, path: &str, raw_query: Option<&str>) -> String {
    match raw_query {
        Some(query) if !query.is_empty() => format!("{base_url}{path}?{query}"),
        _ => format!("{base_url}{path}"),
    }
}

/// Build the request sent to the backend owning `base_url`.
///
/// The path is kept exactly as received, hop-by-hop headers are removed and
/// the body bytes are moved over untouched (an empty body stays an empty, but
/// present, body).
pub fn build_outbound_request(
    base_url: &str,
    inbound: InboundRequest,
) -> Result<Request<Bytes>, TranscodeError> {
    let target = target_url(base_url, &inbound.path, inbound.raw_query.as_deref());
    let uri = target
        .parse::<http::Uri>()
        .map_err(|e| TranscodeError::InvalidTarget {
            target: target.clone(),
            reason: e.to_string(),
        })?;

    let mut request = Request::new(inbound.body);
    *request.method_mut() = inbound.method;
    *request.uri_mut() = uri;
    *request.headers_mut() = filter_request_headers(&inbound.headers);
    Ok(request)
}

/// Wrap a backend response, whatever its status, into a forwarded outcome
/// with sanitized headers.
pub fn forwarded_from_response(response: Response<Bytes>) -> OutboundResult {
    let (parts, body) = response.into_parts();
    OutboundResult::Forwarded {
        status: parts.status,
        headers: filter_response_headers(&parts.headers),
        body,
    }
}
