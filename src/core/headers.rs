//! Header sanitation applied on both legs of a proxied exchange.
//!
//! Hop-by-hop headers only describe a single transport connection and must not
//! cross the gateway in either direction. On the response leg every
//! `Access-Control-*` header produced by a backend is dropped as well: the edge
//! CORS policy (see [`crate::adapters::cors`]) is the only source of those
//! headers, so browsers never see duplicated or conflicting values.
//!
//! Both filters are pure and idempotent.
use http::{HeaderMap, HeaderName};

/// Headers that are never relayed across the proxy boundary (lower-case).
pub const HOP_BY_HOP_HEADERS: [&str; 10] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
    "content-length",
];

/// Prefix shared by all CORS response headers.
pub const CORS_HEADER_PREFIX: &str = "access-control-";

/// Returns true when `name` belongs to the hop-by-hop set (case-insensitive).
pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP_HEADERS
        .iter()
        .any(|hop| hop.eq_ignore_ascii_case(name))
}

/// Returns true when `name` is a CORS header (`Access-Control-*`, any case).
pub fn is_cors_header(name: &str) -> bool {
    name.len() >= CORS_HEADER_PREFIX.len()
        && name.as_bytes()[..CORS_HEADER_PREFIX.len()]
            .eq_ignore_ascii_case(CORS_HEADER_PREFIX.as_bytes())
}

/// Copy of `headers` without any hop-by-hop entry. Multi-valued headers are
/// dropped as a whole.
pub fn filter_request_headers(headers: &HeaderMap) -> HeaderMap {
    retain_headers(headers, |name| !is_hop_by_hop(name.as_str()))
}

/// Copy of `headers` without hop-by-hop entries and without backend supplied
/// `Access-Control-*` headers. `Location` is always kept so clients can follow
/// redirects themselves.
pub fn filter_response_headers(headers: &HeaderMap) -> HeaderMap {
    retain_headers(headers, |name| {
        !is_hop_by_hop(name.as_str()) && !is_cors_header(name.as_str())
    })
}

fn retain_headers(headers: &HeaderMap, keep: impl Fn(&HeaderName) -> bool) -> HeaderMap {
    let mut filtered = HeaderMap::with_capacity(headers.keys_len());
    for (name, value) in headers {
        if keep(name) {
            filtered.append(name.clone(), value.clone());
        }
    }
    filtered
}
