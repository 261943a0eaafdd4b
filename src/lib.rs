//! edge-gateway - the single public entry point in front of a set of backend
//! services.
//!
//! Every inbound request is matched against a fixed table of path prefixes,
//! stripped of hop-by-hop headers, forwarded to the owning service, and the
//! service's response is relayed back with its status and body untouched.
//! The gateway owns the browser-facing CORS policy; CORS headers coming from
//! backends are discarded so each response carries exactly one policy.
//!
//! # Features
//! - Longest-prefix, segment-aware routing over a static route table
//! - Hop-by-hop and CORS header sanitation on both legs
//! - Verbatim passthrough of backend statuses (including 3xx, 4xx and 5xx)
//! - Bounded connect and read timeouts mapped to 502 / 504
//! - Wildcard origin patterns with credentials, preflights answered at the edge
//! - Layered configuration (defaults, file, `GATEWAY__*` environment)
//! - Structured tracing with request ids and graceful shutdown
//!
//! # Quick Example
//! ```no_run
//! use std::sync::Arc;
//!
//! use edge_gateway::{
//!     GatewayService, HttpClientAdapter, HttpHandler, adapters::build_router,
//!     config::GatewayConfig, core::RouteTable,
//! };
//!
//! # fn main() -> eyre::Result<()> {
//! let config = GatewayConfig::default();
//! let routes = Arc::new(RouteTable::from_services(&config.services)?);
//! let client = Arc::new(HttpClientAdapter::new(&config.timeouts)?);
//! let gateway = Arc::new(GatewayService::new(routes, client));
//! let handler = Arc::new(HttpHandler::new(gateway, config.max_body_bytes));
//! let app = build_router(handler, &config.cors);
//! # let _ = app;
//! # Ok(()) }
//! ```
//!
//! # Architecture
//! Business rules live in `core` as pure functions plus one orchestrator,
//! [`GatewayService`]. The outbound network sits behind the
//! [`HttpClient`] port so the orchestrator can be driven by stubs in tests;
//! `adapters` holds the hyper client, the axum handler and the CORS layer.
//!
//! # Error Handling
//! Domain errors are `thiserror` enums. Setup code returns `eyre::Result<T>`
//! with `WrapErr` context.
pub mod config;
pub mod ports;
pub mod tracing_setup;
pub mod utils;

pub mod adapters;
pub mod core;

// Re-export the specific types needed by the binary crate
pub use crate::{
    adapters::{HttpClientAdapter, HttpHandler},
    core::GatewayService,
    ports::http_client::HttpClient,
    utils::GracefulShutdown,
};
