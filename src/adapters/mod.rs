pub mod cors;
pub mod http_client;
pub mod http_handler;
pub mod middleware;

/// Re-export commonly used types from adapters
pub use cors::with_edge_cors;
pub use http_client::HttpClientAdapter;
pub use http_handler::{HttpHandler, build_router};
pub use middleware::*;
