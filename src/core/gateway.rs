//! Core gateway orchestration service.
//!
//! `GatewayService` composes the pure building blocks of the proxy:
//! * route lookup ([`RouteTable::resolve`])
//! * method validation and request transcoding ([`crate::core::transcoder`])
//! * header sanitation on both legs ([`crate::core::headers`])
//!
//! The only I/O happens behind the [`HttpClient`] port, so the orchestration
//! can be exercised with a stub client in tests. Routing and method failures
//! are decided before any network call is attempted.
use std::sync::Arc;

use crate::{
    core::{
        routing::RouteTable,
        transcoder::{
            InboundRequest, OutboundResult, build_outbound_request, forwarded_from_response,
            is_supported_method,
        },
    },
    ports::http_client::{HttpClient, HttpClientError},
};

/// Central orchestrator turning an [`InboundRequest`] into an
/// [`OutboundResult`]. Cheap to share: the route table and client live behind
/// `Arc`s and are never mutated.
pub struct GatewayService {
    routes: Arc<RouteTable>,
    http_client: Arc<dyn HttpClient>,
}

impl GatewayService {
    pub fn new(routes: Arc<RouteTable>, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            routes,
            http_client,
        }
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Forward one request to the backend owning its path.
    ///
    /// A single attempt is made. Backend error statuses come back as
    /// [`OutboundResult::Forwarded`]; only transport failures are mapped to
    /// gateway outcomes.
    pub async fn forward(&self, inbound: InboundRequest) -> OutboundResult {
        let Some(base_url) = self.routes.resolve(&inbound.path) else {
            tracing::debug!(path = %inbound.path, "No route matches path");
            return OutboundResult::NotFound;
        };

        if !is_supported_method(&inbound.method) {
            tracing::debug!(method = %inbound.method, path = %inbound.path, "Unsupported method");
            return OutboundResult::MethodNotSupported;
        }

        let request = match build_outbound_request(base_url, inbound) {
            Ok(request) => request,
            Err(e) => {
                tracing::error!("Failed to build backend request: {}", e);
                return OutboundResult::UpstreamUnreachable;
            }
        };

        match self.http_client.send_request(request).await {
            Ok(response) => forwarded_from_response(response),
            Err(e) => Self::map_client_error(base_url, e),
        }
    }

    fn map_client_error(base_url: &str, error: HttpClientError) -> OutboundResult {
        match error {
            HttpClientError::Timeout(budget) => {
                tracing::warn!(backend = %base_url, ?budget, "Backend timed out");
                OutboundResult::UpstreamTimeout
            }
            HttpClientError::ConnectionError(reason) => {
                tracing::warn!(backend = %base_url, %reason, "Backend unreachable");
                OutboundResult::UpstreamUnreachable
            }
            HttpClientError::ProtocolError(reason) => {
                tracing::warn!(backend = %base_url, %reason, "Backend exchange failed");
                OutboundResult::UpstreamUnreachable
            }
            HttpClientError::InvalidRequest(reason) => {
                tracing::error!(
                    backend = %base_url,
                    %reason,
                    "Backend request rejected by client"
                );
                OutboundResult::UpstreamUnreachable
            }
        }
    }
}
