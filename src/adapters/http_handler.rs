use std::{error::Error as StdError, sync::Arc};

use axum::{
    Router,
    body::Body as AxumBody,
    extract::Request,
    http::{HeaderValue, Method, StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::any,
};
use http_body_util::LengthLimitError;

use crate::{
    adapters::{
        cors::with_edge_cors,
        middleware::{request_id_middleware, request_timing_middleware},
    },
    config::CorsConfig,
    core::{
        GatewayService,
        transcoder::{InboundRequest, OutboundResult, SUPPORTED_METHODS},
    },
};

/// Local liveness endpoint; not part of any proxied path family.
pub const HEALTH_PATH: &str = "/health";

/// HTTP handler bridging axum requests to the [`GatewayService`].
#[derive(Clone)]
pub struct HttpHandler {
    gateway_service: Arc<GatewayService>,
    max_body_bytes: usize,
}

impl HttpHandler {
    pub fn new(gateway_service: Arc<GatewayService>, max_body_bytes: usize) -> Self {
        Self {
            gateway_service,
            max_body_bytes,
        }
    }

    /// Main request handler: answers the health probe locally and proxies
    /// everything else.
    pub async fn handle_request(&self, req: Request) -> Response {
        if req.uri().path() == HEALTH_PATH && req.method() == Method::GET {
            return self.handle_health_check();
        }

        let (parts, body) = req.into_parts();
        let body = match axum::body::to_bytes(body, self.max_body_bytes).await {
            Ok(bytes) => bytes,
            Err(e) if is_length_limit(&e) => {
                tracing::warn!(
                    path = %parts.uri.path(),
                    limit = self.max_body_bytes,
                    "Request body exceeds limit"
                );
                return plain_response(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large");
            }
            Err(e) => {
                tracing::warn!(path = %parts.uri.path(), "Failed to read request body: {}", e);
                return plain_response(StatusCode::BAD_REQUEST, "Failed to read request body");
            }
        };

        let inbound = InboundRequest::from_parts(&parts, body);
        let result = self.gateway_service.forward(inbound).await;

        tracing::debug!(
            http.method = %parts.method,
            http.path = %parts.uri.path(),
            outcome = result.kind(),
            http.status_code = result.status().as_u16(),
            "Proxy outcome"
        );

        result.into_response()
    }

    fn handle_health_check(&self) -> Response {
        let health_data = serde_json::json!({
            "status": "ok",
            "routes": self.gateway_service.routes().prefix_count(),
            "timestamp": chrono::Utc::now().to_rfc3339()
        });

        (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            health_data.to_string(),
        )
            .into_response()
    }
}

impl IntoResponse for OutboundResult {
    fn into_response(self) -> Response {
        match self {
            OutboundResult::Forwarded {
                status,
                headers,
                body,
            } => {
                let mut response = Response::new(AxumBody::from(body));
                *response.status_mut() = status;
                *response.headers_mut() = headers;
                response
            }
            OutboundResult::NotFound => plain_response(StatusCode::NOT_FOUND, "No route for path"),
            OutboundResult::MethodNotSupported => {
                let mut response =
                    plain_response(StatusCode::METHOD_NOT_ALLOWED, "Method not supported");
                if let Ok(allow) = HeaderValue::from_str(&allowed_methods()) {
                    response.headers_mut().insert(header::ALLOW, allow);
                }
                response
            }
            OutboundResult::UpstreamTimeout => {
                plain_response(StatusCode::GATEWAY_TIMEOUT, "Backend timed out")
            }
            OutboundResult::UpstreamUnreachable => {
                plain_response(StatusCode::BAD_GATEWAY, "Backend request failed")
            }
        }
    }
}

/// Routes sending every path and method to `handler`, without CORS or
/// middleware.
pub fn proxy_routes(handler: Arc<HttpHandler>) -> Router {
    let make_request_route = |handler: Arc<HttpHandler>| {
        any(move |req: Request| {
            let handler = handler.clone();
            async move { handler.handle_request(req).await }
        })
    };

    Router::new()
        .route("/", make_request_route(handler.clone()))
        .route("/{*path}", make_request_route(handler))
}

/// Full edge router: proxy routes wrapped by the CORS policy, request id and
/// timing middleware (outermost last).
pub fn build_router(handler: Arc<HttpHandler>, cors: &CorsConfig) -> Router {
    with_edge_cors(proxy_routes(handler), cors)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(middleware::from_fn(request_timing_middleware))
}

fn plain_response(status: StatusCode, message: &'static str) -> Response {
    (status, message).into_response()
}

fn allowed_methods() -> String {
    SUPPORTED_METHODS
        .iter()
        .map(Method::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn is_length_limit(error: &axum::Error) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(error);
    while let Some(err) = current {
        if err.is::<LengthLimitError>() {
            return true;
        }
        current = err.source();
    }
    false
}
