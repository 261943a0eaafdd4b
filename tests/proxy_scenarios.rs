// End-to-end behaviour of the gateway router against stub backends on
// ephemeral ports, using the real hyper client adapter.
use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::Request,
    http::{HeaderMap, Method, StatusCode, Uri, header},
    middleware::{self, Next},
    routing::{any, get, post},
};
use edge_gateway::{
    GatewayService, HttpClientAdapter, HttpHandler,
    adapters::build_router,
    config::{GatewayConfig, ServiceEndpoint, ServicesConfig},
    core::RouteTable,
};
use serde_json::{Value, json};
use tower::ServiceExt;

struct Harness {
    app: Router,
    backend_hits: Arc<AtomicUsize>,
}

impl Harness {
    fn hits(&self) -> usize {
        self.backend_hits.load(Ordering::SeqCst)
    }

    async fn send(&self, request: Request<Body>) -> axum::response::Response {
        self.app.clone().oneshot(request).await.unwrap()
    }
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Json<Value> {
    let header_str = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    Json(json!({
        "method": method.as_str(),
        "uri": uri.to_string(),
        "host": header_str("host"),
        "authorization": header_str("authorization"),
        "request_id": header_str("x-request-id"),
        "custom": header_str("x-custom"),
        "keep_alive": headers.contains_key("keep-alive"),
        "proxy_authorization": headers.contains_key("proxy-authorization"),
        "body": String::from_utf8_lossy(&body),
    }))
}

fn backend_router(hits: Arc<AtomicUsize>) -> Router {
    Router::new()
        .route(
            "/auth/ping",
            get(|| async {
                (
                    [
                        ("keep-alive", "timeout=5"),
                        ("access-control-allow-origin", "*"),
                        ("x-backend", "auth"),
                    ],
                    "ok",
                )
            }),
        )
        .route("/auth/echo", any(echo))
        .route(
            "/users",
            post(|| async {
                (
                    StatusCode::CONFLICT,
                    [(header::CONTENT_TYPE, "application/json")],
                    r#"{"error":"conflict"}"#,
                )
            }),
        )
        .route(
            "/events/1",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                "too late"
            }),
        )
        .route(
            "/quizzes/old",
            get(|| async { (StatusCode::FOUND, [(header::LOCATION, "/quizzes/new")]) }),
        )
        .route(
            "/geo/missing",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "geo down") }),
        )
        .layer(middleware::from_fn(move |req: Request, next: Next| {
            let hits = hits.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                next.run(req).await
            }
        }))
}

async fn spawn_backend(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// Address nothing listens on.
async fn closed_port_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

fn gateway_app(services: ServicesConfig, read_ms: u64, max_body_bytes: usize) -> Router {
    let config = GatewayConfig::builder()
        .services(services)
        .timeouts(1_000, read_ms)
        .max_body_bytes(max_body_bytes)
        .allowed_origin("https://*.example.com")
        .build();

    let routes = Arc::new(RouteTable::from_services(&config.services).unwrap());
    let client = Arc::new(HttpClientAdapter::new(&config.timeouts).unwrap());
    let gateway = Arc::new(GatewayService::new(routes, client));
    let handler = Arc::new(HttpHandler::new(gateway, config.max_body_bytes));
    build_router(handler, &config.cors)
}

async fn harness_with(read_ms: u64, max_body_bytes: usize) -> Harness {
    let backend_hits = Arc::new(AtomicUsize::new(0));
    let base_url = spawn_backend(backend_router(backend_hits.clone())).await;
    let endpoint = ServiceEndpoint::new(base_url);
    let services = ServicesConfig {
        auth: endpoint.clone(),
        user: endpoint.clone(),
        event: endpoint.clone(),
        quiz: endpoint.clone(),
        geo: endpoint,
    };

    Harness {
        app: gateway_app(services, read_ms, max_body_bytes),
        backend_hits,
    }
}

async fn harness() -> Harness {
    harness_with(5_000, 1024 * 1024).await
}

async fn body_bytes(response: axum::response::Response) -> Bytes {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_get_is_relayed_without_hop_by_hop_headers() {
    let harness = harness().await;

    let response = harness
        .send(
            Request::builder()
                .uri("/auth/ping?x=1")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers().clone();
    assert_eq!(headers.get("x-backend").unwrap(), "auth");
    for hop in ["connection", "keep-alive", "transfer-encoding"] {
        assert!(!headers.contains_key(hop), "{hop} leaked to client");
    }
    // No Origin on the request: no CORS header at all, backend's one dropped.
    assert!(!headers.contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    assert_eq!(body_bytes(response).await.as_ref(), b"ok");
    assert_eq!(harness.hits(), 1);
}

#[tokio::test]
async fn test_request_reaches_backend_sanitized() {
    let harness = harness().await;

    let response = harness
        .send(
            Request::builder()
                .method(Method::PUT)
                .uri("/auth/echo?y=a%20b&z=")
                .header(header::HOST, "gateway.example.com")
                .header(header::AUTHORIZATION, "Bearer token-1")
                .header("keep-alive", "timeout=5")
                .header("proxy-authorization", "Basic Zm9v")
                .header("x-custom", "kept")
                .body(Body::from("payload"))
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let request_id = response
        .headers()
        .get("x-request-id")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    let seen: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();

    assert_eq!(seen["method"], "PUT");
    assert_eq!(seen["uri"], "/auth/echo?y=a%20b&z=");
    assert_eq!(seen["authorization"], "Bearer token-1");
    assert_eq!(seen["custom"], "kept");
    assert_eq!(seen["request_id"], request_id.as_str());
    assert_eq!(seen["keep_alive"], false);
    assert_eq!(seen["proxy_authorization"], false);
    assert_ne!(seen["host"], "gateway.example.com");
    assert_eq!(seen["body"], "payload");
}

#[tokio::test]
async fn test_unknown_path_is_404_without_backend_call() {
    let harness = harness().await;

    let response = harness
        .send(
            Request::builder()
                .uri("/unknown/path")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(harness.hits(), 0);
}

#[tokio::test]
async fn test_slow_backend_is_504() {
    let harness = harness_with(200, 1024).await;

    let response = harness
        .send(
            Request::builder()
                .uri("/events/1")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
}

#[tokio::test]
async fn test_backend_error_status_and_body_passed_through() {
    let harness = harness().await;

    let response = harness
        .send(
            Request::builder()
                .method(Method::POST)
                .uri("/users")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"name":"ada"}"#))
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );
    assert_eq!(
        body_bytes(response).await.as_ref(),
        br#"{"error":"conflict"}"#
    );

    let response = harness
        .send(
            Request::builder()
                .uri("/geo/missing")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_bytes(response).await.as_ref(), b"geo down");
}

#[tokio::test]
async fn test_trace_is_405_without_backend_call() {
    let harness = harness().await;

    let response = harness
        .send(
            Request::builder()
                .method(Method::TRACE)
                .uri("/auth/ping")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert!(response.headers().contains_key(header::ALLOW));
    assert_eq!(harness.hits(), 0);
}

#[tokio::test]
async fn test_unreachable_backend_is_502() {
    let endpoint = ServiceEndpoint::new(closed_port_url().await);
    let services = ServicesConfig {
        user: endpoint,
        ..ServicesConfig::default()
    };
    let app = gateway_app(services, 2_000, 1024);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/users/1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_redirect_is_not_followed() {
    let harness = harness().await;

    let response = harness
        .send(
            Request::builder()
                .uri("/quizzes/old")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "/quizzes/new"
    );
    assert_eq!(harness.hits(), 1);
}

#[tokio::test]
async fn test_preflight_answered_at_edge() {
    let harness = harness().await;

    let response = harness
        .send(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/events/1")
                .header(header::ORIGIN, "https://app.example.com")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "DELETE")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert!(response.status().is_success());
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "https://app.example.com"
    );
    assert_eq!(harness.hits(), 0);
}

#[tokio::test]
async fn test_plain_options_is_forwarded() {
    let harness = harness().await;

    let response = harness
        .send(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/auth/echo")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let seen: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(seen["method"], "OPTIONS");
    assert_eq!(harness.hits(), 1);
}

#[tokio::test]
async fn test_plain_options_on_unknown_path_is_404() {
    let harness = harness().await;

    let response = harness
        .send(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/unknown/path")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(harness.hits(), 0);
}

#[tokio::test]
async fn test_single_allow_origin_on_cross_origin_response() {
    let harness = harness().await;

    let response = harness
        .send(
            Request::builder()
                .uri("/auth/ping")
                .header(header::ORIGIN, "http://localhost:4200")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let values: Vec<_> = response
        .headers()
        .get_all(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .iter()
        .collect();
    assert_eq!(values, vec!["http://localhost:4200"]);
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS)
            .unwrap(),
        "true"
    );
}

#[tokio::test]
async fn test_oversized_body_is_413() {
    let harness = harness_with(5_000, 8).await;

    let response = harness
        .send(
            Request::builder()
                .method(Method::POST)
                .uri("/users")
                .body(Body::from("definitely more than eight bytes"))
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(harness.hits(), 0);
}

#[tokio::test]
async fn test_health_answered_locally() {
    let harness = harness().await;

    let response = harness
        .send(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let health: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["routes"], 7);
    assert_eq!(harness.hits(), 0);
}
