use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use hyper::{Request, Response};
use thiserror::Error;

/// Custom error type for HTTP client operations.
///
/// Only transport level failures are errors: a backend answering with a 4xx or
/// 5xx status is a successful exchange and is returned as `Ok(response)`.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum HttpClientError {
    /// The backend could not be reached (DNS failure, refused, reset before
    /// any response was received)
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Connecting or waiting for the response exceeded its budget
    #[error("Timeout error after {0:?}")]
    Timeout(Duration),

    /// The outgoing request could not be built or sent as-is
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The connection was established but the exchange broke down (malformed
    /// response, body cut short)
    #[error("Protocol error: {0}")]
    ProtocolError(String),
}

/// Result type alias for HTTP client operations
pub type HttpClientResult<T> = Result<T, HttpClientError>;

/// HttpClient defines the port (interface) for making HTTP requests to backends
#[async_trait]
pub trait HttpClient: Send + Sync + 'static {
    /// Send a fully buffered request to a backend and collect the full response.
    ///
    /// Implementations must not follow redirects and must bound the exchange
    /// in time.
    async fn send_request(&self, req: Request<Bytes>) -> HttpClientResult<Response<Bytes>>;
}
