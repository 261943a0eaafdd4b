use std::{error::Error as StdError, io, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use eyre::Result;
use http_body_util::{BodyExt, Full};
use hyper::{Request, Response, Version};
use hyper_rustls::HttpsConnector;
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use rustls_native_certs::load_native_certs;
use tokio::time::timeout;
use tracing::Instrument;

use crate::{
    config::TimeoutConfig,
    ports::http_client::{HttpClient, HttpClientError, HttpClientResult},
    tracing_setup::create_backend_span,
};

/// HTTP client adapter using Hyper with Rustls (HTTP/1.1, plain or TLS).
///
/// Responsibilities:
/// * Bounds connection setup with a connect timeout
/// * Bounds the whole exchange (response head and body) with a read timeout
/// * Never follows redirects; a 3xx is returned like any other response
/// * Classifies transport failures into [`HttpClientError`] kinds
///
/// Retries are deliberately absent: request bodies are not guaranteed to be
/// safe to replay.
pub struct HttpClientAdapter {
    client: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl HttpClientAdapter {
    /// Create a new HTTP client adapter with the given timeout budget.
    pub fn new(timeouts: &TimeoutConfig) -> Result<Self> {
        // Install default crypto provider for rustls if not already set
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

        let connect_timeout = timeouts.connect_timeout();
        let read_timeout = timeouts.read_timeout();

        let mut http_connector = HttpConnector::new();
        http_connector.enforce_http(false); // Allow HTTPS URLs
        http_connector.set_connect_timeout(Some(connect_timeout));

        let mut root_cert_store = rustls::RootCertStore::empty();
        let native_certs = load_native_certs();

        if !native_certs.certs.is_empty() {
            for cert in native_certs.certs {
                if root_cert_store.add(cert).is_err() {
                    tracing::warn!("Failed to add native certificate to rustls RootCertStore");
                }
            }
            tracing::debug!("Loaded {} native root certificates.", root_cert_store.len());
        }

        if !native_certs.errors.is_empty() {
            tracing::warn!(
                "Some native certificates failed to load: {:?}",
                native_certs.errors
            );
        }

        let tls_config = rustls::ClientConfig::builder()
            .with_root_certificates(root_cert_store)
            .with_no_client_auth();

        let https_connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_tls_config(tls_config)
            .https_or_http()
            .enable_http1()
            .wrap_connector(http_connector);

        let client = Client::builder(TokioExecutor::new()).build::<_, Full<Bytes>>(https_connector);

        tracing::info!(
            connect_timeout_ms = connect_timeout.as_millis() as u64,
            read_timeout_ms = read_timeout.as_millis() as u64,
            "Created backend HTTP client"
        );
        Ok(Self {
            client,
            connect_timeout,
            read_timeout,
        })
    }

    /// Map a hyper-util client error onto the gateway's transport taxonomy.
    fn classify_error(&self, error: &hyper_util::client::legacy::Error) -> HttpClientError {
        if has_timed_out(error) {
            return HttpClientError::Timeout(self.connect_timeout);
        }
        if error.is_connect() {
            return HttpClientError::ConnectionError(describe(error));
        }
        HttpClientError::ProtocolError(describe(error))
    }
}

#[async_trait]
impl HttpClient for HttpClientAdapter {
    async fn send_request(&self, req: Request<Bytes>) -> HttpClientResult<Response<Bytes>> {
        if req.uri().host().is_none() {
            tracing::error!("Outgoing URI has no host: {}", req.uri());
            return Err(HttpClientError::InvalidRequest(
                "Outgoing URI has no host".to_string(),
            ));
        }

        let backend_identifier = format!(
            "{}://{}",
            req.uri().scheme_str().unwrap_or("http"),
            req.uri()
                .authority()
                .map_or_else(|| "unknown".to_string(), |a| a.to_string())
        );

        let span = create_backend_span(
            &backend_identifier,
            req.method().as_str(),
            req.uri().path(),
        );

        let (mut parts, body) = req.into_parts();
        parts.version = Version::HTTP_11;
        let outgoing_request = Request::from_parts(parts, Full::new(body));

        tracing::debug!(
            "Sending request: {} {}",
            outgoing_request.method(),
            outgoing_request.uri()
        );

        let exchange = async {
            let response = self
                .client
                .request(outgoing_request)
                .await
                .map_err(|e| self.classify_error(&e))?;

            let (parts, body) = response.into_parts();
            let body = body
                .collect()
                .await
                .map_err(|e| HttpClientError::ProtocolError(describe(&e)))?
                .to_bytes();
            Ok::<_, HttpClientError>(Response::from_parts(parts, body))
        };

        match timeout(self.read_timeout, exchange)
            .instrument(span.clone())
            .await
        {
            Ok(Ok(response)) => {
                span.record("http.status_code", response.status().as_u16());
                Ok(response)
            }
            Ok(Err(e)) => {
                span.record("http.status_code", 599u16);
                tracing::debug!("Request to {} failed: {}", backend_identifier, e);
                Err(e)
            }
            Err(_) => {
                span.record("http.status_code", 599u16);
                tracing::debug!(
                    "Request to {} exceeded read timeout of {:?}",
                    backend_identifier,
                    self.read_timeout
                );
                Err(HttpClientError::Timeout(self.read_timeout))
            }
        }
    }
}

/// Walk the error source chain looking for an I/O timeout.
fn has_timed_out(error: &(dyn StdError + 'static)) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(error);
    while let Some(err) = current {
        if err
            .downcast_ref::<io::Error>()
            .is_some_and(|io_err| io_err.kind() == io::ErrorKind::TimedOut)
        {
            return true;
        }
        current = err.source();
    }
    false
}

/// Flatten an error and its sources into one line.
fn describe(error: &(dyn StdError + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(err) = source {
        message.push_str(": ");
        message.push_str(&err.to_string());
        source = err.source();
    }
    message
}
