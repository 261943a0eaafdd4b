//! Configuration data structures for the edge gateway.
//!
//! These types map directly to TOML (also JSON / YAML) configuration files and
//! to `GATEWAY__*` environment variables. Every field has a default so that an
//! empty file, or no file at all, yields a runnable development setup.
use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_max_body_bytes() -> usize {
    16 * 1024 * 1024
}

/// Base URL of one backend service.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    pub base_url: String,
}

impl ServiceEndpoint {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

/// Backend services the gateway fronts, one per route family.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ServicesConfig {
    pub auth: ServiceEndpoint,
    pub user: ServiceEndpoint,
    pub event: ServiceEndpoint,
    pub quiz: ServiceEndpoint,
    pub geo: ServiceEndpoint,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            auth: ServiceEndpoint::new("http://localhost:8081"),
            user: ServiceEndpoint::new("http://localhost:8082"),
            event: ServiceEndpoint::new("http://localhost:8083"),
            quiz: ServiceEndpoint::new("http://localhost:8084"),
            geo: ServiceEndpoint::new("http://localhost:8085"),
        }
    }
}

impl ServicesConfig {
    /// `(name, endpoint)` pairs, mainly for validation and logging.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &ServiceEndpoint)> {
        [
            ("auth", &self.auth),
            ("user", &self.user),
            ("event", &self.event),
            ("quiz", &self.quiz),
            ("geo", &self.geo),
        ]
        .into_iter()
    }
}

/// Outbound timeout budget in milliseconds.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Maximum time to establish a backend connection
    pub connect_ms: u64,
    /// Maximum time for the whole backend exchange (response head and body)
    pub read_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: 2_000,
            read_ms: 10_000,
        }
    }
}

impl TimeoutConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_ms)
    }
}

/// Edge CORS policy. The development origins are always allowed in addition
/// to `allowed_origins`.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct CorsConfig {
    /// Extra origin patterns; `*` matches any run of characters
    pub allowed_origins: Vec<String>,
    /// Preflight cache lifetime
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            max_age_secs: 3600,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is not set
    pub level: String,
    /// Emit JSON lines instead of human readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct GatewayConfig {
    pub listen_addr: String,
    /// Largest request body buffered for forwarding
    pub max_body_bytes: usize,
    pub services: ServicesConfig,
    pub timeouts: TimeoutConfig,
    pub cors: CorsConfig,
    pub logging: LoggingConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            max_body_bytes: default_max_body_bytes(),
            services: ServicesConfig::default(),
            timeouts: TimeoutConfig::default(),
            cors: CorsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Create a new gateway configuration builder
    pub fn builder() -> GatewayConfigBuilder {
        GatewayConfigBuilder::default()
    }
}

/// Builder for GatewayConfig, convenient in tests and embedding code.
#[derive(Default)]
pub struct GatewayConfigBuilder {
    config: GatewayConfig,
}

impl GatewayConfigBuilder {
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.config.max_body_bytes = limit;
        self
    }

    pub fn services(mut self, services: ServicesConfig) -> Self {
        self.config.services = services;
        self
    }

    pub fn timeouts(mut self, connect_ms: u64, read_ms: u64) -> Self {
        self.config.timeouts = TimeoutConfig {
            connect_ms,
            read_ms,
        };
        self
    }

    /// Add one allowed origin pattern to the CORS policy.
    pub fn allowed_origin(mut self, pattern: impl Into<String>) -> Self {
        self.config.cors.allowed_origins.push(pattern.into());
        self
    }

    pub fn build(self) -> GatewayConfig {
        self.config
    }
}
