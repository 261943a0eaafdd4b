use std::net::SocketAddr;

use url::Url;

use crate::{
    config::models::{CorsConfig, GatewayConfig, TimeoutConfig},
    core::routing::RouteTable,
};

/// Validation result type alias
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validation error types
#[derive(Debug, thiserror::Error, Clone)]
pub enum ValidationError {
    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Invalid listen address '{address}': {reason}")]
    InvalidListenAddress { address: String, reason: String },

    #[error("Route conflict detected: {message}")]
    RouteConflict { message: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },
}

/// Gateway configuration validator
pub struct GatewayConfigValidator;

impl GatewayConfigValidator {
    /// Validate the entire gateway configuration, reporting every problem at
    /// once.
    pub fn validate(config: &GatewayConfig) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = Self::validate_listen_address(&config.listen_addr) {
            errors.push(e);
        }

        for (name, endpoint) in config.services.iter() {
            if let Err(e) = Self::validate_base_url(&endpoint.base_url, name) {
                errors.push(e);
            }
        }

        if config.max_body_bytes == 0 {
            errors.push(ValidationError::InvalidField {
                field: "max_body_bytes".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        errors.extend(Self::validate_timeouts(&config.timeouts));
        errors.extend(Self::validate_cors(&config.cors));

        if let Err(e) = RouteTable::from_services(&config.services) {
            errors.push(ValidationError::RouteConflict {
                message: e.to_string(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::ValidationFailed {
                message: Self::format_multiple_errors(errors),
            })
        }
    }

    fn validate_listen_address(address: &str) -> ValidationResult<()> {
        if address.parse::<SocketAddr>().is_err() {
            return Err(ValidationError::InvalidListenAddress {
                address: address.to_string(),
                reason: "Must be in format 'IP:PORT' (e.g., '127.0.0.1:3000' or '0.0.0.0:8080')"
                    .to_string(),
            });
        }
        Ok(())
    }

    fn validate_base_url(base_url: &str, service: &str) -> ValidationResult<()> {
        let field = format!("services.{service}.base_url");
        let url = Url::parse(base_url).map_err(|e| ValidationError::InvalidField {
            field: field.clone(),
            message: format!("'{base_url}' is not a valid URL: {e}"),
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ValidationError::InvalidField {
                field,
                message: format!("'{base_url}' must use http:// or https://"),
            });
        }
        if url.host_str().is_none() {
            return Err(ValidationError::InvalidField {
                field,
                message: format!("'{base_url}' has no host"),
            });
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(ValidationError::InvalidField {
                field,
                message: format!("'{base_url}' must not carry a query or fragment"),
            });
        }
        Ok(())
    }

    fn validate_timeouts(timeouts: &TimeoutConfig) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if timeouts.connect_ms == 0 {
            errors.push(ValidationError::InvalidField {
                field: "timeouts.connect_ms".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }
        if timeouts.read_ms == 0 {
            errors.push(ValidationError::InvalidField {
                field: "timeouts.read_ms".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }
        errors
    }

    fn validate_cors(cors: &CorsConfig) -> Vec<ValidationError> {
        cors.allowed_origins
            .iter()
            .enumerate()
            .filter(|(_, pattern)| pattern.trim().is_empty())
            .map(|(index, _)| ValidationError::InvalidField {
                field: format!("cors.allowed_origins[{index}]"),
                message: "Origin pattern must not be empty".to_string(),
            })
            .collect()
    }

    fn format_multiple_errors(errors: Vec<ValidationError>) -> String {
        errors
            .iter()
            .enumerate()
            .map(|(index, error)| format!("  {}. {}", index + 1, error))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
