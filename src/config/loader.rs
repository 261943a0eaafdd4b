use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use eyre::{Context, Result};

use crate::config::models::GatewayConfig;

/// Prefix of environment variables overriding file settings, e.g.
/// `GATEWAY__SERVICES__AUTH__BASE_URL`.
pub const ENV_PREFIX: &str = "GATEWAY";

/// Commented configuration written by `edge-gateway init`; mirrors the
/// built-in defaults.
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# Edge gateway configuration
# Every key can be overridden with GATEWAY__SECTION__KEY environment variables,
# e.g. GATEWAY__SERVICES__AUTH__BASE_URL=http://auth:8081

listen_addr = "0.0.0.0:8080"

# Largest request body buffered before forwarding (bytes)
max_body_bytes = 16777216

# /auth/**
[services.auth]
base_url = "http://localhost:8081"

# /users/**, /internal/users/**
[services.user]
base_url = "http://localhost:8082"

# /events/**
[services.event]
base_url = "http://localhost:8083"

# /quizzes/**
[services.quiz]
base_url = "http://localhost:8084"

# /api/geo/**, /geo/**
[services.geo]
base_url = "http://localhost:8085"

[timeouts]
connect_ms = 2000
read_ms = 10000

# http://localhost:4200 and http://127.0.0.1:4200 are always allowed.
# Patterns may use '*', e.g. "https://*.example.com".
[cors]
allowed_origins = []
max_age_secs = 3600

[logging]
level = "info"
json = false
"#;

/// Load configuration from an optional file layered under `GATEWAY__*`
/// environment variables. A missing file is not an error: built-in defaults
/// and the environment still apply.
pub async fn load_config(config_path: &str) -> Result<GatewayConfig> {
    load_config_sync(config_path)
}

/// Load configuration synchronously
pub fn load_config_sync(config_path: &str) -> Result<GatewayConfig> {
    load_config_with_env(config_path, environment_source())
}

/// Environment source used for overrides. `cors.allowed_origins` accepts a
/// comma-separated list.
pub fn environment_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("cors.allowed_origins")
        .try_parsing(true)
}

fn load_config_with_env(config_path: &str, environment: Environment) -> Result<GatewayConfig> {
    let path = Path::new(config_path);

    // Determine file format based on extension
    let format = match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml") | Some("yml") => FileFormat::Yaml,
        Some("json") => FileFormat::Json,
        _ => FileFormat::Toml,
    };

    let settings = Config::builder()
        .add_source(
            File::new(
                path.to_str()
                    .ok_or_else(|| eyre::eyre!("Invalid UTF-8 path: {}", path.display()))?,
                format,
            )
            .required(false),
        )
        .add_source(environment)
        .build()
        .with_context(|| format!("Failed to build config from {}", path.display()))?;

    let gateway_config: GatewayConfig = settings
        .try_deserialize()
        .with_context(|| format!("Failed to deserialize config from {}", path.display()))?;

    Ok(gateway_config)
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, io::Write};

    use tempfile::NamedTempFile;

    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> Environment {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        environment_source().source(Some(map))
    }

    #[tokio::test]
    async fn test_load_toml_config() {
        let toml_content = r#"
listen_addr = "127.0.0.1:3000"

[services.auth]
base_url = "http://auth-service:8080/"

[services.geo]
base_url = "http://geo-service:8080"

[timeouts]
connect_ms = 500
read_ms = 1500

[cors]
allowed_origins = ["https://app.example.com"]
"#;

        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        write!(temp_file, "{}", toml_content).unwrap();

        let config = load_config(temp_file.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:3000");
        assert_eq!(config.services.auth.base_url, "http://auth-service:8080/");
        assert_eq!(config.services.user.base_url, "http://localhost:8082");
        assert_eq!(config.timeouts.connect_ms, 500);
        assert_eq!(config.cors.allowed_origins, vec!["https://app.example.com"]);
    }

    #[tokio::test]
    async fn test_load_yaml_config() {
        let yaml_content = r#"
listen_addr: "127.0.0.1:3000"
services:
  event:
    base_url: "http://event-service:8080"
"#;

        let mut temp_file = NamedTempFile::with_suffix(".yaml").unwrap();
        write!(temp_file, "{}", yaml_content).unwrap();

        let config = load_config(temp_file.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(config.services.event.base_url, "http://event-service:8080");
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config =
            load_config_with_env("/nonexistent/gateway.toml", env_from(&[])).unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.services.quiz.base_url, "http://localhost:8084");
    }

    #[test]
    fn test_environment_overrides_file() {
        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        write!(
            temp_file,
            "[services.auth]\nbase_url = \"http://from-file:1\"\n"
        )
        .unwrap();

        let config = load_config_with_env(
            temp_file.path().to_str().unwrap(),
            env_from(&[
                ("GATEWAY__SERVICES__AUTH__BASE_URL", "http://from-env:2"),
                ("GATEWAY__TIMEOUTS__READ_MS", "250"),
                (
                    "GATEWAY__CORS__ALLOWED_ORIGINS",
                    "https://a.example.com,https://*.b.example.com",
                ),
            ]),
        )
        .unwrap();

        assert_eq!(config.services.auth.base_url, "http://from-env:2");
        assert_eq!(config.timeouts.read_ms, 250);
        assert_eq!(
            config.cors.allowed_origins,
            vec!["https://a.example.com", "https://*.b.example.com"]
        );
    }

    #[test]
    fn test_default_template_matches_builtin_defaults() {
        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        write!(temp_file, "{}", DEFAULT_CONFIG_TEMPLATE).unwrap();

        let config =
            load_config_with_env(temp_file.path().to_str().unwrap(), env_from(&[])).unwrap();
        let defaults = GatewayConfig::default();
        assert_eq!(config.listen_addr, defaults.listen_addr);
        assert_eq!(config.max_body_bytes, defaults.max_body_bytes);
        assert_eq!(config.timeouts, defaults.timeouts);
        let pairs = config.services.iter().zip(defaults.services.iter());
        for ((name, from_file), (_, builtin)) in pairs {
            assert_eq!(from_file, builtin, "service {name}");
        }
        assert!(config.cors.allowed_origins.is_empty());
    }
}
