use std::net::SocketAddr;
use std::time::Duration;

use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};

/// Prefix of every configuration environment variable (`DEVICE_FORWARDER_LOG_LEVEL`, ...).
pub const ENV_PREFIX: &str = "DEVICE_FORWARDER";

/// Port used when neither a bind address nor `PORT` is set.
pub const DEFAULT_PORT: u16 = 8080;

/// Runtime settings. The GitHub credential is not part of this struct; it is
/// loaded separately from its own fixed variable.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Explicit listen address, e.g. `0.0.0.0:8080`. Overrides `PORT`.
    #[serde(default)]
    pub bind_address: Option<String>,

    /// GitHub REST API root
    #[serde(default = "default_github_api_url")]
    pub github_api_url: String,

    /// Timeout for the dispatch request in seconds; 0 (the default) leaves it
    /// to the hosting platform's invocation limit
    #[serde(default)]
    pub http_timeout_secs: u64,

    /// Service name reported to OpenTelemetry
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Export spans over OTLP
    #[serde(default)]
    pub otel_enabled: bool,

    /// OTLP gRPC endpoint
    #[serde(default = "default_otel_endpoint")]
    pub otel_endpoint: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_github_api_url() -> String {
    github::GITHUB_API_URL.to_string()
}

fn default_service_name() -> String {
    "device-forwarder".to_string()
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

impl ServiceConfig {
    /// Loads configuration from `DEVICE_FORWARDER_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_environment(Environment::with_prefix(ENV_PREFIX))
    }

    fn from_environment(environment: Environment) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(environment.try_parsing(true))
            .build()?
            .try_deserialize()
    }

    /// Request timeout for the GitHub client, `None` when disabled.
    pub fn http_timeout(&self) -> Option<Duration> {
        (self.http_timeout_secs > 0).then(|| Duration::from_secs(self.http_timeout_secs))
    }

    /// Resolves the address to listen on.
    ///
    /// `bind_address` wins; otherwise `port` (the platform's `PORT` variable)
    /// is used on all interfaces, falling back to [`DEFAULT_PORT`] when unset
    /// or unparsable.
    pub fn listen_address(&self, port: Option<&str>) -> Result<SocketAddr, ConfigError> {
        if let Some(addr) = &self.bind_address {
            return addr.parse().map_err(|err| {
                ConfigError::Message(format!("invalid bind_address '{addr}': {err}"))
            });
        }

        let port = port
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);
        Ok(([0, 0, 0, 0], port).into())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
