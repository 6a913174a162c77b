//! Exporter configuration.
//!
//! A plain settings struct the hosting pipeline deserializes and hands to
//! the exporters. Defaults match the Arc backend conventions: database
//! "default", traces in "distributed_traces", logs in "logs". Metrics have
//! no single measurement name because each metric is routed to its own
//! measurement (see [`crate::metrics`]).

use serde::Deserialize;
use thiserror::Error;

use crate::error::Signal;

const DEFAULT_DATABASE: &str = "default";
const DEFAULT_TRACES_MEASUREMENT: &str = "distributed_traces";
const DEFAULT_LOGS_MEASUREMENT: &str = "logs";
/// Timeout for a single write request, in seconds.
const DEFAULT_FLUSH_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("endpoint is required")]
    MissingEndpoint,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the Arc API, e.g. "https://arc.example.com:8000".
    pub endpoint: String,
    /// Optional bearer token sent as `Authorization: Bearer <token>`.
    pub auth_token: Option<String>,
    /// Database every signal writes to unless overridden below.
    pub database: String,
    pub traces_database: Option<String>,
    pub metrics_database: Option<String>,
    pub logs_database: Option<String>,
    pub traces_measurement: String,
    pub logs_measurement: String,
    /// Adds `_monotonic` / `_aggregation_temporality` labels to sum points
    /// and switches the field-role labels to their underscore-prefixed
    /// variants. Off by default; this is verbose internal metadata.
    pub include_metric_metadata: bool,
    /// Timeout for each write request, in seconds.
    pub flush_timeout: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            endpoint: String::new(),
            auth_token: None,
            database: DEFAULT_DATABASE.to_string(),
            traces_database: None,
            metrics_database: None,
            logs_database: None,
            traces_measurement: DEFAULT_TRACES_MEASUREMENT.to_string(),
            logs_measurement: DEFAULT_LOGS_MEASUREMENT.to_string(),
            include_metric_metadata: false,
            flush_timeout: DEFAULT_FLUSH_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Checks required fields and normalizes the endpoint. Empty strings for
    /// defaulted fields are replaced so a partially-filled deserialized
    /// config behaves like the documented defaults.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.endpoint.is_empty() {
            return Err(ConfigError::MissingEndpoint);
        }
        while self.endpoint.ends_with('/') {
            self.endpoint.pop();
        }
        if self.database.is_empty() {
            self.database = DEFAULT_DATABASE.to_string();
        }
        if self.traces_measurement.is_empty() {
            self.traces_measurement = DEFAULT_TRACES_MEASUREMENT.to_string();
        }
        if self.logs_measurement.is_empty() {
            self.logs_measurement = DEFAULT_LOGS_MEASUREMENT.to_string();
        }
        Ok(())
    }

    /// Database a signal routes to: per-signal override, else the global one.
    pub fn database_for(&self, signal: Signal) -> &str {
        let overridden = match signal {
            Signal::Traces => self.traces_database.as_deref(),
            Signal::Metrics => self.metrics_database.as_deref(),
            Signal::Logs => self.logs_database.as_deref(),
        };
        overridden.unwrap_or(&self.database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.database, "default");
        assert_eq!(config.traces_measurement, "distributed_traces");
        assert_eq!(config.logs_measurement, "logs");
        assert_eq!(config.flush_timeout, 30);
        assert!(!config.include_metric_metadata);
        assert!(config.auth_token.is_none());
    }

    #[test]
    fn test_validate_requires_endpoint() {
        let mut config = Config::default();
        assert_eq!(config.validate(), Err(ConfigError::MissingEndpoint));
    }

    #[test]
    fn test_validate_strips_trailing_slashes() {
        let mut config = Config {
            endpoint: "http://localhost:8000//".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.endpoint, "http://localhost:8000");
    }

    #[test]
    fn test_validate_refills_emptied_defaults() {
        let mut config = Config {
            endpoint: "http://localhost:8000".to_string(),
            database: String::new(),
            traces_measurement: String::new(),
            logs_measurement: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.database, "default");
        assert_eq!(config.traces_measurement, "distributed_traces");
        assert_eq!(config.logs_measurement, "logs");
    }

    #[test]
    fn test_database_for_prefers_signal_override() {
        let config = Config {
            endpoint: "http://localhost:8000".to_string(),
            metrics_database: Some("metrics_db".to_string()),
            ..Default::default()
        };
        assert_eq!(config.database_for(Signal::Metrics), "metrics_db");
        assert_eq!(config.database_for(Signal::Traces), "default");
        assert_eq!(config.database_for(Signal::Logs), "default");
    }

    #[test]
    fn test_deserialize_partial() {
        let config: Config = serde_json::from_str(
            r#"{"endpoint": "http://arc:8000", "auth_token": "secret", "include_metric_metadata": true}"#,
        )
        .unwrap();
        assert_eq!(config.endpoint, "http://arc:8000");
        assert_eq!(config.auth_token.as_deref(), Some("secret"));
        assert!(config.include_metric_metadata);
        assert_eq!(config.database, "default");
    }
}
