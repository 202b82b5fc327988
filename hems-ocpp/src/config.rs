//! Configuration for the OCPP status reporter
//!
//! The host hands over a loosely typed mapping (`URI`, `StationID`). Keys are
//! matched case-insensitively; anything else is rejected. Timing knobs that
//! are not part of the mapping are set through builder methods.

use std::time::Duration;

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

use crate::ocpp::OcppClientConfig;

/// Charge point identity used when the mapping does not name one
pub const DEFAULT_STATION_ID: &str = "evcc";

/// Delay between reconnect attempts and between publish passes
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Shortest delay the reporter will wait between attempts
pub const MIN_RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// Errors decoding the configuration mapping
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("OCPP configuration must be a mapping, got {0}")]
    NotAMapping(&'static str),

    #[error("OCPP configuration key '{0}' given more than once")]
    DuplicateKey(String),

    #[error("Invalid OCPP configuration: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Status reporter configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcppConfig {
    /// Central system WebSocket endpoint (without station ID)
    pub uri: String,

    /// Charge point identity (appended to the URI)
    pub station_id: String,

    /// Fixed delay used both for reconnecting and between publish passes
    pub retry_interval: Duration,

    /// Time to wait for each StatusNotification to be confirmed
    pub request_timeout: Duration,
}

/// Explicit nulls decode as absent and fall back to the defaults
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    uri: Option<String>,

    #[serde(default, rename = "stationid")]
    station_id: Option<String>,
}

fn default_station_id() -> String {
    DEFAULT_STATION_ID.to_string()
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}

impl Default for OcppConfig {
    fn default() -> Self {
        Self {
            uri: String::new(),
            station_id: default_station_id(),
            retry_interval: DEFAULT_RETRY_INTERVAL,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl OcppConfig {
    /// Create config for the given central system endpoint
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Default::default()
        }
    }

    /// Decode the host's configuration mapping
    ///
    /// A null value is treated as an empty mapping.
    pub fn from_value(conf: &Value) -> Result<Self, ConfigError> {
        let mut lowered = Map::new();
        match conf {
            Value::Null => {}
            Value::Object(map) => {
                for (key, value) in map {
                    if lowered.insert(key.to_lowercase(), value.clone()).is_some() {
                        return Err(ConfigError::DuplicateKey(key.to_lowercase()));
                    }
                }
            }
            other => return Err(ConfigError::NotAMapping(kind(other))),
        }

        let raw: RawConfig = serde_json::from_value(Value::Object(lowered))?;
        let uri = raw.uri.unwrap_or_default();

        if uri.is_empty() {
            warn!("No central system URI configured, connection attempts will fail");
        }

        Ok(Self {
            uri,
            station_id: raw.station_id.unwrap_or_else(default_station_id),
            ..Default::default()
        })
    }

    /// Set station ID
    pub fn with_station_id(mut self, station_id: impl Into<String>) -> Self {
        self.station_id = station_id.into();
        self
    }

    /// Set the shared reconnect / publish interval
    ///
    /// Values below [`MIN_RETRY_INTERVAL`] are raised to it.
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        if interval < MIN_RETRY_INTERVAL {
            warn!(
                "Retry interval {:?} too short, using {:?}",
                interval, MIN_RETRY_INTERVAL
            );
        }
        self.retry_interval = interval.max(MIN_RETRY_INTERVAL);
        self
    }

    /// Set request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Client settings derived from this config
    pub fn client_config(&self) -> OcppClientConfig {
        OcppClientConfig {
            station_id: self.station_id.clone(),
            request_timeout: self.request_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_mapping() {
        let config = OcppConfig::from_value(&json!({
            "URI": "ws://cs.local:8887/ocpp",
            "StationID": "garage",
        }))
        .unwrap();

        assert_eq!(config.uri, "ws://cs.local:8887/ocpp");
        assert_eq!(config.station_id, "garage");
        assert_eq!(config.retry_interval, DEFAULT_RETRY_INTERVAL);
    }

    #[test]
    fn test_station_id_defaults() {
        let config = OcppConfig::from_value(&json!({"uri": "ws://cs.local/ocpp"})).unwrap();
        assert_eq!(config.station_id, "evcc");

        let config = OcppConfig::from_value(&Value::Null).unwrap();
        assert_eq!(config.station_id, "evcc");
        assert!(config.uri.is_empty());
    }

    #[test]
    fn test_keys_are_case_insensitive() {
        let config = OcppConfig::from_value(&json!({"Uri": "ws://a", "stationId": "b"})).unwrap();
        assert_eq!(config.uri, "ws://a");
        assert_eq!(config.station_id, "b");
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = OcppConfig::from_value(&json!({"URI": "ws://a", "Password": "x"})).unwrap_err();
        assert!(matches!(err, ConfigError::Decode(_)));
    }

    #[test]
    fn test_null_values_fall_back_to_defaults() {
        let config = OcppConfig::from_value(&json!({"URI": null})).unwrap();
        assert!(config.uri.is_empty());
        assert_eq!(config.station_id, DEFAULT_STATION_ID);

        let config =
            OcppConfig::from_value(&json!({"URI": "ws://a", "StationID": null})).unwrap();
        assert_eq!(config.uri, "ws://a");
        assert_eq!(config.station_id, DEFAULT_STATION_ID);
    }

    #[test]
    fn test_keys_differing_in_case_rejected() {
        let err = OcppConfig::from_value(&json!({"URI": "ws://a", "uri": "ws://b"})).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateKey(ref key) if key == "uri"));
    }

    #[test]
    fn test_wrong_shape_rejected() {
        let err = OcppConfig::from_value(&json!(["ws://a"])).unwrap_err();
        assert!(matches!(err, ConfigError::NotAMapping("a list")));

        let err = OcppConfig::from_value(&json!({"URI": 42})).unwrap_err();
        assert!(matches!(err, ConfigError::Decode(_)));
    }

    #[test]
    fn test_zero_retry_interval_is_raised() {
        let config = OcppConfig::default().with_retry_interval(Duration::ZERO);
        assert_eq!(config.retry_interval, MIN_RETRY_INTERVAL);
    }

    #[test]
    fn test_config_builder() {
        let config = OcppConfig::new("ws://localhost:8887")
            .with_station_id("CP-1")
            .with_retry_interval(Duration::from_secs(2))
            .with_request_timeout(Duration::from_secs(10));

        assert_eq!(config.station_id, "CP-1");
        assert_eq!(config.retry_interval, Duration::from_secs(2));

        let client = config.client_config();
        assert_eq!(client.station_id, "CP-1");
        assert_eq!(client.request_timeout, Duration::from_secs(10));
    }
}
