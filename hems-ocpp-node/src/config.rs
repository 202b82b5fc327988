//! Node configuration file
//!
//! ```json
//! {
//!   "title": "Home",
//!   "ocpp": { "URI": "ws://localhost:8887/ocpp", "StationID": "evcc" },
//!   "loadpoints": [ { "name": "garage", "charging": true } ]
//! }
//! ```
//!
//! The `ocpp` mapping is handed to the reporter unchanged apart from
//! command line overrides.

use std::path::{Path, PathBuf};

use hems_ocpp::{ConfigError, OcppConfig};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::site::LoadPointEntry;

#[derive(Debug, Error)]
pub enum NodeConfigError {
    #[error("Reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parsing {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Ocpp(#[from] ConfigError),
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeConfig {
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub ocpp: Value,

    #[serde(default)]
    pub loadpoints: Vec<LoadPointEntry>,
}

impl NodeConfig {
    pub fn load(path: &Path) -> Result<Self, NodeConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| NodeConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&text).map_err(|source| NodeConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Replace a key of the `ocpp` mapping, whatever its spelling
    pub fn set_ocpp_key(&mut self, key: &str, value: impl Into<Value>) {
        let mut map = match std::mem::take(&mut self.ocpp) {
            Value::Object(map) => map,
            // anything else is left for the reporter to reject
            Value::Null => Map::new(),
            other => {
                self.ocpp = other;
                return;
            }
        };

        map.retain(|k, _| !k.eq_ignore_ascii_case(key));
        map.insert(key.to_string(), value.into());
        self.ocpp = Value::Object(map);
    }

    pub fn ocpp_config(&self) -> Result<OcppConfig, NodeConfigError> {
        Ok(OcppConfig::from_value(&self.ocpp)?)
    }
}
