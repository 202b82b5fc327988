//! Load point status reporter
//!
//! Two loops on one task:
//!
//! ```text
//!   run ──start(uri)──► ok ──► publish ──(send failed)──┐
//!    ▲        │                  │  ▲                   │
//!    │       err                 │  └─ sleep interval ◄─┤ full pass
//!    │        ▼                  │                      │
//!    └── sleep interval ◄────────┴──────────────────────┘
//! ```
//!
//! A failed StatusNotification is taken as a sign the connection itself is
//! unhealthy: the pass is abandoned and the supervisor reconnects from
//! scratch after the retry interval. Nothing is retried in place and the
//! delay never grows.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::{ConfigError, OcppConfig, MIN_RETRY_INTERVAL};
use crate::ocpp::{
    ChargePoint, ChargePointErrorCode, ChargePointStatus, CoreHandler, OcppClient, OcppError,
};
use crate::site::Site;

/// Handler registered with the charge point at construction.
///
/// The reporter does not act on central system calls, so every call gets
/// the trait's declining default.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReporterHandler;

impl CoreHandler for ReporterHandler {}

/// A StatusNotification that could not be delivered
#[derive(Debug, Error)]
#[error("sending status for {load_point}: {source}")]
pub struct PublishError {
    pub load_point: String,
    pub connector_id: i32,
    #[source]
    pub source: OcppError,
}

/// Map a load point's charging flag onto the OCPP status vocabulary
pub fn connector_status(charging: bool) -> ChargePointStatus {
    if charging {
        ChargePointStatus::Charging
    } else {
        ChargePointStatus::Available
    }
}

/// Periodically reports every load point of a site to a central system
pub struct StatusReporter<C = OcppClient> {
    config: OcppConfig,
    site: Arc<dyn Site>,
    cp: C,
}

impl StatusReporter<OcppClient> {
    /// Build a reporter from the host's configuration mapping
    pub fn new(conf: &Value, site: Arc<dyn Site>) -> Result<Self, ConfigError> {
        let config = OcppConfig::from_value(conf)?;
        Ok(Self::from_config(config, site))
    }

    /// Build a reporter backed by a WebSocket OCPP client
    pub fn from_config(config: OcppConfig, site: Arc<dyn Site>) -> Self {
        let cp = OcppClient::new(config.client_config());
        Self::with_charge_point(config, site, cp)
    }
}

impl<C: ChargePoint> StatusReporter<C> {
    /// Build a reporter on top of an existing charge point
    pub fn with_charge_point(config: OcppConfig, site: Arc<dyn Site>, cp: C) -> Self {
        cp.set_core_handler(Arc::new(ReporterHandler));

        Self { config, site, cp }
    }

    pub fn config(&self) -> &OcppConfig {
        &self.config
    }

    pub fn charge_point(&self) -> &C {
        &self.cp
    }

    // also floors intervals written straight into the config
    fn retry_interval(&self) -> Duration {
        self.config.retry_interval.max(MIN_RETRY_INTERVAL)
    }

    /// Connect and publish until `cancel` fires, reconnecting on any failure
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            "Starting OCPP status reporter: station={}, uri={}",
            self.config.station_id, self.config.uri
        );

        loop {
            let started = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                res = self.cp.start(&self.config.uri) => res,
            };

            match started {
                Ok(()) => {
                    info!("Connected to central system, publishing status");
                    // publish logs its own failure
                    let _ = self.publish(&cancel).await;
                }
                Err(e) => {
                    error!("Connecting to central system: {}", e);
                }
            }

            debug!("Reconnecting in {:?}", self.retry_interval());
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.retry_interval()) => {}
            }
        }

        info!("OCPP status reporter stopped");
    }

    /// Report every load point, then sleep, until a send fails or `cancel` fires.
    ///
    /// Returns `Ok(())` only when cancelled. On failure the rest of the
    /// current pass is skipped.
    pub async fn publish(&self, cancel: &CancellationToken) -> Result<(), PublishError> {
        loop {
            for (connector_id, lp) in (1..).zip(self.site.load_points()) {
                let status = connector_status(lp.charging());

                let sent = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Ok(()),
                    res = self.cp.status_notification(
                        connector_id,
                        ChargePointErrorCode::NoError,
                        status,
                    ) => res,
                };

                if let Err(source) = sent {
                    let err = PublishError {
                        load_point: lp.name(),
                        connector_id,
                        source,
                    };
                    error!("{}", err);
                    return Err(err);
                }

                debug!("Connector {} ({}): {:?}", connector_id, lp.name(), status);
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                _ = tokio::time::sleep(self.retry_interval()) => {}
            }
        }
    }
}
