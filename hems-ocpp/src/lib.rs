//! # HEMS OCPP
//!
//! Reports the charging status of a home energy site's load points to an
//! OCPP 1.6 central system.
//!
//! ## Architecture
//!
//! ```text
//!  Host site (load points)
//!       │ Site / LoadPoint traits
//!       ▼
//! ┌─────────────────────────────────┐
//! │    hems-ocpp                    │
//! │  ┌────────────┐  ┌───────────┐  │
//! │  │ Status     │─►│ OCPP WS   │  │
//! │  │ Reporter   │  │ Client    │  │
//! │  └────────────┘  └───────────┘  │
//! └─────────────┬───────────────────┘
//!               │ WebSocket OCPP-J 1.6
//!               ▼
//!       OCPP Central System
//! ```
//!
//! ## Load point → connector mapping
//!
//! | Load point position | Connector | Charging | Status |
//! |---------------------|-----------|----------|--------|
//! | 0 | 1 | yes | `Charging` |
//! | 1 | 2 | no | `Available` |
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use hems_ocpp::{LoadPoint, Site, SiteConfiguration, StatusReporter};
//! use tokio_util::sync::CancellationToken;
//!
//! struct Garage;
//!
//! impl LoadPoint for Garage {
//!     fn name(&self) -> String { "garage".into() }
//!     fn charging(&self) -> bool { false }
//! }
//!
//! struct Home;
//!
//! impl Site for Home {
//!     fn configuration(&self) -> SiteConfiguration { SiteConfiguration::default() }
//!     fn load_points(&self) -> Vec<Arc<dyn LoadPoint>> { vec![Arc::new(Garage)] }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let conf = serde_json::json!({
//!         "URI": "ws://localhost:8887/ocpp",
//!         "StationID": "evcc",
//!     });
//!
//!     let reporter = StatusReporter::new(&conf, Arc::new(Home))?;
//!     reporter.run(CancellationToken::new()).await;
//!
//!     Ok(())
//! }
//! ```

pub mod ocpp;
pub mod config;
pub mod site;
pub mod reporter;

pub use config::{
    ConfigError, OcppConfig, DEFAULT_RETRY_INTERVAL, DEFAULT_STATION_ID, MIN_RETRY_INTERVAL,
};
pub use reporter::{connector_status, PublishError, ReporterHandler, StatusReporter};
pub use site::{LoadPoint, Site, SiteConfiguration};

// Re-export key types
pub use ocpp::{
    ChargePoint, ChargePointErrorCode, ChargePointStatus, CoreHandler, OcppClient,
    OcppClientConfig, OcppError,
};
