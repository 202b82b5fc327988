//! Read-only view of the host's site and its load points

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Site-wide settings exposed by the host
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfiguration {
    pub title: String,
}

/// A controllable charging point managed by the host
pub trait LoadPoint: Send + Sync {
    fn name(&self) -> String;

    /// Whether a vehicle is currently charging
    fn charging(&self) -> bool;
}

/// The host site as seen by the status reporter
///
/// `load_points` is queried afresh on every publish pass; connectors are
/// numbered by position, so the order must be stable across calls.
pub trait Site: Send + Sync {
    fn configuration(&self) -> SiteConfiguration;

    fn load_points(&self) -> Vec<Arc<dyn LoadPoint>>;
}
