//! In-memory site backing the node binary

use std::str::FromStr;
use std::sync::Arc;

use hems_ocpp::{LoadPoint, Site, SiteConfiguration};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LoadPointParseError {
    #[error("Load point name must not be empty")]
    EmptyName,

    #[error("Unknown load point state '{0}' (expected charging or idle)")]
    UnknownState(String),
}

/// Load point as written on the command line or in the config file
///
/// Command line form is `NAME` or `NAME:STATE` where state is `charging`
/// or `idle`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoadPointEntry {
    pub name: String,

    #[serde(default)]
    pub charging: bool,
}

impl FromStr for LoadPointEntry {
    type Err = LoadPointParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, state) = match s.rsplit_once(':') {
            Some((name, state)) => (name.trim(), Some(state.trim())),
            None => (s.trim(), None),
        };

        if name.is_empty() {
            return Err(LoadPointParseError::EmptyName);
        }

        let charging = match state.map(str::to_ascii_lowercase).as_deref() {
            None | Some("idle") => false,
            Some("charging") => true,
            Some(other) => return Err(LoadPointParseError::UnknownState(other.to_string())),
        };

        Ok(Self {
            name: name.to_string(),
            charging,
        })
    }
}

/// Load point with a fixed charging flag
#[derive(Debug, Clone)]
pub struct StaticLoadPoint {
    name: String,
    charging: bool,
}

impl From<&LoadPointEntry> for StaticLoadPoint {
    fn from(entry: &LoadPointEntry) -> Self {
        Self {
            name: entry.name.clone(),
            charging: entry.charging,
        }
    }
}

impl LoadPoint for StaticLoadPoint {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn charging(&self) -> bool {
        self.charging
    }
}

/// Fixed list of load points, reported in the order given
#[derive(Debug)]
pub struct StaticSite {
    title: String,
    load_points: Vec<Arc<StaticLoadPoint>>,
}

impl StaticSite {
    pub fn new(title: impl Into<String>, entries: &[LoadPointEntry]) -> Self {
        Self {
            title: title.into(),
            load_points: entries
                .iter()
                .map(|entry| Arc::new(StaticLoadPoint::from(entry)))
                .collect(),
        }
    }
}

impl Site for StaticSite {
    fn configuration(&self) -> SiteConfiguration {
        SiteConfiguration {
            title: self.title.clone(),
        }
    }

    fn load_points(&self) -> Vec<Arc<dyn LoadPoint>> {
        self.load_points
            .iter()
            .map(|lp| Arc::clone(lp) as Arc<dyn LoadPoint>)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_load_point() {
        assert_eq!(
            "garage".parse::<LoadPointEntry>().unwrap(),
            LoadPointEntry {
                name: "garage".to_string(),
                charging: false,
            }
        );
        assert!("garage:charging".parse::<LoadPointEntry>().unwrap().charging);
        assert!("garage:Charging".parse::<LoadPointEntry>().unwrap().charging);
        assert!(!"carport:idle".parse::<LoadPointEntry>().unwrap().charging);
    }

    #[test]
    fn test_parse_load_point_errors() {
        assert_eq!(
            "".parse::<LoadPointEntry>().unwrap_err(),
            LoadPointParseError::EmptyName
        );
        assert_eq!(
            ":charging".parse::<LoadPointEntry>().unwrap_err(),
            LoadPointParseError::EmptyName
        );
        assert_eq!(
            "garage:full".parse::<LoadPointEntry>().unwrap_err(),
            LoadPointParseError::UnknownState("full".to_string())
        );
    }

    #[test]
    fn test_static_site_order() {
        let site = StaticSite::new(
            "Home",
            &[
                "garage:charging".parse().unwrap(),
                "carport".parse().unwrap(),
            ],
        );

        assert_eq!(site.configuration().title, "Home");

        let names: Vec<_> = site.load_points().iter().map(|lp| lp.name()).collect();
        assert_eq!(names, vec!["garage", "carport"]);

        let flags: Vec<_> = site.load_points().iter().map(|lp| lp.charging()).collect();
        assert_eq!(flags, vec![true, false]);
    }
}
