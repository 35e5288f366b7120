//! Tracker configuration.
//!
//! All tunables of the vehicle state core live in one [`TrackerConfig`] that is passed
//! explicitly to the constructors that need it. The config can be read from and written to
//! JSON, YAML or TOML; the generic [`TrackerConfig::from_file`] / [`TrackerConfig::to_file`]
//! pick the format from the file extension.
//!
//! ```toml
//! search_radius = 75.0
//!
//! [filter]
//! ground_variance = 1250.0
//! on_road_acceleration_variance = 0.5
//!
//! [transitions]
//! edge_motion_counts = [19.0, 1.0]
//! ```
//!
//! Missing fields take their defaults.
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackingError};
use crate::motion::MotionFilterConfig;
use crate::transition::TransitionConfig;

/// Complete configuration of the tracker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Radius in meters within which edges are considered as candidates for an observation.
    pub search_radius: f64,
    pub filter: MotionFilterConfig,
    pub transitions: TransitionConfig,
}
impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            search_radius: 100.0,
            filter: MotionFilterConfig::default(),
            transitions: TransitionConfig::default(),
        }
    }
}

fn config_error(e: impl std::fmt::Display) -> TrackingError {
    TrackingError::Config(e.to_string())
}

impl TrackerConfig {
    /// Check every value for plausibility.
    pub fn validate(&self) -> Result<()> {
        self.filter.validate()?;
        self.transitions.validate()?;
        if !(self.search_radius.is_finite() && self.search_radius >= 0.0) {
            return Err(TrackingError::Config(format!(
                "search_radius must be non-negative and finite, got {}",
                self.search_radius
            )));
        }
        Ok(())
    }
    /// Write the configuration as pretty-printed JSON.
    pub fn to_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self).map_err(config_error)
    }
    /// Read the configuration from a JSON file.
    pub fn from_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let config: TrackerConfig = serde_json::from_reader(file).map_err(config_error)?;
        config.validate()?;
        Ok(config)
    }
    /// Write the configuration as YAML.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut file = File::create(path)?;
        let s = serde_yaml::to_string(self).map_err(config_error)?;
        file.write_all(s.as_bytes())?;
        Ok(())
    }
    /// Read the configuration from YAML.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let config: TrackerConfig = serde_yaml::from_reader(file).map_err(config_error)?;
        config.validate()?;
        Ok(config)
    }
    /// Write the configuration as TOML.
    pub fn to_toml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut file = File::create(path)?;
        let s = toml::to_string(self).map_err(config_error)?;
        file.write_all(s.as_bytes())?;
        Ok(())
    }
    /// Read the configuration from TOML.
    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut s = String::new();
        let mut file = File::open(path)?;
        file.read_to_string(&mut s)?;
        let config: TrackerConfig = toml::from_str(&s).map_err(config_error)?;
        config.validate()?;
        Ok(config)
    }
    /// Generic write: choose format by file extension (.json/.yaml/.yml/.toml)
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let p = path.as_ref();
        match extension(p).as_deref() {
            Some("json") => self.to_json(p),
            Some("yaml") | Some("yml") => self.to_yaml(p),
            Some("toml") => self.to_toml(p),
            _ => Err(unsupported(p)),
        }
    }
    /// Generic read: choose format by file extension (.json/.yaml/.yml/.toml)
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let p = path.as_ref();
        match extension(p).as_deref() {
            Some("json") => Self::from_json(p),
            Some("yaml") | Some("yml") => Self::from_yaml(p),
            Some("toml") => Self::from_toml(p),
            _ => Err(unsupported(p)),
        }
    }
}

fn extension(p: &Path) -> Option<String> {
    p.extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase())
}

fn unsupported(p: &Path) -> TrackingError {
    TrackingError::Config(format!(
        "unsupported config file extension: {}",
        p.display()
    ))
}
