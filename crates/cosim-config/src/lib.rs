//! Configuration management for cosim
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. CLI arguments (highest precedence)
//! 2. Environment variables (COSIM_* prefix, `__` between sections)
//! 3. cosim.local.toml (gitignored, local overrides)
//! 4. cosim.toml (git-tracked, project config)
//! 5. ~/.config/cosim/config.toml (user defaults)
//! 6. Built-in defaults (lowest precedence)

use anyhow::Result;
use cosim_channel::ConnectParams;
use cosim_types::{SimTime, SyncMode};
use serde::{Deserialize, Serialize};
use std::path::Path;

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::Paths;

/// Default rendezvous path for the peer channel.
pub const DEFAULT_CHANNEL_PATH: &str = "/tmp/cosim-eth";

/// Main cosim configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CosimConfig {
    pub link: LinkEndpointConfig,
    pub simulation: SimulationConfig,
    pub traffic: TrafficConfig,
}

/// Per-device bridge parameters, fixed once the device has started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkEndpointConfig {
    pub channel_path: String,
    pub sync_interval_ns: u64,
    pub poll_interval_ns: u64,
    pub link_latency_ns: u64,
    pub sync_mode: SyncMode,
}

impl Default for LinkEndpointConfig {
    fn default() -> Self {
        Self {
            channel_path: DEFAULT_CHANNEL_PATH.to_string(),
            sync_interval_ns: 500,
            poll_interval_ns: 100,
            link_latency_ns: 500,
            sync_mode: SyncMode::Synchronized,
        }
    }
}

impl LinkEndpointConfig {
    pub fn with_channel_path(mut self, path: impl Into<String>) -> Self {
        self.channel_path = path.into();
        self
    }

    pub fn with_sync_mode(mut self, sync_mode: SyncMode) -> Self {
        self.sync_mode = sync_mode;
        self
    }

    pub fn sync_interval(&self) -> SimTime {
        SimTime::from_nanos(self.sync_interval_ns)
    }

    pub fn poll_interval(&self) -> SimTime {
        SimTime::from_nanos(self.poll_interval_ns)
    }

    pub fn link_latency(&self) -> SimTime {
        SimTime::from_nanos(self.link_latency_ns)
    }

    /// Checks the parameters a device needs to start.
    ///
    /// In synchronized mode the heartbeat interval must not exceed the link
    /// latency: otherwise a receiver can reach the end of its known-safe
    /// window before the next heartbeat exists.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channel_path.is_empty() {
            return Err(ConfigError::ValidationError(
                "link.channel_path must not be empty".to_string(),
            ));
        }
        if self.poll_interval_ns == 0 {
            return Err(ConfigError::ValidationError(
                "link.poll_interval_ns must be positive".to_string(),
            ));
        }
        if self.sync_interval_ns == 0 {
            return Err(ConfigError::ValidationError(
                "link.sync_interval_ns must be positive".to_string(),
            ));
        }
        if self.sync_mode.is_synchronized() {
            if self.link_latency_ns == 0 {
                return Err(ConfigError::ValidationError(
                    "link.link_latency_ns must be positive in synchronized mode".to_string(),
                ));
            }
            if self.sync_interval_ns > self.link_latency_ns {
                return Err(ConfigError::ValidationError(format!(
                    "link.sync_interval_ns ({}) must not exceed link.link_latency_ns ({}) in synchronized mode",
                    self.sync_interval_ns, self.link_latency_ns
                )));
            }
        }
        Ok(())
    }

    /// Channel connect parameters for this endpoint.
    pub fn to_connect_params(&self) -> ConnectParams {
        ConnectParams {
            path: self.channel_path.clone(),
            sync_mode: self.sync_mode,
            sync_interval: self.sync_interval(),
            link_latency: self.link_latency(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Simulated run length.
    pub duration_ns: u64,
    /// Safety cap on dispatched events.
    pub max_events: u64,
    /// Per-direction message capacity of the in-process channel.
    pub channel_capacity: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            duration_ns: 100_000,
            max_events: 10_000_000,
            channel_capacity: 1024,
        }
    }
}

impl SimulationConfig {
    pub fn duration(&self) -> SimTime {
        SimTime::from_nanos(self.duration_ns)
    }
}

/// Frames the demo segment sends from the first device to the second.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficConfig {
    pub frames: u32,
    pub payload_bytes: usize,
    pub interval_ns: u64,
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            frames: 16,
            payload_bytes: 64,
            interval_ns: 2_000,
        }
    }
}

impl TrafficConfig {
    pub fn interval(&self) -> SimTime {
        SimTime::from_nanos(self.interval_ns)
    }
}

impl CosimConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration from specific project directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Parses a single TOML document, without layering.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.link.validate()?;
        if self.simulation.duration_ns == 0 {
            return Err(ConfigError::ValidationError(
                "simulation.duration_ns must be positive".to_string(),
            ));
        }
        if self.simulation.channel_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "simulation.channel_capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
