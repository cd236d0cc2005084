// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Engine configuration, loadable from TOML.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use vela_core::{or_default, OptimizationConfig, TrackerConfig, TuningConfig};
use vela_telemetry::{HealthThresholds, DEFAULT_NETWORK_CAPACITY};

/// Errors raised while loading an [`EngineConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read '{path}': {source}")]
    Io {
        /// The file that was read.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },
    /// The file is not valid TOML for this configuration.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Configuration of every engine component.
///
/// Missing tables and keys take their defaults, and zero values are replaced
/// by defaults when the engine is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Aggregation tracker settings.
    pub tracker: TrackerConfig,
    /// Optimization controller settings.
    pub optimization: OptimizationConfig,
    /// Tuning engine settings.
    pub tuning: TuningConfig,
    /// Limits used when evaluating health.
    pub health: HealthThresholds,
    /// Window over which snapshot latency is computed, in seconds.
    pub latency_window_secs: u64,
    /// Network capacity in bytes per second.
    pub network_capacity: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tracker: TrackerConfig::default(),
            optimization: OptimizationConfig::default(),
            tuning: TuningConfig::default(),
            health: HealthThresholds::default(),
            latency_window_secs: 60,
            network_capacity: DEFAULT_NETWORK_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Parses a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Loads a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        log::info!("Config: Loaded '{}'.", path.display());
        Ok(config)
    }

    /// Loads a configuration file, or returns the defaults if it does not exist.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            log::info!("Config: No '{}' found, using defaults.", path.display());
            Ok(Self::default())
        }
    }

    /// Returns a copy with every zero value replaced by its default.
    pub fn normalized(&self) -> Self {
        let d = Self::default();
        Self {
            tracker: self.tracker.normalized(),
            optimization: self.optimization.normalized(),
            tuning: self.tuning.normalized(),
            health: self.health.normalized(),
            latency_window_secs: or_default(self.latency_window_secs, d.latency_window_secs),
            network_capacity: or_default(self.network_capacity, d.network_capacity),
        }
    }

    /// Window over which snapshot latency is computed.
    pub fn latency_window(&self) -> Duration {
        Duration::from_secs(self.latency_window_secs)
    }
}
