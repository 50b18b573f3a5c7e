//! Simulation tuning loaded from `sim_config.{ron,toml,json}`.
//!
//! The file is written in plain decimals and resolved into the engine's
//! fixed-point configs. Every field has a default, and a missing file means
//! "all defaults".

use crate::loader::{DataLoadError, deserialize_file, find_data_file};
use forge_core::fixed::f64_to_fixed64;
use forge_fluid::FluidConfig;
use forge_network::Throttle;
use forge_power::PowerConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Base name of the config file.
pub const SIM_CONFIG_FILE: &str = "sim_config";

/// Storage fill band for producer throttling, as fractions in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleData {
    pub low: f64,
    pub high: f64,
}

impl Default for ThrottleData {
    fn default() -> Self {
        Self { low: 0.25, high: 0.95 }
    }
}

impl ThrottleData {
    fn resolve(&self, path: &Path, section: &str) -> Result<Throttle, DataLoadError> {
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);
        if !in_unit(self.low) || !in_unit(self.high) || self.low > self.high {
            return Err(DataLoadError::Invalid {
                file: path.to_path_buf(),
                detail: format!(
                    "{section}.throttle needs 0 <= low <= high <= 1, got low {} high {}",
                    self.low, self.high
                ),
            });
        }
        Ok(Throttle::new(f64_to_fixed64(self.low), f64_to_fixed64(self.high)))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSection {
    pub throttle: ThrottleData,
}

/// Background persistence limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Save-queue entries written per tick.
    pub save_batch: usize,
    /// Worker threads serving load requests.
    pub load_workers: usize,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            save_batch: 16,
            load_workers: 2,
        }
    }
}

/// The config file as written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfigData {
    pub power: NetworkSection,
    pub fluid: NetworkSection,
    pub persistence: PersistenceConfig,
}

/// Resolved simulation config.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimConfig {
    pub power: PowerConfig,
    pub fluid: FluidConfig,
    pub persistence: PersistenceConfig,
}

impl SimConfig {
    /// Resolve parsed data. `path` labels errors.
    pub fn from_data(data: &SimConfigData, path: &Path) -> Result<Self, DataLoadError> {
        if data.persistence.save_batch == 0 || data.persistence.load_workers == 0 {
            return Err(DataLoadError::Invalid {
                file: path.to_path_buf(),
                detail: "persistence.save_batch and persistence.load_workers must be at least 1".into(),
            });
        }
        Ok(Self {
            power: PowerConfig {
                throttle: data.power.throttle.resolve(path, "power")?,
            },
            fluid: FluidConfig {
                throttle: data.fluid.throttle.resolve(path, "fluid")?,
            },
            persistence: data.persistence,
        })
    }
}

/// Load the sim config from `dir`, falling back to defaults when the file is absent.
pub fn load_sim_config(dir: &Path) -> Result<SimConfig, DataLoadError> {
    let Some(path) = find_data_file(dir, SIM_CONFIG_FILE)? else {
        log::debug!("no {SIM_CONFIG_FILE} in {}, using defaults", dir.display());
        return Ok(SimConfig::default());
    };
    let data: SimConfigData = deserialize_file(&path)?;
    let config = SimConfig::from_data(&data, &path)?;
    log::debug!("loaded sim config from {}", path.display());
    Ok(config)
}
