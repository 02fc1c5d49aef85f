//! Configuration System using Figment
//!
//! This module provides strongly-typed configuration loading. Configuration is
//! layered, later sources overriding earlier ones:
//! 1. Built-in defaults (`Settings::default()`)
//! 2. A TOML file (`config/default.toml` unless another path is given)
//! 3. Environment variables (prefixed with `BATTERY_CYCLER_`, nested keys split on `__`)
//!
//! # Example
//! ```no_run
//! use battery_cycler::config::Settings;
//!
//! let settings = Settings::load()?;
//! println!("Log level: {}", settings.application.log_level);
//! # Ok::<(), battery_cycler::error::CyclerError>(())
//! ```

use crate::data::dcir::DcirSettings;
use crate::data::differential::DifferentialSettings;
use crate::error::{AppResult, CyclerError};
use crate::instrument::config::{ContinuousLogConfig, SegmentedConfig};
use crate::validation;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Prefix for environment-variable overrides.
pub const ENV_PREFIX: &str = "BATTERY_CYCLER_";

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Application settings
    pub application: ApplicationConfig,
    /// Nominal capacity resolution
    pub capacity: CapacitySettings,
    /// Segmented-family adapter
    pub segmented: SegmentedConfig,
    /// Continuous-log-family adapter
    pub continuous: ContinuousLogConfig,
    /// dQ/dV and dV/dQ computation
    pub differential: DifferentialSettings,
    /// Pulse resistance extraction
    pub dcir: DcirSettings,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
        }
    }
}

/// Capacity resolution settings.
///
/// When `manual_mah` is set it wins over every automatic strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacitySettings {
    /// Operator-supplied nominal capacity in mAh
    #[serde(default)]
    pub manual_mah: Option<f64>,
    /// Reference C-rate recorded with the store (default: 0.2)
    #[serde(default = "default_c_rate")]
    pub c_rate: f64,
}

fn default_c_rate() -> f64 {
    0.2
}

impl Default for CapacitySettings {
    fn default() -> Self {
        Self {
            manual_mah: None,
            c_rate: default_c_rate(),
        }
    }
}

impl Settings {
    /// Load configuration from `config/default.toml` and environment variables.
    ///
    /// A missing file is not an error; defaults and environment still apply.
    pub fn load() -> AppResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let settings: Settings = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> AppResult<()> {
        validation::is_log_level(&self.application.log_level).map_err(config_err)?;

        if let Some(manual) = self.capacity.manual_mah {
            validation::is_positive(manual)
                .map_err(|e| config_err(format!("capacity.manual_mah: {e}")))?;
        }
        validation::is_positive(self.capacity.c_rate)
            .map_err(|e| config_err(format!("capacity.c_rate: {e}")))?;

        self.segmented.validate()?;
        self.continuous.validate()?;
        self.differential.validate()?;
        self.dcir.validate()?;
        Ok(())
    }

    /// Renders the effective configuration as TOML.
    pub fn to_toml_string(&self) -> AppResult<String> {
        toml::to_string_pretty(self).map_err(|e| config_err(e.to_string()))
    }
}

fn config_err(message: impl Into<String>) -> CyclerError {
    CyclerError::Configuration(message.into())
}
