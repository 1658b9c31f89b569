//! Driver configuration
//!
//! Loaded once at startup from a TOML file:
//!
//! ```toml
//! gpio = [2, 3, 4, 7, 9, 10, 11]  # clock, latch, data 1..5
//! fourscore = false
//! device_name = "SNES pad"
//! poll_interval_ms = 10
//! bit_delay_us = 6
//! simulate = false
//! ```
//!
//! Validation is all-or-nothing: any broken rule rejects the whole
//! configuration and the driver never starts polling.

use crate::gpio::pin_valid;
use crate::pads::bus::BusLayout;
use crate::pads::types::{FOURSCORE_PLAYERS, MAX_SLOTS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

pub const MIN_NUMBER_OF_GPIOS: usize = 3;
pub const MAX_NUMBER_OF_GPIOS: usize = 2 + MAX_SLOTS;

const CONFIG_DIR: &str = "snescon";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Number of GPIO pins in gpio configuration is not correct. Expected at least {min}, found {0}", min = MIN_NUMBER_OF_GPIOS)]
    TooFewPins(usize),

    #[error("Number of GPIO pins in gpio configuration is not correct. Expected at most {max}, found {0}", max = MAX_NUMBER_OF_GPIOS)]
    TooManyPins(usize),

    #[error("Number of GPIO pins in gpio configuration is not correct. Expected at least {min} in order to use the FourScore adapter, found {0}", min = MIN_NUMBER_OF_GPIOS + 1)]
    FourScoreNeedsPins(usize),

    #[error("GPIO {0} in the configuration is not valid")]
    InvalidPin(u8),

    #[error("Invalid timing: {0}")]
    InvalidTiming(String),

    #[error("Failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct DriverConfig {
    /// `<clock, latch, data_1 .. data_5>`
    pub gpio: Vec<u8>,
    pub fourscore: bool,
    pub device_name: String,
    pub poll_interval_ms: u64,
    pub bit_delay_us: u64,
    /// Run against the simulated backend instead of the GPIO controller
    pub simulate: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            gpio: vec![2, 3, 4, 7, 9, 10, 11],
            fourscore: false,
            device_name: "SNES pad".to_string(),
            poll_interval_ms: 10,
            bit_delay_us: 6,
            simulate: false,
        }
    }
}

impl DriverConfig {
    /// Default location, `<config dir>/snescon/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    pub fn from_toml(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        debug!("Reading config from {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content, path)
    }

    /// Load `path`, or the default location; a missing default file means
    /// built-in defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }

        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => {
                info!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let count = self.gpio.len();
        if count < MIN_NUMBER_OF_GPIOS {
            return Err(ConfigError::TooFewPins(count));
        }
        if count > MAX_NUMBER_OF_GPIOS {
            return Err(ConfigError::TooManyPins(count));
        }
        if self.fourscore && count < MIN_NUMBER_OF_GPIOS + 1 {
            return Err(ConfigError::FourScoreNeedsPins(count));
        }
        if let Some(pin) = self.gpio.iter().find(|pin| !pin_valid(**pin)) {
            return Err(ConfigError::InvalidPin(*pin));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidTiming(
                "poll_interval_ms must be at least 1".to_string(),
            ));
        }
        if self.bit_delay_us == 0 {
            return Err(ConfigError::InvalidTiming(
                "bit_delay_us must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Validate and derive the bus layout
    pub fn layout(&self) -> Result<BusLayout, ConfigError> {
        self.validate()?;

        let data_lines = self.gpio[2..].to_vec();
        let slots = if self.fourscore {
            data_lines.len().max(FOURSCORE_PLAYERS)
        } else {
            data_lines.len()
        };

        Ok(BusLayout {
            clock: self.gpio[0],
            latch: self.gpio[1],
            data_lines,
            slots,
            device_name: self.device_name.clone(),
            bit_delay: Duration::from_micros(self.bit_delay_us),
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// FourScore enable flag, shared between the poll task and whoever toggles it
///
/// Reads and writes use relaxed ordering and are not synchronized with a
/// running poll: a toggle takes effect on whichever poll reads it next.
#[derive(Debug, Clone, Default)]
pub struct FourScoreFlag(Arc<AtomicBool>);

impl FourScoreFlag {
    pub fn new(enabled: bool) -> Self {
        Self(Arc::new(AtomicBool::new(enabled)))
    }

    pub fn is_enabled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn set(&self, enabled: bool) {
        self.0.store(enabled, Ordering::Relaxed);
    }
}
