//! Controller configuration.
//!
//! Values are layered, lowest priority first:
//!
//! 1. built-in defaults,
//! 2. an optional TOML file,
//! 3. environment variables prefixed with `FCCTL_` (e.g. `FCCTL_BAUD_RATE=115200`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::session::SessionOptions;
use crate::snapshot::DEFAULT_RAW_HISTORY;
use crate::transport::DEFAULT_BAUD_RATE;

pub const ENV_PREFIX: &str = "FCCTL_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Serial port of the rig, e.g. `COM7` or `/dev/ttyUSB0`.
    pub port: Option<String>,
    pub baud_rate: u32,
    pub read_timeout_ms: u64,
    /// Pause between transport polls; bounds both latency and CPU use.
    pub poll_interval_ms: u64,
    /// Emit unterminated text as raw items after each read cycle.
    pub flush_leftovers: bool,
    /// Raw messages kept by front ends.
    pub raw_history: usize,
    /// Default tracing filter, overridden by `RUST_LOG`.
    pub log_level: String,
    /// When set, logs go to a daily rolling file in this directory.
    pub log_dir: Option<PathBuf>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout_ms: 1000,
            poll_interval_ms: 100,
            flush_leftovers: true,
            raw_history: DEFAULT_RAW_HISTORY,
            log_level: "info".to_string(),
            log_dir: None,
        }
    }
}

impl ControllerConfig {
    /// The layered figment, before extraction.
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(ControllerConfig::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    /// Loads the configuration. A file that was asked for must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            if !path.exists() {
                return Err(Error::from(figment::Error::from(format!(
                    "config file {} not found",
                    path.display()
                ))));
            }
        }
        Ok(Self::figment(path).extract()?)
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            baud_rate: self.baud_rate,
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            flush_leftovers: self.flush_leftovers,
        }
    }
}
