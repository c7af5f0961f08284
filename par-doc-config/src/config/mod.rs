//! Application configuration.
//!
//! - [`persistence`] - `impl Config` methods for load/save and path resolution

pub mod persistence;

use crate::error::ConfigError;
use crate::types::LogLevel;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// par-doc configuration, stored as YAML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Verbosity of the debug log file
    #[serde(default)]
    pub log_level: LogLevel,

    /// How long a source window waits for the target's ack when a transfer
    /// request does not name its own timeout
    #[serde(default = "crate::defaults::transfer_timeout_ms")]
    pub transfer_timeout_ms: u64,

    /// Restore a tab's document when it becomes active and is not mounted yet
    #[serde(default = "crate::defaults::bool_true")]
    pub restore_on_activate: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            transfer_timeout_ms: crate::defaults::transfer_timeout_ms(),
            restore_on_activate: crate::defaults::bool_true(),
        }
    }
}

impl Config {
    /// Default ack deadline as a `Duration`
    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_millis(self.transfer_timeout_ms)
    }

    /// Reject values no window could work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.transfer_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "transfer_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
