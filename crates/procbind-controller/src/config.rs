//! Reconciler tuning.
//!
//! Every wait the controller performs is a named setting here. The defaults
//! were tuned against one host editor's event timing; treat them as starting
//! points to re-tune per host, not as semantics.
//!
//! Settings can be read from a JSON document ([`ReconcileConfig::from_json`])
//! or from environment variables ([`ReconcileConfig::from_env`]):
//!
//! - `PROCBIND_DEFAULT_NAME`: name for a call site nothing else can name
//!   (default: "procedure")
//! - `PROCBIND_SPAWN_CHECK_DELAY_MS`: delay before checking a definition the
//!   host spawned mid-transaction (default: 0, i.e. next tick)
//! - `PROCBIND_RECHECK_DELAY_MS`: delay before re-syncing a new call site
//!   (default: 50)
//! - `PROCBIND_DEBOUNCE_MS`: quiet period before a cleanup sweep (default: 300)
//! - `PROCBIND_SUPPRESSION_WINDOW_MS`: lifetime of a call-site transaction
//!   (default: 3500)

use std::time::Duration;

use serde::{Deserialize, Serialize};

use procbind_core::name;

use crate::error::ControllerError;

/// Timing and naming configuration for one controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Name given to a new call site when no definition and no previous
    /// transaction supplies one.
    pub default_name: String,
    pub spawn_check_delay_ms: u64,
    pub recheck_delay_ms: u64,
    pub debounce_ms: u64,
    pub suppression_window_ms: u64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        ReconcileConfig {
            default_name: "procedure".to_string(),
            spawn_check_delay_ms: 0,
            recheck_delay_ms: 50,
            debounce_ms: 300,
            suppression_window_ms: 3500,
        }
    }
}

impl ReconcileConfig {
    pub fn spawn_check_delay(&self) -> Duration {
        Duration::from_millis(self.spawn_check_delay_ms)
    }

    pub fn recheck_delay(&self) -> Duration {
        Duration::from_millis(self.recheck_delay_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn suppression_window(&self) -> Duration {
        Duration::from_millis(self.suppression_window_ms)
    }

    /// Parses a JSON document. Missing keys take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ControllerError> {
        let config: ReconcileConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads overrides from `PROCBIND_*` environment variables.
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) but reads through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ControllerError> {
        let mut config = ReconcileConfig::default();

        if let Some(value) = lookup("PROCBIND_DEFAULT_NAME") {
            config.default_name = value;
        }
        let millis = [
            ("PROCBIND_SPAWN_CHECK_DELAY_MS", &mut config.spawn_check_delay_ms),
            ("PROCBIND_RECHECK_DELAY_MS", &mut config.recheck_delay_ms),
            ("PROCBIND_DEBOUNCE_MS", &mut config.debounce_ms),
            ("PROCBIND_SUPPRESSION_WINDOW_MS", &mut config.suppression_window_ms),
        ];
        for (key, slot) in millis {
            if let Some(value) = lookup(key) {
                *slot = value
                    .trim()
                    .parse()
                    .map_err(|_| ControllerError::InvalidSetting {
                        key: key.to_string(),
                        value: value.clone(),
                        reason: "expected a whole number of milliseconds".to_string(),
                    })?;
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field constraints.
    pub fn validate(&self) -> Result<(), ControllerError> {
        if name::is_placeholder(&self.default_name) {
            return Err(ControllerError::InvalidSetting {
                key: "default_name".to_string(),
                value: self.default_name.clone(),
                reason: "must not be a placeholder name".to_string(),
            });
        }
        // The recheck belongs to its transaction and must fire inside it.
        if self.recheck_delay_ms >= self.suppression_window_ms {
            return Err(ControllerError::InvalidSetting {
                key: "suppression_window_ms".to_string(),
                value: self.suppression_window_ms.to_string(),
                reason: format!(
                    "must exceed recheck_delay_ms ({})",
                    self.recheck_delay_ms
                ),
            });
        }
        Ok(())
    }
}
