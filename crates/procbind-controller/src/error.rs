//! Controller error types.
//!
//! Reconciliation itself never fails: every graph-level problem is logged
//! and retried on a later event. [`ControllerError`] only covers the
//! handle and configuration surfaces.

/// Errors from the controller handle and its configuration.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// The controller task has stopped (detached or dropped).
    #[error("controller is detached")]
    Detached,

    /// A JSON configuration document could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// A single setting has an unusable value.
    #[error("invalid setting {key}={value}: {reason}")]
    InvalidSetting {
        key: String,
        value: String,
        reason: String,
    },
}
