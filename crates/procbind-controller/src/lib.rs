//! Event-driven reconciliation of procedure bindings.
//!
//! [`attach`] subscribes a controller to an [`EditorHost`](procbind_editor::EditorHost)
//! and keeps definitions and call sites consistent as the user edits:
//! new call sites are named and bound, host-spawned duplicates are folded
//! away, and a debounced cleanup runs once the graph settles.
//!
//! # Modules
//!
//! - [`config`]: ReconcileConfig, env and JSON loading
//! - [`controller`]: attach, ControllerHandle, ControllerStatus
//! - [`error`]: ControllerError enum
//! - [`session`]: per-call-site transaction state

pub mod config;
pub mod controller;
mod debounce;
pub mod error;
pub mod session;
mod timer;

pub use config::ReconcileConfig;
pub use controller::{
    attach, sweep_trigger, CleanupTrigger, ControllerHandle, ControllerId, ControllerStatus,
};
pub use error::ControllerError;
pub use session::{SessionId, SessionPhase};
