//! Editor abstraction for procedure binding.
//!
//! Provides the [`EditorHost`] trait, the capability set the reconciler
//! consumes from a visual block editor, plus [`GraphQuery`] for role-aware
//! reads and the [`InMemoryEditor`] host.
//!
//! # Modules
//!
//! - [`error`]: EditorError enum
//! - [`traits`]: EditorHost trait, listener and subscription types
//! - [`query`]: GraphQuery read helpers
//! - [`memory`]: InMemoryEditor implementation

pub mod error;
pub mod memory;
pub mod query;
pub mod traits;

// Re-export key types for ergonomic use.
pub use error::EditorError;
pub use memory::{EditorCommand, InMemoryEditor};
pub use query::GraphQuery;
pub use traits::{EditorHost, EventListener, SubscriptionId};
