//! The [`EditorHost`] trait: the capability set the reconciler needs from the
//! graph editor.
//!
//! The editor owns the graph. The reconciler only reads fields and issues
//! three kinds of command back: write a field (rename / rebind), write a call
//! site's bound parameters, and dispose a block. Everything that might not
//! exist on a given host is expressed here as `Option` or `Result`, so the
//! reconciler's own logic never has to second-guess the host.

use std::fmt;
use std::sync::Arc;

use procbind_core::{Block, BlockId, BlockRole, GraphEvent, ParameterList, VariableId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EditorError;

/// Callback invoked for every mutation event the editor emits.
pub type EventListener = Arc<dyn Fn(GraphEvent) + Send + Sync>;

/// Handle returned by [`EditorHost::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub Uuid);

impl SubscriptionId {
    pub fn new() -> Self {
        SubscriptionId(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The editor capability set.
///
/// Implementations must be shareable across tasks: the reconciler holds an
/// `Arc<dyn EditorHost>` and calls it from its own task.
pub trait EditorHost: Send + Sync {
    // -------------------------------------------------------------------
    // Event stream
    // -------------------------------------------------------------------

    /// Registers a listener for mutation events.
    fn subscribe(&self, listener: EventListener) -> SubscriptionId;

    /// Removes a listener. Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);

    /// Stops emitting events until the matching [`resume_events`]. Nestable.
    ///
    /// Best effort: events raised while suppressed are dropped, not queued.
    ///
    /// [`resume_events`]: EditorHost::resume_events
    fn suppress_events(&self);

    /// Undoes one [`suppress_events`](EditorHost::suppress_events).
    fn resume_events(&self);

    // -------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------

    /// Returns a snapshot of a block, or `None` if it does not exist.
    fn block(&self, id: BlockId) -> Option<Block>;

    /// Returns snapshots of every block with the given role, in graph order.
    fn blocks_by_role(&self, role: BlockRole) -> Vec<Block>;

    /// Reads a field of a block.
    fn field(&self, id: BlockId, key: &str) -> Result<Option<String>, EditorError>;

    /// Reads a block's parameter metadata.
    fn parameters(&self, id: BlockId) -> Result<ParameterList, EditorError>;

    /// Looks a variable up by name in the active variable namespace.
    fn lookup_variable(&self, name: &str) -> Option<VariableId>;

    /// Returns the call-site blocks whose name is exactly `name`.
    fn callers_of(&self, name: &str) -> Vec<Block>;

    // -------------------------------------------------------------------
    // Commands
    // -------------------------------------------------------------------

    /// Writes a field of a block.
    fn set_field(&self, id: BlockId, key: &str, value: &str) -> Result<(), EditorError>;

    /// Writes a call site's bound parameter list.
    fn set_parameters(&self, id: BlockId, parameters: ParameterList) -> Result<(), EditorError>;

    /// Disposes a block. Disposing a block that is already gone is a no-op.
    fn dispose(&self, id: BlockId);
}
