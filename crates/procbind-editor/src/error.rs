//! Editor error types for procbind-editor.
//!
//! [`EditorError`] covers the ways a command against the editor graph can
//! fail. Almost all of them are stale references: the block was disposed
//! between the query that found it and the command that touched it.

use procbind_core::{BlockId, BlockRole};
use thiserror::Error;

/// Errors produced by [`EditorHost`](crate::traits::EditorHost) operations.
#[derive(Debug, Error)]
pub enum EditorError {
    /// The block does not exist (never did, or was disposed).
    #[error("block not found: {id}")]
    BlockNotFound { id: BlockId },

    /// The command does not apply to a block of this role.
    #[error("block {id} is a {found:?}, command needs a {expected:?}")]
    WrongRole {
        id: BlockId,
        expected: BlockRole,
        found: BlockRole,
    },
}

impl EditorError {
    /// `true` if the error means the target block is gone and the step that
    /// hit it is now moot.
    pub fn is_stale(&self) -> bool {
        matches!(self, EditorError::BlockNotFound { .. })
    }
}

impl From<procbind_core::CoreError> for EditorError {
    fn from(err: procbind_core::CoreError) -> Self {
        match err {
            procbind_core::CoreError::RoleMismatch {
                id,
                expected,
                found,
            } => EditorError::WrongRole {
                id,
                expected,
                found,
            },
        }
    }
}
