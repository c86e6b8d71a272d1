//! Core error types for procbind-core.
//!
//! Uses `thiserror` for structured, matchable error variants.

use thiserror::Error;

use crate::block::BlockRole;
use crate::id::BlockId;

/// Errors produced by the procbind-core data model.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A block was viewed as a role it does not have.
    #[error("block {id} is a {found:?}, expected a {expected:?}")]
    RoleMismatch {
        id: BlockId,
        expected: BlockRole,
        found: BlockRole,
    },
}
