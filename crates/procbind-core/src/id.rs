//! Stable ID newtypes for editor entities.
//!
//! Both IDs are distinct newtype wrappers over `u32`, so a `BlockId` cannot be
//! accidentally used where a `VariableId` (a parameter identity) is expected.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable block identifier assigned by the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub u32);

/// Stable identity of a variable in the editor's variable namespace.
///
/// Procedure parameters are bound by identity, not by label: two parameters
/// labelled `n` in different procedures are different variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VariableId(pub u32);

// Display implementations -- just print the inner value.

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for VariableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
