//! Block data model: the nodes of the editor's visual program graph.
//!
//! [`Block`] is the untyped record the editor hands out. [`Definition`] and
//! [`CallSite`] are typed views over a block of the matching [`BlockRole`],
//! obtained with `TryFrom<Block>`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::CoreError;
use crate::id::{BlockId, VariableId};

/// Field key holding a procedure's name on definition and call-site blocks.
pub const NAME_FIELD: &str = "NAME";

/// What a block is, as far as procedure binding is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockRole {
    /// Declares a named procedure's signature and body.
    Definition,
    /// Invokes a named procedure with bound arguments.
    CallSite,
    /// Anything else in the workspace.
    Other,
}

/// One bound parameter: a human label plus the variable it refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSlot {
    pub label: String,
    pub identity: VariableId,
}

/// A procedure's parameter metadata.
///
/// On definitions the identity list is the definition's own bookkeeping and
/// may lag behind the labels (stale or missing). On call sites it is the
/// bound argument list and is always written aligned. Equality is structural
/// over labels *and* identities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterList {
    pub labels: SmallVec<[String; 4]>,
    pub identities: SmallVec<[VariableId; 4]>,
}

impl ParameterList {
    /// An empty list (a zero-parameter procedure).
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an aligned list from slots.
    pub fn from_slots(slots: impl IntoIterator<Item = ParamSlot>) -> Self {
        let mut list = ParameterList::new();
        for slot in slots {
            list.labels.push(slot.label);
            list.identities.push(slot.identity);
        }
        list
    }

    /// Number of parameters, derived from the labels.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// `true` when every label has exactly one identity.
    pub fn is_aligned(&self) -> bool {
        self.labels.len() == self.identities.len()
    }

    /// Views the list as slots. `None` unless aligned.
    pub fn slots(&self) -> Option<Vec<ParamSlot>> {
        if !self.is_aligned() {
            return None;
        }
        Some(
            self.labels
                .iter()
                .zip(self.identities.iter())
                .map(|(label, identity)| ParamSlot {
                    label: label.clone(),
                    identity: *identity,
                })
                .collect(),
        )
    }
}

/// A node in the editor graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    pub role: BlockRole,
    /// Named fields in insertion order (e.g. `NAME`).
    pub fields: IndexMap<String, String>,
    /// Parameter metadata (definitions) or bound arguments (call sites).
    pub parameters: ParameterList,
}

impl Block {
    /// Creates a block with no fields and no parameters.
    pub fn new(id: BlockId, role: BlockRole) -> Self {
        Block {
            id,
            role,
            fields: IndexMap::new(),
            parameters: ParameterList::new(),
        }
    }

    /// Returns the value of a field, if set.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Returns the procedure name, or `""` when the block has none.
    pub fn name(&self) -> &str {
        self.field(NAME_FIELD).unwrap_or("")
    }

    pub fn is_definition(&self) -> bool {
        self.role == BlockRole::Definition
    }

    pub fn is_call_site(&self) -> bool {
        self.role == BlockRole::CallSite
    }
}

/// Typed view of a [`BlockRole::Definition`] block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Definition {
    pub id: BlockId,
    pub name: String,
    pub parameters: ParameterList,
}

/// Typed view of a [`BlockRole::CallSite`] block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSite {
    pub id: BlockId,
    pub name: String,
    pub bound_parameters: ParameterList,
}

impl TryFrom<Block> for Definition {
    type Error = CoreError;

    fn try_from(block: Block) -> Result<Self, Self::Error> {
        if block.role != BlockRole::Definition {
            return Err(CoreError::RoleMismatch {
                id: block.id,
                expected: BlockRole::Definition,
                found: block.role,
            });
        }
        Ok(Definition {
            id: block.id,
            name: block.name().to_string(),
            parameters: block.parameters,
        })
    }
}

impl TryFrom<Block> for CallSite {
    type Error = CoreError;

    fn try_from(block: Block) -> Result<Self, Self::Error> {
        if block.role != BlockRole::CallSite {
            return Err(CoreError::RoleMismatch {
                id: block.id,
                expected: BlockRole::CallSite,
                found: block.role,
            });
        }
        Ok(CallSite {
            id: block.id,
            name: block.name().to_string(),
            bound_parameters: block.parameters,
        })
    }
}

/// Kind of graph mutation reported by the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Create,
    Change,
    Delete,
}

/// A mutation event from the editor's event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEvent {
    pub kind: EventKind,
    pub block_id: BlockId,
}

impl GraphEvent {
    pub fn new(kind: EventKind, block_id: BlockId) -> Self {
        GraphEvent { kind, block_id }
    }
}
