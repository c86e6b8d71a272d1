//! Data model for procedure binding in a visual block editor.
//!
//! A procedure is one *definition* block plus any number of *call-site*
//! blocks referring to it by name. This crate holds the shared vocabulary:
//! stable IDs, blocks and their typed views, graph events, and the pure
//! name helpers that define variant families.

pub mod block;
pub mod error;
pub mod id;
pub mod name;

// Re-export commonly used types
pub use block::{
    Block, BlockRole, CallSite, Definition, EventKind, GraphEvent, ParamSlot, ParameterList,
    NAME_FIELD,
};
pub use error::CoreError;
pub use id::{BlockId, VariableId};
