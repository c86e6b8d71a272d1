//! In-memory implementation of [`EditorHost`].
//!
//! [`InMemoryEditor`] is a first-class host for tests and for embedding the
//! reconciler without a real editor. It behaves like the editors the
//! reconciler was written against:
//!
//! - events are delivered synchronously to every listener, after the graph
//!   lock has been released;
//! - events raised while suppressed are dropped;
//! - with [`auto_define`](InMemoryEditor::auto_define) enabled, creating a
//!   call site for a name with no definition queues the host's
//!   auto-definition reflex, which fires later when the test (standing in
//!   for the host's own scheduler) calls [`run_reflexes`](InMemoryEditor::run_reflexes).
//!
//! Commands issued through the [`EditorHost`] trait are recorded in a log so
//! tests can assert on exactly what the reconciler did. User actions
//! (`create_*`, `rename`, `remove`) are not logged.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use indexmap::IndexMap;
use serde::Serialize;

use procbind_core::name;
use procbind_core::{
    Block, BlockId, BlockRole, CallSite, Definition, EventKind, GraphEvent, ParameterList,
    VariableId, NAME_FIELD,
};

use crate::error::EditorError;
use crate::traits::{EditorHost, EventListener, SubscriptionId};

/// A command issued through the [`EditorHost`] trait.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum EditorCommand {
    SetField {
        id: BlockId,
        key: String,
        value: String,
    },
    SetParameters {
        id: BlockId,
        parameters: ParameterList,
    },
    Dispose {
        id: BlockId,
    },
}

#[derive(Debug, Default)]
struct EditorState {
    /// Live blocks in creation order.
    blocks: IndexMap<BlockId, Block>,
    /// Variable namespace: name -> identity.
    variables: IndexMap<String, VariableId>,
    next_block_id: u32,
    next_variable_id: u32,
    suppress_depth: u32,
    auto_define: bool,
    /// Names the auto-definition reflex will create definitions for.
    pending_reflexes: Vec<String>,
    commands: Vec<EditorCommand>,
}

impl EditorState {
    fn allocate_block(&mut self, role: BlockRole, name: &str, parameters: ParameterList) -> BlockId {
        let id = BlockId(self.next_block_id);
        self.next_block_id += 1;

        let mut block = Block::new(id, role);
        block
            .fields
            .insert(NAME_FIELD.to_string(), name.to_string());
        block.parameters = parameters;
        self.blocks.insert(id, block);
        id
    }

    fn declare_variable(&mut self, name: &str) -> VariableId {
        if let Some(&id) = self.variables.get(name) {
            return id;
        }
        let id = VariableId(self.next_variable_id);
        self.next_variable_id += 1;
        self.variables.insert(name.to_string(), id);
        id
    }

    fn has_definition_named(&self, name: &str) -> bool {
        self.blocks
            .values()
            .any(|b| b.is_definition() && b.name() == name)
    }

    fn get(&self, id: BlockId) -> Result<&Block, EditorError> {
        self.blocks.get(&id).ok_or(EditorError::BlockNotFound { id })
    }

    fn get_mut(&mut self, id: BlockId) -> Result<&mut Block, EditorError> {
        self.blocks
            .get_mut(&id)
            .ok_or(EditorError::BlockNotFound { id })
    }
}

/// In-memory editor graph with synchronous event delivery.
pub struct InMemoryEditor {
    state: Mutex<EditorState>,
    listeners: DashMap<SubscriptionId, EventListener>,
}

impl InMemoryEditor {
    /// Creates an empty editor with the auto-definition reflex disabled.
    pub fn new() -> Self {
        InMemoryEditor {
            state: Mutex::new(EditorState::default()),
            listeners: DashMap::new(),
        }
    }

    /// Enables or disables the host's auto-definition reflex.
    pub fn auto_define(self, enabled: bool) -> Self {
        self.state().auto_define = enabled;
        self
    }

    fn state(&self) -> MutexGuard<'_, EditorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Delivers an event to every listener unless events are suppressed.
    ///
    /// Must be called without the state lock held: listeners may call back
    /// into the editor.
    fn emit(&self, kind: EventKind, block_id: BlockId) {
        if self.state().suppress_depth > 0 {
            return;
        }
        let event = GraphEvent::new(kind, block_id);
        let listeners: Vec<EventListener> = self
            .listeners
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for listener in listeners {
            listener(event);
        }
    }

    // -------------------------------------------------------------------
    // User actions
    // -------------------------------------------------------------------

    /// Declares a variable in the namespace, returning its identity.
    /// Declaring an existing name returns the existing identity.
    pub fn declare_variable(&self, name: &str) -> VariableId {
        self.state().declare_variable(name)
    }

    /// Creates a definition whose parameters are the given labels, each bound
    /// to the namespace variable of the same name.
    pub fn create_definition(&self, name: &str, labels: &[&str]) -> BlockId {
        let id = {
            let mut state = self.state();
            let mut parameters = ParameterList::new();
            for label in labels {
                let identity = state.declare_variable(label);
                parameters.labels.push((*label).to_string());
                parameters.identities.push(identity);
            }
            state.allocate_block(BlockRole::Definition, name, parameters)
        };
        self.emit(EventKind::Create, id);
        id
    }

    /// Creates a definition with explicit (possibly stale or short) identity
    /// bookkeeping.
    pub fn create_definition_with_identities(
        &self,
        name: &str,
        labels: &[&str],
        identities: &[VariableId],
    ) -> BlockId {
        let parameters = ParameterList {
            labels: labels.iter().map(|l| (*l).to_string()).collect(),
            identities: identities.iter().copied().collect(),
        };
        let id = self
            .state()
            .allocate_block(BlockRole::Definition, name, parameters);
        self.emit(EventKind::Create, id);
        id
    }

    /// Creates a call site with no bound parameters.
    ///
    /// With the reflex enabled, a valid name that no definition carries yet
    /// queues an auto-definition for that name.
    pub fn create_call_site(&self, name: &str) -> BlockId {
        let id = {
            let mut state = self.state();
            if state.auto_define && name::is_valid(name) && !state.has_definition_named(name) {
                state.pending_reflexes.push(name.to_string());
            }
            state.allocate_block(BlockRole::CallSite, name, ParameterList::new())
        };
        self.emit(EventKind::Create, id);
        id
    }

    /// Creates a block that is neither a definition nor a call site.
    pub fn create_other(&self) -> BlockId {
        let id = self
            .state()
            .allocate_block(BlockRole::Other, "", ParameterList::new());
        self.emit(EventKind::Create, id);
        id
    }

    /// Renames a block as the user would.
    pub fn rename(&self, id: BlockId, name: &str) -> Result<(), EditorError> {
        self.state()
            .get_mut(id)?
            .fields
            .insert(NAME_FIELD.to_string(), name.to_string());
        self.emit(EventKind::Change, id);
        Ok(())
    }

    /// Deletes a block as the user would.
    pub fn remove(&self, id: BlockId) -> Result<(), EditorError> {
        self.state()
            .blocks
            .shift_remove(&id)
            .ok_or(EditorError::BlockNotFound { id })?;
        self.emit(EventKind::Delete, id);
        Ok(())
    }

    /// Fires every queued auto-definition reflex, creating one empty
    /// definition per queued name. Returns the new definitions' ids.
    pub fn run_reflexes(&self) -> Vec<BlockId> {
        let names = std::mem::take(&mut self.state().pending_reflexes);
        names
            .iter()
            .map(|name| self.create_definition(name, &[]))
            .collect()
    }

    /// Number of reflexes waiting to fire.
    pub fn pending_reflexes(&self) -> usize {
        self.state().pending_reflexes.len()
    }

    // -------------------------------------------------------------------
    // Inspection
    // -------------------------------------------------------------------

    /// Commands issued through [`EditorHost`] since creation or the last
    /// [`clear_commands`](Self::clear_commands).
    pub fn commands(&self) -> Vec<EditorCommand> {
        self.state().commands.clone()
    }

    pub fn clear_commands(&self) {
        self.state().commands.clear();
    }

    /// All live definitions in creation order.
    pub fn definitions(&self) -> Vec<Definition> {
        self.blocks_by_role(BlockRole::Definition)
            .into_iter()
            .filter_map(|b| Definition::try_from(b).ok())
            .collect()
    }

    /// All live call sites in creation order.
    pub fn call_sites(&self) -> Vec<CallSite> {
        self.blocks_by_role(BlockRole::CallSite)
            .into_iter()
            .filter_map(|b| CallSite::try_from(b).ok())
            .collect()
    }

    pub fn contains(&self, id: BlockId) -> bool {
        self.state().blocks.contains_key(&id)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_suppressed(&self) -> bool {
        self.state().suppress_depth > 0
    }
}

impl Default for InMemoryEditor {
    fn default() -> Self {
        Self::new()
    }
}

impl EditorHost for InMemoryEditor {
    fn subscribe(&self, listener: EventListener) -> SubscriptionId {
        let id = SubscriptionId::new();
        self.listeners.insert(id, listener);
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.listeners.remove(&id);
    }

    fn suppress_events(&self) {
        self.state().suppress_depth += 1;
    }

    fn resume_events(&self) {
        let mut state = self.state();
        state.suppress_depth = state.suppress_depth.saturating_sub(1);
    }

    fn block(&self, id: BlockId) -> Option<Block> {
        self.state().blocks.get(&id).cloned()
    }

    fn blocks_by_role(&self, role: BlockRole) -> Vec<Block> {
        self.state()
            .blocks
            .values()
            .filter(|b| b.role == role)
            .cloned()
            .collect()
    }

    fn field(&self, id: BlockId, key: &str) -> Result<Option<String>, EditorError> {
        Ok(self.state().get(id)?.field(key).map(str::to_string))
    }

    fn parameters(&self, id: BlockId) -> Result<ParameterList, EditorError> {
        Ok(self.state().get(id)?.parameters.clone())
    }

    fn lookup_variable(&self, name: &str) -> Option<VariableId> {
        self.state().variables.get(name).copied()
    }

    fn callers_of(&self, name: &str) -> Vec<Block> {
        self.state()
            .blocks
            .values()
            .filter(|b| b.is_call_site() && b.name() == name)
            .cloned()
            .collect()
    }

    fn set_field(&self, id: BlockId, key: &str, value: &str) -> Result<(), EditorError> {
        {
            let mut state = self.state();
            state
                .get_mut(id)?
                .fields
                .insert(key.to_string(), value.to_string());
            state.commands.push(EditorCommand::SetField {
                id,
                key: key.to_string(),
                value: value.to_string(),
            });
        }
        self.emit(EventKind::Change, id);
        Ok(())
    }

    fn set_parameters(&self, id: BlockId, parameters: ParameterList) -> Result<(), EditorError> {
        {
            let mut state = self.state();
            let block = state.get_mut(id)?;
            if block.role != BlockRole::CallSite {
                return Err(EditorError::WrongRole {
                    id,
                    expected: BlockRole::CallSite,
                    found: block.role,
                });
            }
            block.parameters = parameters.clone();
            state
                .commands
                .push(EditorCommand::SetParameters { id, parameters });
        }
        self.emit(EventKind::Change, id);
        Ok(())
    }

    fn dispose(&self, id: BlockId) {
        let removed = {
            let mut state = self.state();
            let removed = state.blocks.shift_remove(&id).is_some();
            if removed {
                state.commands.push(EditorCommand::Dispose { id });
            }
            removed
        };
        if removed {
            self.emit(EventKind::Delete, id);
        }
    }
}
