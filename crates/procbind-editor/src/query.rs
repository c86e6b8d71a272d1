//! Read-only queries over the editor graph.
//!
//! [`GraphQuery`] never caches: every call re-reads the host, because the
//! graph can change between any two calls. Failures (a block disposed
//! between listing and reading) are swallowed and read as "absent".

use procbind_core::{Block, BlockId, BlockRole, CallSite, Definition};

use crate::traits::EditorHost;

/// Role-aware read access to an [`EditorHost`].
#[derive(Clone, Copy)]
pub struct GraphQuery<'a> {
    host: &'a dyn EditorHost,
}

impl<'a> GraphQuery<'a> {
    pub fn new(host: &'a dyn EditorHost) -> Self {
        GraphQuery { host }
    }

    /// The underlying host.
    pub fn host(&self) -> &'a dyn EditorHost {
        self.host
    }

    /// All live definitions, in graph order.
    pub fn definitions(&self) -> Vec<Definition> {
        self.host
            .blocks_by_role(BlockRole::Definition)
            .into_iter()
            .filter_map(|b| Definition::try_from(b).ok())
            .collect()
    }

    /// All live call sites, in graph order.
    pub fn call_sites(&self) -> Vec<CallSite> {
        self.host
            .blocks_by_role(BlockRole::CallSite)
            .into_iter()
            .filter_map(|b| CallSite::try_from(b).ok())
            .collect()
    }

    /// Call sites currently referencing `name`.
    pub fn callers_of(&self, name: &str) -> Vec<CallSite> {
        self.host
            .callers_of(name)
            .into_iter()
            .filter_map(|b| CallSite::try_from(b).ok())
            .collect()
    }

    pub fn block(&self, id: BlockId) -> Option<Block> {
        self.host.block(id)
    }

    /// The definition with this id, if it is still live.
    pub fn definition(&self, id: BlockId) -> Option<Definition> {
        let block = self.host.block(id)?;
        match Definition::try_from(block) {
            Ok(def) => Some(def),
            Err(err) => {
                tracing::debug!("not a definition: {}", err);
                None
            }
        }
    }

    /// The call site with this id, if it is still live.
    pub fn call_site(&self, id: BlockId) -> Option<CallSite> {
        let block = self.host.block(id)?;
        match CallSite::try_from(block) {
            Ok(call) => Some(call),
            Err(err) => {
                tracing::debug!("not a call site: {}", err);
                None
            }
        }
    }

    /// The first live definition whose name is exactly `name`.
    pub fn definition_named(&self, name: &str) -> Option<Definition> {
        self.definitions().into_iter().find(|d| d.name == name)
    }

    /// Reads a block's current name. `None` if the block is gone.
    pub fn name_of(&self, id: BlockId) -> Option<String> {
        match self.host.field(id, procbind_core::NAME_FIELD) {
            Ok(name) => Some(name.unwrap_or_default()),
            Err(err) => {
                tracing::debug!("name of block {} unavailable: {}", id, err);
                None
            }
        }
    }

    /// Number of parameters a definition declares, re-read from the host.
    ///
    /// Returns 0 when the metadata is unavailable.
    pub fn parameter_count_of(&self, definition: BlockId) -> usize {
        match self.host.parameters(definition) {
            Ok(params) => params.len(),
            Err(err) => {
                tracing::debug!("parameter count of {} unavailable: {}", definition, err);
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryEditor;

    #[test]
    fn role_filtered_snapshots() {
        let editor = InMemoryEditor::new();
        let def = editor.create_definition("DFS", &["node"]);
        let call = editor.create_call_site("DFS");
        editor.create_other();

        let query = GraphQuery::new(&editor);
        let defs: Vec<BlockId> = query.definitions().iter().map(|d| d.id).collect();
        let calls: Vec<BlockId> = query.call_sites().iter().map(|c| c.id).collect();
        assert_eq!(defs, vec![def]);
        assert_eq!(calls, vec![call]);
    }

    #[test]
    fn snapshots_are_not_cached() {
        let editor = InMemoryEditor::new();
        let query = GraphQuery::new(&editor);
        assert!(query.definitions().is_empty());

        editor.create_definition("DFS", &[]);
        assert_eq!(query.definitions().len(), 1);
    }

    #[test]
    fn parameter_count_of_missing_block_is_zero() {
        let editor = InMemoryEditor::new();
        let def = editor.create_definition("Knap", &["items", "capacity"]);
        let query = GraphQuery::new(&editor);
        assert_eq!(query.parameter_count_of(def), 2);

        editor.remove(def).unwrap();
        assert_eq!(query.parameter_count_of(def), 0);
    }

    #[test]
    fn typed_lookups_check_role() {
        let editor = InMemoryEditor::new();
        let def = editor.create_definition("DFS", &[]);
        let query = GraphQuery::new(&editor);

        assert!(query.definition(def).is_some());
        assert!(query.call_site(def).is_none());
        assert!(query.definition(BlockId(999)).is_none());
    }

    #[test]
    fn definition_named_picks_first_exact_match() {
        let editor = InMemoryEditor::new();
        editor.create_definition("DFS2", &[]);
        let first = editor.create_definition("DFS", &[]);
        editor.create_definition("DFS", &["extra"]);

        let query = GraphQuery::new(&editor);
        assert_eq!(query.definition_named("DFS").map(|d| d.id), Some(first));
        assert!(query.definition_named("BFS").is_none());
    }

    #[test]
    fn name_of_disposed_block_is_none() {
        let editor = InMemoryEditor::new();
        let call = editor.create_call_site("Solve");
        let query = GraphQuery::new(&editor);
        assert_eq!(query.name_of(call).as_deref(), Some("Solve"));

        editor.remove(call).unwrap();
        assert_eq!(query.name_of(call), None);
    }
}
