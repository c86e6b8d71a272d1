//! Parameter synchronisation: make a call site's bound arguments mirror its
//! definition's parameters.
//!
//! Identities are resolved per slot, preferring the definition's own
//! identity list and falling back to the variable namespace. A resolution
//! that comes up short is never written: a call site with an outdated list
//! is recoverable on the next pass, a call site with a truncated one is not.

use serde::Serialize;

use procbind_core::{BlockId, Definition, ParameterList, VariableId};
use procbind_editor::{EditorHost, GraphQuery};

/// What a single synchronisation attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyncOutcome {
    /// The call site's bound parameters were rewritten.
    Updated,
    /// The call site already matched; nothing was written.
    Unchanged,
    /// Only `resolved` of `expected` identities could be resolved; nothing
    /// was written.
    Ambiguous { resolved: usize, expected: usize },
    /// One of the blocks disappeared; the step no longer applies.
    Moot,
}

/// Running totals over many [`SyncOutcome`]s.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncTally {
    pub updated: usize,
    pub unchanged: usize,
    pub ambiguous: usize,
    pub moot: usize,
}

impl SyncTally {
    pub fn record(&mut self, outcome: SyncOutcome) {
        match outcome {
            SyncOutcome::Updated => self.updated += 1,
            SyncOutcome::Unchanged => self.unchanged += 1,
            SyncOutcome::Ambiguous { .. } => self.ambiguous += 1,
            SyncOutcome::Moot => self.moot += 1,
        }
    }

    pub fn merge(&mut self, other: SyncTally) {
        self.updated += other.updated;
        self.unchanged += other.unchanged;
        self.ambiguous += other.ambiguous;
        self.moot += other.moot;
    }
}

/// Resolves one identity per parameter label.
///
/// Uses the definition's stored identities when there is exactly one per
/// label. Otherwise each label is looked up in the variable namespace and
/// labels that do not resolve are dropped, so the result may be shorter
/// than `parameters`.
pub fn resolve_identities(host: &dyn EditorHost, parameters: &ParameterList) -> Vec<VariableId> {
    if parameters.is_aligned() {
        return parameters.identities.to_vec();
    }
    parameters
        .labels
        .iter()
        .filter_map(|label| {
            let found = host.lookup_variable(label);
            if found.is_none() {
                tracing::debug!("parameter '{}' has no variable in the namespace", label);
            }
            found
        })
        .collect()
}

/// Makes `call_site`'s bound parameters equal `definition`'s parameters.
///
/// Idempotent: an already-synced call site is left untouched.
pub fn sync_call_site(host: &dyn EditorHost, call_site: BlockId, definition: BlockId) -> SyncOutcome {
    let parameters = match host.parameters(definition) {
        Ok(parameters) => parameters,
        Err(err) => {
            tracing::debug!("sync skipped, definition gone: {}", err);
            return SyncOutcome::Moot;
        }
    };

    let identities = resolve_identities(host, &parameters);
    if identities.len() != parameters.len() {
        tracing::debug!(
            "sync of call site {} to {} skipped: resolved {} of {} identities",
            call_site,
            definition,
            identities.len(),
            parameters.len()
        );
        return SyncOutcome::Ambiguous {
            resolved: identities.len(),
            expected: parameters.len(),
        };
    }

    let desired = ParameterList {
        labels: parameters.labels,
        identities: identities.into_iter().collect(),
    };

    let current = match host.parameters(call_site) {
        Ok(current) => current,
        Err(err) => {
            tracing::debug!("sync skipped, call site gone: {}", err);
            return SyncOutcome::Moot;
        }
    };
    if current == desired {
        return SyncOutcome::Unchanged;
    }

    match host.set_parameters(call_site, desired) {
        Ok(()) => SyncOutcome::Updated,
        Err(err) if err.is_stale() => {
            tracing::debug!("sync write raced a disposal: {}", err);
            SyncOutcome::Moot
        }
        Err(err) => {
            tracing::warn!("sync of call site {} failed: {}", call_site, err);
            SyncOutcome::Moot
        }
    }
}

/// Synchronises every call site currently referencing `definition`'s name.
pub fn sync_callers(host: &dyn EditorHost, definition: &Definition) -> SyncTally {
    let mut tally = SyncTally::default();
    for caller in GraphQuery::new(host).callers_of(&definition.name) {
        tally.record(sync_call_site(host, caller.id, definition.id));
    }
    tally
}

#[cfg(test)]
mod tests {
    use super::*;
    use procbind_editor::{EditorCommand, InMemoryEditor};

    #[test]
    fn uses_definitions_own_identities() {
        let editor = InMemoryEditor::new();
        let def = editor.create_definition("Knap", &["items", "capacity"]);
        let call = editor.create_call_site("Knap");

        assert_eq!(sync_call_site(&editor, call, def), SyncOutcome::Updated);

        let bound = editor.parameters(call).unwrap();
        assert_eq!(bound, editor.parameters(def).unwrap());
    }

    #[test]
    fn falls_back_to_namespace_when_bookkeeping_is_stale() {
        let editor = InMemoryEditor::new();
        let items = editor.declare_variable("items");
        let capacity = editor.declare_variable("capacity");
        // One stale identity for two labels.
        let def =
            editor.create_definition_with_identities("Knap", &["items", "capacity"], &[items]);
        let call = editor.create_call_site("Knap");

        assert_eq!(sync_call_site(&editor, call, def), SyncOutcome::Updated);

        let bound = editor.parameters(call).unwrap();
        assert_eq!(bound.identities.as_slice(), &[items, capacity]);
        assert_eq!(bound.labels.as_slice(), &["items".to_string(), "capacity".to_string()]);
    }

    #[test]
    fn partial_resolution_is_a_noop() {
        let editor = InMemoryEditor::new();
        editor.declare_variable("items");
        let def = editor.create_definition_with_identities("Knap", &["items", "ghost"], &[]);
        let call = editor.create_call_site("Knap");

        let outcome = sync_call_site(&editor, call, def);
        assert_eq!(
            outcome,
            SyncOutcome::Ambiguous {
                resolved: 1,
                expected: 2
            }
        );
        assert!(editor.parameters(call).unwrap().is_empty());
        assert!(editor.commands().is_empty());
    }

    #[test]
    fn second_run_writes_nothing() {
        let editor = InMemoryEditor::new();
        let def = editor.create_definition("DFS", &["node"]);
        let call = editor.create_call_site("DFS");

        sync_call_site(&editor, call, def);
        editor.clear_commands();

        assert_eq!(sync_call_site(&editor, call, def), SyncOutcome::Unchanged);
        assert!(editor.commands().is_empty());
    }

    #[test]
    fn disposed_blocks_are_moot() {
        let editor = InMemoryEditor::new();
        let def = editor.create_definition("DFS", &["node"]);
        let call = editor.create_call_site("DFS");

        editor.remove(call).unwrap();
        assert_eq!(sync_call_site(&editor, call, def), SyncOutcome::Moot);

        let call = editor.create_call_site("DFS");
        editor.remove(def).unwrap();
        assert_eq!(sync_call_site(&editor, call, def), SyncOutcome::Moot);
    }

    #[test]
    fn sync_callers_touches_every_caller() {
        let editor = InMemoryEditor::new();
        let def = editor.create_definition("DFS", &["node"]);
        let a = editor.create_call_site("DFS");
        let b = editor.create_call_site("DFS");
        editor.create_call_site("BFS");

        let definition = GraphQuery::new(&editor).definition(def).unwrap();
        let tally = sync_callers(&editor, &definition);

        assert_eq!(tally.updated, 2);
        let written: Vec<BlockId> = editor
            .commands()
            .iter()
            .filter_map(|c| match c {
                EditorCommand::SetParameters { id, .. } => Some(*id),
                _ => None,
            })
            .collect();
        assert_eq!(written, vec![a, b]);
    }
}
