//! Full-graph duplicate sweep.
//!
//! [`full_sweep`] is the default cleanup the controller triggers once the
//! graph has been quiet for a debounce interval: dedup every variant family,
//! then bring every call site's bound parameters in line with the definition
//! it names. On a graph that already satisfies the invariants it issues no
//! commands at all.

use serde::Serialize;

use procbind_editor::{EditorHost, GraphQuery};

use crate::dedup::{self, Resolution};
use crate::sync::{sync_call_site, SyncTally};

/// Summary of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub disposed: Vec<Resolution>,
    pub rebound_callers: usize,
    pub sync: SyncTally,
}

impl SweepReport {
    /// `true` if the sweep changed nothing.
    pub fn is_clean(&self) -> bool {
        self.disposed.is_empty() && self.rebound_callers == 0 && self.sync.updated == 0
    }
}

/// Dedups every family and resynchronises every bound call site.
pub fn full_sweep(host: &dyn EditorHost) -> SweepReport {
    let resolutions = dedup::plan(&dedup::snapshot(host));
    let applied = dedup::apply(host, &resolutions);

    let mut report = SweepReport {
        disposed: applied.disposed,
        rebound_callers: applied.rebound_callers,
        sync: applied.sync,
    };

    let query = GraphQuery::new(host);
    for call in query.call_sites() {
        if let Some(def) = query.definition_named(&call.name) {
            report.sync.record(sync_call_site(host, call.id, def.id));
        }
    }

    if report.is_clean() {
        tracing::debug!("sweep found nothing to do");
    } else {
        tracing::info!(
            "sweep disposed {} definition(s), rebound {} caller(s), updated {} call site(s)",
            report.disposed.len(),
            report.rebound_callers,
            report.sync.updated
        );
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use procbind_core::name::canonical_base;
    use procbind_editor::InMemoryEditor;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn variant_is_folded_into_base() {
        let editor = InMemoryEditor::new();
        let base = editor.create_definition("DFS", &[]);
        let variant = editor.create_definition("DFS2", &[]);
        let caller = editor.create_call_site("DFS2");

        let report = full_sweep(&editor);

        assert_eq!(report.disposed.len(), 1);
        assert!(editor.contains(base));
        assert!(!editor.contains(variant));
        assert_eq!(
            GraphQuery::new(&editor).call_site(caller).unwrap().name,
            "DFS"
        );
    }

    #[test]
    fn richer_duplicate_replaces_poorer_and_rebinds_parameters() {
        let editor = InMemoryEditor::new();
        let poor = editor.create_definition("Knap", &[]);
        let caller = editor.create_call_site("Knap");
        let rich = editor.create_definition("Knap", &["items", "capacity"]);

        full_sweep(&editor);

        assert!(!editor.contains(poor));
        assert!(editor.contains(rich));
        let call = GraphQuery::new(&editor).call_site(caller).unwrap();
        assert_eq!(call.bound_parameters.len(), 2);
        assert_eq!(call.bound_parameters, editor.parameters(rich).unwrap());
    }

    #[test]
    fn unsynced_call_site_is_repaired() {
        let editor = InMemoryEditor::new();
        let def = editor.create_definition("Fib", &["n"]);
        let caller = editor.create_call_site("Fib");

        let report = full_sweep(&editor);

        assert_eq!(report.sync.updated, 1);
        assert_eq!(
            editor.parameters(caller).unwrap(),
            editor.parameters(def).unwrap()
        );
    }

    #[test]
    fn second_sweep_is_clean() {
        let editor = InMemoryEditor::new();
        editor.create_definition("DFS", &["node"]);
        editor.create_definition("DFS", &[]);
        editor.create_definition("DFS3", &["a", "b"]);
        editor.create_call_site("DFS");
        editor.create_call_site("DFS3");

        assert!(!full_sweep(&editor).is_clean());
        editor.clear_commands();

        assert!(full_sweep(&editor).is_clean());
        assert!(editor.commands().is_empty());
    }

    fn family_name() -> impl Strategy<Value = String> {
        (
            prop::sample::select(vec!["DFS", "Knap", "Solve"]),
            prop::option::of(2u8..4),
        )
            .prop_map(|(base, suffix)| match suffix {
                Some(n) => format!("{base}{n}"),
                None => base.to_string(),
            })
    }

    proptest! {
        #[test]
        fn sweep_converges_and_is_idempotent(
            defs in prop::collection::vec((family_name(), 0usize..3), 1..8),
        ) {
            let labels = ["a", "b", "c"];
            let editor = InMemoryEditor::new();
            for (name, count) in &defs {
                editor.create_definition(name, &labels[..*count]);
                editor.create_call_site(name);
            }

            full_sweep(&editor);

            let query = GraphQuery::new(&editor);
            let live = query.definitions();

            // No two live definitions share a name.
            let names: HashSet<&str> = live.iter().map(|d| d.name.as_str()).collect();
            prop_assert_eq!(names.len(), live.len());

            // Exactly one live definition per canonical base.
            let bases: HashSet<&str> = live.iter().filter_map(|d| canonical_base(&d.name)).collect();
            prop_assert_eq!(bases.len(), live.len());

            // No live variant coexists with its base.
            for def in &live {
                if let Some(base) = canonical_base(&def.name) {
                    if base != def.name {
                        prop_assert!(!names.contains(base));
                    }
                }
            }

            // Every caller names a live definition and mirrors its parameters.
            for call in query.call_sites() {
                let def = query.definition_named(&call.name);
                prop_assert!(def.is_some(), "caller {} names no definition", call.name);
                let def = def.unwrap();
                prop_assert_eq!(&call.bound_parameters, &def.parameters);
            }

            editor.clear_commands();
            prop_assert!(full_sweep(&editor).is_clean());
            prop_assert!(editor.commands().is_empty());
        }
    }
}
