//! Duplicate-definition resolution.
//!
//! Planning is pure: [`plan`] looks at a snapshot of definitions and decides
//! which ones must go and which survivor each one yields to. [`apply`] then
//! executes a plan against the editor: rebind the removed definition's
//! callers to the survivor's name, dispose the removed definition, and
//! resynchronise the survivor's callers.
//!
//! # Precedence
//!
//! Each definition is tested against [`RULES`] in order and the first rule
//! that fires decides its fate:
//!
//! 1. [`DedupRule::ExactDuplicate`]: other live definitions carry the very
//!    same name. The one with the most parameters survives (first wins ties).
//! 2. [`DedupRule::NumberedVariant`]: `DFS2` yields to a live `DFS`,
//!    whatever their parameter counts.
//! 3. [`DedupRule::RicherSibling`]: with no base definition in the family, a
//!    variant yields to a sibling with more parameters, or with as many
//!    parameters that comes first in graph order. One sibling always remains.
//!
//! Definitions that appear in the middle of a call-site transaction go
//! through [`plan_for_spawned`] instead, which adds
//! [`DedupRule::PriorSibling`] in front of the table and never removes a
//! definition that predates the transaction.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::Serialize;

use procbind_core::name::{canonical_base, is_numbered_variant};
use procbind_core::{BlockId, Definition, NAME_FIELD};
use procbind_editor::{EditorHost, GraphQuery};

use crate::sync::{sync_callers, SyncTally};

/// The planner's view of a definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefinitionInfo {
    pub id: BlockId,
    pub name: String,
    pub parameter_count: usize,
}

impl From<&Definition> for DefinitionInfo {
    fn from(def: &Definition) -> Self {
        DefinitionInfo {
            id: def.id,
            name: def.name.clone(),
            parameter_count: def.parameters.len(),
        }
    }
}

/// One row of the precedence table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DedupRule {
    ExactDuplicate,
    NumberedVariant,
    RicherSibling,
    /// A spawned definition yields to a pre-existing family member it does
    /// not strictly out-rank. Needs the transaction's prior set, so only
    /// [`plan_for_spawned`] applies it.
    PriorSibling,
}

/// Rules in precedence order. The first match wins.
pub const RULES: [DedupRule; 3] = [
    DedupRule::ExactDuplicate,
    DedupRule::NumberedVariant,
    DedupRule::RicherSibling,
];

/// The definition with the most parameters; the first one on ties.
fn richest<'a>(candidates: impl IntoIterator<Item = &'a DefinitionInfo>) -> Option<&'a DefinitionInfo> {
    let mut best: Option<&DefinitionInfo> = None;
    for def in candidates {
        match best {
            Some(b) if def.parameter_count <= b.parameter_count => {}
            _ => best = Some(def),
        }
    }
    best
}

impl DedupRule {
    /// Evaluates this rule for `candidate` against the live members of its
    /// family (which include `candidate` itself).
    ///
    /// Returns the definition `candidate` must yield to, or `None` if the
    /// rule does not fire.
    pub fn evaluate<'a>(
        self,
        candidate: &DefinitionInfo,
        family: &[&'a DefinitionInfo],
    ) -> Option<&'a DefinitionInfo> {
        match self {
            DedupRule::ExactDuplicate => {
                let same_name: Vec<&DefinitionInfo> = family
                    .iter()
                    .copied()
                    .filter(|d| d.name == candidate.name)
                    .collect();
                if same_name.len() < 2 {
                    return None;
                }
                richest(same_name).filter(|keep| keep.id != candidate.id)
            }
            DedupRule::NumberedVariant => {
                if !is_numbered_variant(&candidate.name) {
                    return None;
                }
                let base = canonical_base(&candidate.name)?;
                family
                    .iter()
                    .copied()
                    .find(|d| d.id != candidate.id && d.name == base)
            }
            DedupRule::RicherSibling => {
                let base = canonical_base(&candidate.name)?;
                if family.iter().any(|d| d.name == base) {
                    return None;
                }
                let position = family.iter().position(|d| d.id == candidate.id);
                richest(
                    family
                        .iter()
                        .enumerate()
                        .filter(|(_, d)| d.id != candidate.id)
                        .filter(|(index, d)| {
                            d.parameter_count > candidate.parameter_count
                                || (d.parameter_count == candidate.parameter_count
                                    && Some(*index) < position)
                        })
                        .map(|(_, d)| *d),
                )
            }
            DedupRule::PriorSibling => None,
        }
    }
}

/// A planned removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub removed: BlockId,
    pub removed_name: String,
    pub kept: BlockId,
    pub kept_name: String,
    pub rule: DedupRule,
}

/// Tests `candidate` against [`RULES`] and returns the first rule that fires
/// together with the definition it yields to.
pub fn first_match<'a>(
    candidate: &DefinitionInfo,
    family: &[&'a DefinitionInfo],
) -> Option<(DedupRule, &'a DefinitionInfo)> {
    RULES
        .iter()
        .find_map(|rule| rule.evaluate(candidate, family).map(|kept| (*rule, kept)))
}

/// Plans removals for every variant family in `definitions`.
///
/// Placeholder-named definitions belong to no family and are never planned.
/// Families are visited in order of first appearance, and within a family
/// definitions are visited in graph order until no rule fires any more.
pub fn plan(definitions: &[DefinitionInfo]) -> Vec<Resolution> {
    let mut families: IndexMap<&str, Vec<&DefinitionInfo>> = IndexMap::new();
    for def in definitions {
        if let Some(base) = canonical_base(&def.name) {
            families.entry(base).or_default().push(def);
        }
    }

    let mut resolutions = Vec::new();
    for (_, mut live) in families {
        loop {
            let next = live.iter().enumerate().find_map(|(index, candidate)| {
                first_match(candidate, &live).map(|(rule, kept)| (index, rule, kept))
            });
            let Some((index, rule, kept)) = next else {
                break;
            };
            let removed = live.remove(index);
            resolutions.push(Resolution {
                removed: removed.id,
                removed_name: removed.name.clone(),
                kept: kept.id,
                kept_name: kept.name.clone(),
                rule,
            });
        }
    }
    resolutions
}

/// Plans removals only within the variant family of `name`.
pub fn plan_for_family(definitions: &[DefinitionInfo], name: &str) -> Vec<Resolution> {
    let Some(base) = canonical_base(name) else {
        return Vec::new();
    };
    let family: Vec<DefinitionInfo> = definitions
        .iter()
        .filter(|d| canonical_base(&d.name) == Some(base))
        .cloned()
        .collect();
    plan(&family)
}

/// The pre-existing family member a spawned `candidate` must yield to:
/// one with at least as many parameters, preferring the exact name, then
/// the base, then graph order.
fn prior_rival<'a>(
    candidate: &DefinitionInfo,
    family: &[&'a DefinitionInfo],
    prior: &HashSet<BlockId>,
) -> Option<&'a DefinitionInfo> {
    let rivals: Vec<&DefinitionInfo> = family
        .iter()
        .copied()
        .filter(|d| d.id != candidate.id && prior.contains(&d.id))
        .filter(|d| candidate.parameter_count <= d.parameter_count)
        .collect();
    let base = canonical_base(&candidate.name);
    rivals
        .iter()
        .copied()
        .find(|d| d.name == candidate.name)
        .or_else(|| rivals.iter().copied().find(|d| Some(d.name.as_str()) == base))
        .or_else(|| rivals.first().copied())
}

/// Plans removals in `name`'s family after a definition appeared while a
/// call-site transaction was open.
///
/// Definitions in `prior` existed before the transaction and are never
/// removed. Every other family member is tested against
/// [`DedupRule::PriorSibling`] first, then against [`RULES`].
pub fn plan_for_spawned(
    definitions: &[DefinitionInfo],
    name: &str,
    prior: &HashSet<BlockId>,
) -> Vec<Resolution> {
    let Some(base) = canonical_base(name) else {
        return Vec::new();
    };
    let mut live: Vec<&DefinitionInfo> = definitions
        .iter()
        .filter(|d| canonical_base(&d.name) == Some(base))
        .collect();

    let mut resolutions = Vec::new();
    loop {
        let next = live
            .iter()
            .enumerate()
            .filter(|(_, candidate)| !prior.contains(&candidate.id))
            .find_map(|(index, candidate)| {
                prior_rival(candidate, &live, prior)
                    .map(|kept| (DedupRule::PriorSibling, kept))
                    .or_else(|| first_match(candidate, &live))
                    .map(|(rule, kept)| (index, rule, kept))
            });
        let Some((index, rule, kept)) = next else {
            break;
        };
        let removed = live.remove(index);
        resolutions.push(Resolution {
            removed: removed.id,
            removed_name: removed.name.clone(),
            kept: kept.id,
            kept_name: kept.name.clone(),
            rule,
        });
    }
    resolutions
}

/// Snapshot of the host's definitions in planner form.
pub fn snapshot(host: &dyn EditorHost) -> Vec<DefinitionInfo> {
    GraphQuery::new(host)
        .definitions()
        .iter()
        .map(DefinitionInfo::from)
        .collect()
}

/// What [`apply`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    /// Resolutions that were carried out.
    pub disposed: Vec<Resolution>,
    /// Resolutions skipped because the removed definition was already gone.
    pub skipped: usize,
    /// Call sites renamed to a surviving definition.
    pub rebound_callers: usize,
    pub sync: SyncTally,
}

/// Executes a plan against the editor.
///
/// Every step re-reads the graph first: a definition disposed by the host
/// since planning is skipped, not treated as an error.
pub fn apply(host: &dyn EditorHost, resolutions: &[Resolution]) -> ApplyReport {
    let query = GraphQuery::new(host);
    let mut report = ApplyReport::default();

    for resolution in resolutions {
        if query.definition(resolution.removed).is_none() {
            tracing::debug!(
                "definition {} ('{}') already gone, resolution is moot",
                resolution.removed,
                resolution.removed_name
            );
            report.skipped += 1;
            continue;
        }

        if resolution.removed_name != resolution.kept_name {
            for caller in query.callers_of(&resolution.removed_name) {
                match host.set_field(caller.id, NAME_FIELD, &resolution.kept_name) {
                    Ok(()) => report.rebound_callers += 1,
                    Err(err) => tracing::debug!("rebind of caller {} is moot: {}", caller.id, err),
                }
            }
        }

        host.dispose(resolution.removed);
        tracing::info!(
            "disposed duplicate definition {} ('{}') in favour of {} ('{}') [{:?}]",
            resolution.removed,
            resolution.removed_name,
            resolution.kept,
            resolution.kept_name,
            resolution.rule
        );

        let survivor = query
            .definition(resolution.kept)
            .or_else(|| query.definition_named(&resolution.kept_name));
        if let Some(survivor) = survivor {
            report.sync.merge(sync_callers(host, &survivor));
        }
        report.disposed.push(resolution.clone());
    }

    report
}
