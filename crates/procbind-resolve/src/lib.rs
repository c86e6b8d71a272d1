//! Resolution logic for procedure bindings.
//!
//! - [`sync`]: make call sites' bound parameters mirror their definition
//! - [`dedup`]: decide which duplicate definitions must go, and carry it out
//! - [`sweep`]: whole-graph dedup + sync, the default cleanup trigger

pub mod dedup;
pub mod sweep;
pub mod sync;

pub use dedup::{
    apply, plan, plan_for_family, plan_for_spawned, ApplyReport, DedupRule, DefinitionInfo,
    Resolution, RULES,
};
pub use sweep::{full_sweep, SweepReport};
pub use sync::{resolve_identities, sync_call_site, sync_callers, SyncOutcome, SyncTally};
