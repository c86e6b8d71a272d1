//! Per-call-site reconciliation transactions.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use procbind_core::BlockId;

use crate::timer::Timer;

/// Unique identifier for a reconciliation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        SessionId(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session:{}", self.0)
    }
}

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    Suppressing,
    NameResolution,
    ParameterSync,
    /// Events resumed, recheck timer pending.
    DelayedRecheck,
    /// Recheck done, waiting for the suppression window to close.
    Settling,
}

/// The transaction opened when a call site is created.
#[derive(Debug)]
pub(crate) struct ReconciliationSession {
    pub(crate) id: SessionId,
    pub(crate) call_site: BlockId,
    /// Definitions that existed when the session began. Anything else that
    /// shows up while the session is open was spawned by the host.
    pub(crate) prior_definition_ids: HashSet<BlockId>,
    pub(crate) phase: SessionPhase,
    pub(crate) recheck: Option<Timer>,
    pub(crate) window: Option<Timer>,
    /// Spawned definitions whose dedup check has not run yet.
    pub(crate) spawn_checks: Vec<(BlockId, Timer)>,
    /// Spawned definitions that survived dedup; scaffold-checked at close.
    pub(crate) spawned_definitions: Vec<BlockId>,
}

impl ReconciliationSession {
    pub(crate) fn new(call_site: BlockId, prior_definition_ids: HashSet<BlockId>) -> Self {
        ReconciliationSession {
            id: SessionId::new(),
            call_site,
            prior_definition_ids,
            phase: SessionPhase::Suppressing,
            recheck: None,
            window: None,
            spawn_checks: Vec::new(),
            spawned_definitions: Vec::new(),
        }
    }

    /// `true` if `definition` appeared after this session began.
    pub(crate) fn is_spawned(&self, definition: BlockId) -> bool {
        !self.prior_definition_ids.contains(&definition)
    }

    pub(crate) fn pending_timers(&self) -> usize {
        usize::from(self.recheck.is_some())
            + usize::from(self.window.is_some())
            + self.spawn_checks.len()
    }

    /// Aborts every timer. Spawn checks that never ran are returned so the
    /// caller can decide what to do with those definitions.
    pub(crate) fn cancel_timers(&mut self) -> Vec<BlockId> {
        // Dropping a timer aborts it.
        self.recheck = None;
        self.window = None;
        self.spawn_checks
            .drain(..)
            .map(|(definition, _timer)| definition)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::Message;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[test]
    fn prior_definitions_are_not_spawned() {
        let session = ReconciliationSession::new(BlockId(9), [BlockId(1), BlockId(2)].into());
        assert!(!session.is_spawned(BlockId(1)));
        assert!(session.is_spawned(BlockId(3)));
        assert_eq!(session.phase, SessionPhase::Suppressing);
    }

    #[test]
    fn session_ids_are_unique() {
        assert_ne!(SessionId::new(), SessionId::new());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_timers_returns_unchecked_spawns() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut session = ReconciliationSession::new(BlockId(0), HashSet::new());
        let id = session.id;
        session.recheck = Some(Timer::arm(
            Duration::from_millis(50),
            &tx,
            Message::RecheckDue { session: id },
        ));
        session.spawn_checks.push((
            BlockId(4),
            Timer::arm(
                Duration::from_millis(10),
                &tx,
                Message::SpawnCheckDue {
                    session: id,
                    definition: BlockId(4),
                },
            ),
        ));
        assert_eq!(session.pending_timers(), 2);

        let unchecked = session.cancel_timers();

        assert_eq!(unchecked, vec![BlockId(4)]);
        assert_eq!(session.pending_timers(), 0);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(rx.try_recv().is_err());
    }
}
