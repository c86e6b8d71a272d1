//! The reconciliation controller.
//!
//! One controller is attached per editor. It runs as a single tokio task that
//! owns all of its state and drains a mailbox: editor events (posted by the
//! subscription listener), timer firings, status queries and the detach
//! request all arrive as [`Message`]s, so no two handlers ever run at once
//! and a host that delivers events synchronously can never re-enter a
//! handler.
//!
//! Lifecycle of a call-site transaction:
//!
//! 1. A call site is created: the listener snapshots the live definitions
//!    while the host is still delivering the event. The controller then
//!    suppresses events, resolves the call site's name, syncs its
//!    parameters, and resumes.
//! 2. After the recheck delay, sync once more against whatever the name now
//!    resolves to (the host may have auto-defined it in the meantime).
//! 3. Definitions that appear while the transaction is open were spawned by
//!    the host; each gets a family dedup check shortly after it appears.
//!    That check may only remove spawned definitions, never one from the
//!    snapshot.
//! 4. When the suppression window closes, spawned definitions that survived
//!    dedup but have no caller are disposed as dead scaffolds.
//!
//! Outside any transaction, every event re-arms a debounce timer; when the
//! graph has been quiet for the debounce interval and no call site carries
//! a placeholder name, the cleanup trigger runs.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

use procbind_core::name;
use procbind_core::{BlockId, BlockRole, EventKind, GraphEvent, NAME_FIELD};
use procbind_editor::{EditorHost, EventListener, GraphQuery, SubscriptionId};
use procbind_resolve::{dedup, full_sweep, sync_call_site};

use crate::config::ReconcileConfig;
use crate::debounce::DebounceState;
use crate::error::ControllerError;
use crate::session::{ReconciliationSession, SessionId, SessionPhase};
use crate::timer::Timer;

/// Callback run when the graph has settled.
pub type CleanupTrigger = Arc<dyn Fn() + Send + Sync>;

/// The default cleanup: a [`full_sweep`] over `host`.
pub fn sweep_trigger(host: Arc<dyn EditorHost>) -> CleanupTrigger {
    Arc::new(move || {
        full_sweep(host.as_ref());
    })
}

/// Unique identifier for an attached controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ControllerId(pub Uuid);

impl ControllerId {
    pub fn new() -> Self {
        ControllerId(Uuid::new_v4())
    }
}

impl Default for ControllerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ControllerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "controller:{}", self.0)
    }
}

/// Point-in-time view of a controller's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControllerStatus {
    pub controller_id: ControllerId,
    pub open_sessions: usize,
    /// Phase of each open session, oldest first.
    pub session_phases: Vec<SessionPhase>,
    /// Timers armed and not yet handled, debounce included.
    pub pending_timers: usize,
    pub last_known_good_name: Option<String>,
    pub cleanups_triggered: u64,
}

impl ControllerStatus {
    /// `true` when nothing is scheduled: no open session and no timer.
    pub fn is_quiescent(&self) -> bool {
        self.open_sessions == 0 && self.pending_timers == 0
    }
}

/// Mailbox message for the controller task.
#[derive(Debug)]
pub(crate) enum Message {
    Event(GraphEvent),
    CallSiteCreated {
        call_site: BlockId,
        /// Live definitions at the moment the host delivered the event.
        prior_definition_ids: HashSet<BlockId>,
    },
    SpawnCheckDue {
        session: SessionId,
        definition: BlockId,
    },
    RecheckDue {
        session: SessionId,
    },
    WindowElapsed {
        session: SessionId,
    },
    DebounceElapsed {
        generation: u64,
    },
    Status(oneshot::Sender<ControllerStatus>),
    Detach(Option<oneshot::Sender<()>>),
}

/// Handle to an attached controller.
///
/// Dropping the handle detaches the controller without waiting for it.
#[derive(Debug)]
pub struct ControllerHandle {
    id: ControllerId,
    tx: mpsc::UnboundedSender<Message>,
    task: Option<JoinHandle<()>>,
}

impl ControllerHandle {
    pub fn id(&self) -> ControllerId {
        self.id
    }

    /// Snapshot of the controller's state.
    pub async fn status(&self) -> Result<ControllerStatus, ControllerError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(Message::Status(reply))
            .map_err(|_| ControllerError::Detached)?;
        response.await.map_err(|_| ControllerError::Detached)
    }

    /// Cancels every pending timer, unsubscribes from the editor and stops
    /// the controller task. No reconciliation action runs afterwards.
    pub async fn detach(mut self) -> Result<(), ControllerError> {
        let (ack, acked) = oneshot::channel();
        self.tx
            .send(Message::Detach(Some(ack)))
            .map_err(|_| ControllerError::Detached)?;
        acked.await.map_err(|_| ControllerError::Detached)?;
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        Ok(())
    }
}

impl Drop for ControllerHandle {
    fn drop(&mut self) {
        if self.task.is_some() {
            let _ = self.tx.send(Message::Detach(None));
        }
    }
}

/// Attaches a controller to `host`.
///
/// Must be called from within a tokio runtime. `cleanup` runs after the
/// graph has been quiet for `config.debounce_ms`; pass
/// [`sweep_trigger`] for the standard behaviour.
pub fn attach(
    host: Arc<dyn EditorHost>,
    config: ReconcileConfig,
    cleanup: CleanupTrigger,
) -> ControllerHandle {
    let id = ControllerId::new();
    let (tx, rx) = mpsc::unbounded_channel();

    let subscription = host.subscribe(listener(Arc::downgrade(&host), tx.clone()));

    let controller = ReconciliationController {
        id,
        host,
        config,
        cleanup,
        subscription,
        tx: tx.clone(),
        sessions: IndexMap::new(),
        last_known_good_name: None,
        debounce: DebounceState::default(),
        cleanups_triggered: 0,
    };
    tracing::info!("{} attached ({})", id, subscription);
    let task = tokio::spawn(controller.run(rx));

    ControllerHandle {
        id,
        tx,
        task: Some(task),
    }
}

/// Builds the subscription listener.
///
/// The listener runs inside the host's synchronous event delivery. A
/// call-site create is snapshotted right there, before the host can run its
/// auto-definition reflex, so the snapshot never depends on when the
/// controller task gets scheduled.
fn listener(host: Weak<dyn EditorHost>, tx: mpsc::UnboundedSender<Message>) -> EventListener {
    Arc::new(move |event: GraphEvent| {
        let message = match host.upgrade() {
            Some(host) if event.kind == EventKind::Create => {
                match host.block(event.block_id).map(|block| block.role) {
                    Some(BlockRole::CallSite) => Message::CallSiteCreated {
                        call_site: event.block_id,
                        prior_definition_ids: GraphQuery::new(host.as_ref())
                            .definitions()
                            .iter()
                            .map(|def| def.id)
                            .collect(),
                    },
                    _ => Message::Event(event),
                }
            }
            _ => Message::Event(event),
        };
        // The receiver is gone once the controller has detached.
        let _ = tx.send(message);
    })
}

struct ReconciliationController {
    id: ControllerId,
    host: Arc<dyn EditorHost>,
    config: ReconcileConfig,
    cleanup: CleanupTrigger,
    subscription: SubscriptionId,
    /// Sender half of our own mailbox, cloned into every timer.
    tx: mpsc::UnboundedSender<Message>,
    /// Open sessions, oldest first.
    sessions: IndexMap<SessionId, ReconciliationSession>,
    last_known_good_name: Option<String>,
    debounce: DebounceState,
    cleanups_triggered: u64,
}

impl ReconciliationController {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Message>) {
        // `self.tx` keeps the mailbox open, so only `Detach` ends the loop.
        while let Some(message) = rx.recv().await {
            match message {
                Message::Event(event) => self.on_event(event),
                Message::CallSiteCreated {
                    call_site,
                    prior_definition_ids,
                } => self.on_call_site_created(call_site, prior_definition_ids),
                Message::SpawnCheckDue {
                    session,
                    definition,
                } => self.on_spawn_check(session, definition),
                Message::RecheckDue { session } => self.on_recheck(session),
                Message::WindowElapsed { session } => self.on_window_elapsed(session),
                Message::DebounceElapsed { generation } => self.on_debounce(generation),
                Message::Status(reply) => {
                    let _ = reply.send(self.status());
                }
                Message::Detach(ack) => {
                    self.teardown();
                    if let Some(ack) = ack {
                        let _ = ack.send(());
                    }
                    return;
                }
            }
        }
    }

    fn status(&self) -> ControllerStatus {
        ControllerStatus {
            controller_id: self.id,
            open_sessions: self.sessions.len(),
            session_phases: self.sessions.values().map(|s| s.phase).collect(),
            pending_timers: self
                .sessions
                .values()
                .map(ReconciliationSession::pending_timers)
                .sum::<usize>()
                + usize::from(self.debounce.is_pending()),
            last_known_good_name: self.last_known_good_name.clone(),
            cleanups_triggered: self.cleanups_triggered,
        }
    }

    fn teardown(&mut self) {
        for session in self.sessions.values_mut() {
            session.cancel_timers();
        }
        self.sessions.clear();
        self.debounce.cancel();
        self.host.unsubscribe(self.subscription);
        tracing::info!("{} detached", self.id);
    }

    fn mid_transaction(&self) -> bool {
        !self.sessions.is_empty()
    }

    // -------------------------------------------------------------------
    // Event dispatch
    // -------------------------------------------------------------------

    fn on_event(&mut self, event: GraphEvent) {
        if event.kind == EventKind::Create
            && self.host.block(event.block_id).map(|block| block.role)
                == Some(BlockRole::Definition)
        {
            self.on_definition_created(event.block_id);
        }

        if !self.mid_transaction() {
            self.debounce.rearm(self.config.debounce(), &self.tx);
        }
    }

    fn on_call_site_created(&mut self, call_site: BlockId, prior: HashSet<BlockId>) {
        if self.host.block(call_site).is_none() {
            tracing::debug!("call site {} gone before its transaction began", call_site);
            if !self.mid_transaction() {
                self.debounce.rearm(self.config.debounce(), &self.tx);
            }
            return;
        }
        self.begin_transaction(call_site, prior);
    }

    // -------------------------------------------------------------------
    // Call-site transactions
    // -------------------------------------------------------------------

    fn begin_transaction(&mut self, call_site: BlockId, prior: HashSet<BlockId>) {
        let mut session = ReconciliationSession::new(call_site, prior);
        tracing::debug!(
            "{} opened for call site {} ({} prior definitions)",
            session.id,
            call_site,
            session.prior_definition_ids.len()
        );

        self.host.suppress_events();

        session.phase = SessionPhase::NameResolution;
        let bound = self.resolve_name(&session);

        session.phase = SessionPhase::ParameterSync;
        if let Some(definition) = bound {
            let outcome = sync_call_site(self.host.as_ref(), call_site, definition);
            tracing::debug!("initial sync of {}: {:?}", call_site, outcome);
        }

        self.host.resume_events();

        session.phase = SessionPhase::DelayedRecheck;
        session.recheck = Some(Timer::arm(
            self.config.recheck_delay(),
            &self.tx,
            Message::RecheckDue {
                session: session.id,
            },
        ));
        session.window = Some(Timer::arm(
            self.config.suppression_window(),
            &self.tx,
            Message::WindowElapsed {
                session: session.id,
            },
        ));

        // A transaction replaces whatever cleanup was pending.
        self.debounce.cancel();
        self.sessions.insert(session.id, session);
    }

    /// Gives the new call site a usable name and returns the definition it
    /// should bind to, if any.
    ///
    /// The name is rewritten only when it is a placeholder, or when prior
    /// definitions exist and none of them carries it. A fresh, valid name
    /// with nothing to compete against is the user's and is kept.
    fn resolve_name(&mut self, session: &ReconciliationSession) -> Option<BlockId> {
        let query = GraphQuery::new(self.host.as_ref());
        let prior: Vec<_> = query
            .definitions()
            .into_iter()
            .filter(|def| session.prior_definition_ids.contains(&def.id))
            .filter(|def| name::is_valid(&def.name))
            .collect();

        let Some(current) = query.name_of(session.call_site) else {
            tracing::debug!("call site {} vanished before naming", session.call_site);
            return None;
        };

        let known = prior.iter().any(|def| def.name == current);
        let rewrite = name::is_placeholder(&current) || (!prior.is_empty() && !known);

        let final_name = if rewrite {
            let target = prior
                .first()
                .map(|def| def.name.clone())
                .or_else(|| self.last_known_good_name.clone())
                .unwrap_or_else(|| self.config.default_name.clone());
            if target != current {
                if let Err(err) = self.host.set_field(session.call_site, NAME_FIELD, &target) {
                    tracing::debug!("naming call site {} is moot: {}", session.call_site, err);
                    return None;
                }
                tracing::debug!(
                    "named call site {} '{}' (was '{}')",
                    session.call_site,
                    target,
                    current
                );
            }
            target
        } else {
            current
        };

        if name::is_valid(&final_name) {
            self.last_known_good_name = Some(final_name.clone());
        }

        prior
            .iter()
            .find(|def| def.name == final_name)
            .or_else(|| prior.first())
            .map(|def| def.id)
    }

    fn on_recheck(&mut self, session_id: SessionId) {
        let Some(session) = self.sessions.get_mut(&session_id) else {
            return;
        };
        session.recheck = None;
        session.phase = SessionPhase::Settling;
        let call_site = session.call_site;
        let prior = session.prior_definition_ids.clone();

        let host = self.host.as_ref();
        let query = GraphQuery::new(host);
        let Some(current) = query.name_of(call_site) else {
            tracing::debug!("recheck of {} is moot, call site gone", call_site);
            return;
        };

        let named = if name::is_valid(&current) {
            query.definition_named(&current)
        } else {
            None
        };
        let Some(definition) = named.or_else(|| {
            query
                .definitions()
                .into_iter()
                .find(|def| prior.contains(&def.id) && name::is_valid(&def.name))
        }) else {
            tracing::debug!("recheck of {}: nothing to bind to yet", call_site);
            return;
        };

        if definition.name != current {
            if let Err(err) = host.set_field(call_site, NAME_FIELD, &definition.name) {
                tracing::debug!("recheck rename of {} is moot: {}", call_site, err);
                return;
            }
        }
        self.last_known_good_name = Some(definition.name.clone());

        let outcome = sync_call_site(host, call_site, definition.id);
        tracing::debug!("recheck of {} against {}: {:?}", call_site, definition.id, outcome);
    }

    fn on_window_elapsed(&mut self, session_id: SessionId) {
        let Some(mut session) = self.sessions.shift_remove(&session_id) else {
            return;
        };
        let unchecked = session.cancel_timers();

        for definition in unchecked {
            if self.dedup_spawned(definition, &session.prior_definition_ids) {
                self.dispose_if_scaffold(definition);
            }
        }
        for definition in std::mem::take(&mut session.spawned_definitions) {
            self.dispose_if_scaffold(definition);
        }
        tracing::debug!("{} closed", session.id);

        if !self.mid_transaction() {
            self.debounce.rearm(self.config.debounce(), &self.tx);
        }
    }

    // -------------------------------------------------------------------
    // Spawned definitions
    // -------------------------------------------------------------------

    fn on_definition_created(&mut self, definition: BlockId) {
        // Attribute the spawn to the most recent transaction.
        let Some((session_id, session)) = self.sessions.last_mut() else {
            return;
        };
        if !session.is_spawned(definition) {
            return;
        }
        let timer = Timer::arm(
            self.config.spawn_check_delay(),
            &self.tx,
            Message::SpawnCheckDue {
                session: *session_id,
                definition,
            },
        );
        session.spawn_checks.push((definition, timer));
        tracing::debug!("definition {} spawned during {}", definition, session_id);
    }

    fn on_spawn_check(&mut self, session_id: SessionId, definition: BlockId) {
        let Some(session) = self.sessions.get_mut(&session_id) else {
            // Checks still pending at window close ran there.
            tracing::debug!("spawn check of {} already ran at window close", definition);
            return;
        };
        session.spawn_checks.retain(|(id, _)| *id != definition);
        let prior = session.prior_definition_ids.clone();

        if self.dedup_spawned(definition, &prior) {
            if let Some(session) = self.sessions.get_mut(&session_id) {
                session.spawned_definitions.push(definition);
            }
        }
    }

    /// Dedups a spawned definition against its family without touching
    /// anything in `prior`. Returns `true` if it survived.
    fn dedup_spawned(&self, definition: BlockId, prior: &HashSet<BlockId>) -> bool {
        let host = self.host.as_ref();
        let query = GraphQuery::new(host);
        let Some(def) = query.definition(definition) else {
            tracing::debug!("spawn check of {} is moot, already gone", definition);
            return false;
        };

        let resolutions = dedup::plan_for_spawned(&dedup::snapshot(host), &def.name, prior);
        if !resolutions.is_empty() {
            dedup::apply(host, &resolutions);
        }
        query.definition(definition).is_some()
    }

    fn dispose_if_scaffold(&self, definition: BlockId) {
        let query = GraphQuery::new(self.host.as_ref());
        let Some(def) = query.definition(definition) else {
            return;
        };
        if name::is_valid(&def.name) && !query.callers_of(&def.name).is_empty() {
            return;
        }
        self.host.dispose(definition);
        tracing::info!(
            "disposed scaffold definition {} ('{}'): no callers",
            definition,
            def.name
        );
    }

    // -------------------------------------------------------------------
    // Debounced cleanup
    // -------------------------------------------------------------------

    fn on_debounce(&mut self, generation: u64) {
        if !self.debounce.take_if_current(generation) {
            return;
        }
        if self.mid_transaction() {
            tracing::debug!("cleanup deferred: transaction open");
            return;
        }
        let placeholder = GraphQuery::new(self.host.as_ref())
            .call_sites()
            .into_iter()
            .find(|call| name::is_placeholder(&call.name));
        if let Some(call) = placeholder {
            tracing::debug!("cleanup skipped: call site {} has no name yet", call.id);
            return;
        }

        (self.cleanup)();
        self.cleanups_triggered += 1;
        tracing::info!("{} ran cleanup #{}", self.id, self.cleanups_triggered);
    }
}
