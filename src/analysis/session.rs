//! Analysis Session
//!
//! Holds the matrix of one (channel, range) selection and the insight cells
//! derived from it. Selecting a different channel or range supersedes the
//! previous computation and drops every cell, aborting in-flight pipelines.
//!
//! ## Concurrency
//!
//! - The matrix is computed by one spawned loader task per selection; its
//!   progress is published as [`SessionState`] on a `watch` channel that any
//!   number of callers can await.
//! - Each cell pipeline runs in its own task and owns its `watch` channel. A
//!   cell is recorded in a `DashMap`; a second selection of a working cell
//!   subscribes to the running task instead of starting another.
//! - A generation counter, bumped under the write lock on every selection
//!   change, keeps stale loaders from publishing.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::aggregate::VolumeAggregator;
use super::insight::{CellInsight, CellPhase, CellPipeline, SuggestedTicket};
use super::topics::TopicDiscovery;
use crate::ai::{SharedIntelligence, with_timeout};
use crate::source::{MessageStoreAdapter, MessageWindow};
use crate::types::{
    AnalysisMatrix, CellKey, ChannelId, DayBucket, ErrorKind, Result, TopicError, UserId,
};

// =============================================================================
// State
// =============================================================================

/// The inputs of one matrix computation, as requested
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub channel: ChannelId,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionState {
    Unselected,
    Loading,
    Ready { matrix: Arc<AnalysisMatrix> },
    Errored { kind: ErrorKind, message: String },
}

impl SessionState {
    fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }
}

struct CellSlot {
    phase: watch::Sender<CellPhase>,
    task: AbortHandle,
}

#[derive(Default)]
struct Inner {
    generation: u64,
    selection: Option<Selection>,
    window: Option<Arc<MessageWindow>>,
    loader: Option<AbortHandle>,
}

#[derive(Debug, Serialize)]
pub struct CellSnapshot {
    #[serde(flatten)]
    pub key: CellKey,
    #[serde(flatten)]
    pub phase: CellPhase,
}

#[derive(Debug, Serialize)]
pub struct SessionSnapshot {
    /// Absent until the user has a session
    pub id: Option<Uuid>,
    pub user: UserId,
    pub selection: Option<Selection>,
    #[serde(flatten)]
    pub state: SessionState,
    pub cells: Vec<CellSnapshot>,
}

impl SessionSnapshot {
    /// Snapshot for a user who has never selected a window
    pub fn unselected(user: UserId) -> Self {
        Self {
            id: None,
            user,
            selection: None,
            state: SessionState::Unselected,
            cells: Vec::new(),
        }
    }
}

// =============================================================================
// Session
// =============================================================================

pub struct AnalysisSession {
    id: Uuid,
    user: UserId,
    adapter: Arc<MessageStoreAdapter>,
    discovery: TopicDiscovery,
    pipeline: CellPipeline,
    inner: RwLock<Inner>,
    state: watch::Sender<SessionState>,
    cells: DashMap<CellKey, CellSlot>,
}

impl AnalysisSession {
    pub fn new(
        user: UserId,
        adapter: Arc<MessageStoreAdapter>,
        intelligence: SharedIntelligence,
        max_topics: usize,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Unselected);
        Self {
            id: Uuid::new_v4(),
            user,
            adapter,
            discovery: TopicDiscovery::new(intelligence.clone(), max_topics),
            pipeline: CellPipeline::new(intelligence),
            inner: RwLock::new(Inner::default()),
            state,
            cells: DashMap::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user(&self) -> &UserId {
        &self.user
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|poisoned| {
            tracing::error!("Session RwLock poisoned on read, recovering");
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|poisoned| {
            tracing::error!("Session RwLock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    // -------------------------------------------------------------------------
    // Matrix
    // -------------------------------------------------------------------------

    /// Select a channel and range, computing the matrix unless it is already
    /// cached (or being computed) for exactly this selection.
    ///
    /// A different selection supersedes the current one: its loader is
    /// aborted and all cells are dropped. A caller whose selection is
    /// superseded before it completes gets `Cancelled`.
    #[instrument(skip(self), fields(session = %self.id))]
    pub async fn select(
        self: &Arc<Self>,
        channel: ChannelId,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Arc<AnalysisMatrix>> {
        // Reject inverted ranges before touching the current selection
        self.adapter.resolve_range(start, end, Utc::now())?;
        let selection = Selection {
            channel,
            start,
            end,
        };

        let generation = {
            let mut inner = self.write();
            let reusable = inner.selection.as_ref() == Some(&selection)
                && matches!(
                    &*self.state.borrow(),
                    SessionState::Ready { .. } | SessionState::Loading
                );

            if !reusable {
                inner.generation += 1;
                inner.selection = Some(selection.clone());
                inner.window = None;
                if let Some(loader) = inner.loader.take() {
                    loader.abort();
                }
                self.clear_cells();
                self.state.send_replace(SessionState::Loading);

                let session = Arc::clone(self);
                let generation = inner.generation;
                let handle = tokio::spawn(async move { session.load(generation, selection).await });
                inner.loader = Some(handle.abort_handle());
            } else {
                debug!("Reusing matrix of the current selection");
            }
            inner.generation
        };

        self.await_matrix(generation).await
    }

    async fn load(&self, generation: u64, selection: Selection) {
        let outcome = self.compute(&selection).await;

        let mut inner = self.write();
        if inner.generation != generation {
            debug!(generation, "Discarding superseded matrix");
            return;
        }
        inner.loader = None;

        match outcome {
            Ok((window, matrix)) => {
                info!(
                    topics = matrix.topics.len(),
                    days = matrix.days.len(),
                    "Matrix ready"
                );
                inner.window = Some(window);
                self.state.send_replace(SessionState::Ready { matrix });
            }
            Err(e) => {
                warn!("Analysis failed: {}", e);
                self.state.send_replace(SessionState::Errored {
                    kind: e.kind(),
                    message: e.detail(),
                });
            }
        }
    }

    async fn compute(
        &self,
        selection: &Selection,
    ) -> Result<(Arc<MessageWindow>, Arc<AnalysisMatrix>)> {
        let window = self
            .adapter
            .fetch_messages(&self.user, &selection.channel, selection.start, selection.end)
            .await?;
        let topics = self.discovery.discover(&window.messages).await?;
        let matrix = VolumeAggregator::aggregate(topics, &window.days, &window.buckets);
        Ok((Arc::new(window), Arc::new(matrix)))
    }

    async fn await_matrix(&self, generation: u64) -> Result<Arc<AnalysisMatrix>> {
        let mut rx = self.state.subscribe();
        let state = rx
            .wait_for(|s| !s.is_loading())
            .await
            .map_err(|_| TopicError::Cancelled("session closed".to_string()))?
            .clone();

        if self.read().generation != generation {
            return Err(TopicError::Cancelled("selection superseded".to_string()));
        }

        match state {
            SessionState::Ready { matrix } => Ok(matrix),
            SessionState::Errored { kind, message } => Err(TopicError::from_kind(kind, message)),
            SessionState::Unselected | SessionState::Loading => {
                Err(TopicError::Cancelled("selection invalidated".to_string()))
            }
        }
    }

    /// Drop the selection, the matrix and every cell
    pub fn invalidate(&self) {
        let mut inner = self.write();
        inner.generation += 1;
        inner.selection = None;
        inner.window = None;
        if let Some(loader) = inner.loader.take() {
            loader.abort();
        }
        self.clear_cells();
        self.state.send_replace(SessionState::Unselected);
        debug!(session = %self.id, "Session invalidated");
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn matrix(&self) -> Option<Arc<AnalysisMatrix>> {
        match &*self.state.borrow() {
            SessionState::Ready { matrix } => Some(Arc::clone(matrix)),
            _ => None,
        }
    }

    pub fn selection(&self) -> Option<Selection> {
        self.read().selection.clone()
    }

    /// Filtered messages behind the current matrix
    pub fn window(&self) -> Option<Arc<MessageWindow>> {
        self.read().window.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let mut cells: Vec<CellSnapshot> = self
            .cells
            .iter()
            .map(|entry| CellSnapshot {
                key: entry.key().clone(),
                phase: entry.value().phase.borrow().clone(),
            })
            .collect();
        cells.sort_by(|a, b| (&a.key.topic, a.key.day).cmp(&(&b.key.topic, b.key.day)));

        SessionSnapshot {
            id: Some(self.id),
            user: self.user.clone(),
            selection: self.selection(),
            state: self.state(),
            cells,
        }
    }

    // -------------------------------------------------------------------------
    // Cells
    // -------------------------------------------------------------------------

    /// Cell key using the matrix's own label spelling
    fn canonical_key(&self, key: &CellKey) -> Result<CellKey> {
        let matrix = self
            .matrix()
            .ok_or_else(|| TopicError::InvalidInput("no analysis matrix is ready".to_string()))?;
        let (t, d) = matrix
            .locate(key)
            .ok_or_else(|| TopicError::NotFound(format!("cell {} is not in the matrix", key)))?;
        Ok(CellKey::new(matrix.topics[t].label(), matrix.days[d]))
    }

    /// Start the cell pipeline unless it is running or already ready, and
    /// subscribe to its phases. Failed or cancelled cells are restarted.
    pub fn select_cell(&self, key: &CellKey) -> Result<(CellKey, watch::Receiver<CellPhase>)> {
        // The read lock keeps invalidation from interleaving with the insert
        let inner = self.read();
        let matrix = self
            .matrix()
            .ok_or_else(|| TopicError::InvalidInput("no analysis matrix is ready".to_string()))?;
        let (t, d) = matrix
            .locate(key)
            .ok_or_else(|| TopicError::NotFound(format!("cell {} is not in the matrix", key)))?;
        let topic = matrix.topics[t].clone();
        let day = matrix.days[d];
        let canonical = CellKey::new(topic.label(), day);

        let spawn = || {
            let bucket = inner
                .window
                .as_ref()
                .and_then(|w| w.buckets.iter().find(|b| b.date == day).cloned())
                .unwrap_or_else(|| DayBucket::new(day));
            let (phase, _) = watch::channel(CellPhase::Gathering);
            let task_phase = phase.clone();
            let pipeline = self.pipeline.clone();
            let handle = tokio::spawn(async move {
                pipeline.run(&topic, &bucket, &task_phase).await;
            });
            CellSlot {
                phase,
                task: handle.abort_handle(),
            }
        };

        let rx = match self.cells.entry(canonical.clone()) {
            Entry::Occupied(mut occupied) => {
                let reusable = {
                    let phase = occupied.get().phase.borrow();
                    phase.is_working() || matches!(*phase, CellPhase::Ready { .. })
                };
                if reusable {
                    debug!(cell = %canonical, "Subscribing to existing cell");
                } else {
                    debug!(cell = %canonical, "Restarting cell");
                    occupied.get().task.abort();
                    occupied.insert(spawn());
                }
                occupied.get().phase.subscribe()
            }
            Entry::Vacant(vacant) => {
                debug!(cell = %canonical, "Starting cell");
                vacant.insert(spawn()).phase.subscribe()
            }
        };

        Ok((canonical, rx))
    }

    /// Select the cell and wait for it to settle
    pub async fn await_cell(&self, key: &CellKey) -> Result<CellInsight> {
        let (_, mut rx) = self.select_cell(key)?;
        let phase = rx
            .wait_for(CellPhase::is_settled)
            .await
            .map_err(|_| TopicError::Cancelled(format!("cell {} was dropped", key)))?
            .clone();
        phase.into_result()
    }

    /// [`Self::await_cell`] under a caller deadline; expiry cancels the cell
    pub async fn run_cell(&self, key: &CellKey, timeout: Duration) -> Result<CellInsight> {
        match with_timeout(timeout, self.await_cell(key), "cell insight").await {
            Err(e) if e.kind() == ErrorKind::Timeout => {
                self.cancel_cell(key);
                Err(e)
            }
            other => other,
        }
    }

    /// Abort a working cell and reset it to `Idle`. Settled cells are kept.
    pub fn cancel_cell(&self, key: &CellKey) -> bool {
        let Ok(canonical) = self.canonical_key(key) else {
            return false;
        };
        let Some(slot) = self.cells.get(&canonical) else {
            return false;
        };

        // Check and reset under the channel's lock so a result published
        // first is kept; the run cannot advance the cell once it reads `Idle`
        let cancelled = slot.phase.send_if_modified(|phase| {
            if phase.is_working() {
                *phase = CellPhase::Idle;
                true
            } else {
                false
            }
        });
        if cancelled {
            slot.task.abort();
            info!(cell = %canonical, "Cell cancelled");
        }
        cancelled
    }

    /// Mark the cell's suggested ticket as acted upon. Repeating is a no-op.
    pub fn act_on_ticket(&self, key: &CellKey) -> Result<SuggestedTicket> {
        let canonical = self.canonical_key(key)?;
        let slot = self.cells.get(&canonical).ok_or_else(|| {
            TopicError::InvalidInput(format!("cell {} has not been enriched", canonical))
        })?;

        let mut outcome = Err(TopicError::InvalidInput(format!(
            "cell {} is not ready",
            canonical
        )));
        slot.phase.send_if_modified(|phase| {
            let CellPhase::Ready { insight } = phase else {
                return false;
            };
            match insight.suggested_ticket.as_mut() {
                Some(ticket) => {
                    let changed = !ticket.acted_upon;
                    ticket.acted_upon = true;
                    outcome = Ok(ticket.clone());
                    changed
                }
                None => {
                    outcome = Err(TopicError::NotFound(format!(
                        "no ticket suggested for cell {}",
                        canonical
                    )));
                    false
                }
            }
        });
        outcome
    }

    /// Current phase; cells never selected are `Idle`
    pub fn cell_phase(&self, key: &CellKey) -> CellPhase {
        self.canonical_key(key)
            .ok()
            .and_then(|k| self.cells.get(&k).map(|slot| slot.phase.borrow().clone()))
            .unwrap_or(CellPhase::Idle)
    }

    fn clear_cells(&self) {
        for entry in self.cells.iter() {
            entry.task.abort();
            entry.phase.send_replace(CellPhase::Idle);
        }
        self.cells.clear();
    }
}

impl Drop for AnalysisSession {
    fn drop(&mut self) {
        if let Some(loader) = self.read().loader.as_ref() {
            loader.abort();
        }
        for entry in self.cells.iter() {
            entry.task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceConfig;
    use crate::source::InMemoryCredentialStore;
    use crate::testing::{FakeIntelligence, FakeSource, at, day, raw};
    use std::sync::atomic::Ordering;

    fn history() -> Vec<crate::types::RawMessage> {
        vec![
            raw("U1", "login is broken", at(2024, 3, 1, 9, 0)),
            raw("U2", "deploy went fine", at(2024, 3, 1, 10, 0)),
            raw("U1", "login still broken", at(2024, 3, 2, 9, 0)),
            raw("U3", "lunch?", at(2024, 3, 2, 12, 0)),
        ]
    }

    fn session_with(source: FakeSource, ai: Arc<FakeIntelligence>) -> (Arc<AnalysisSession>, Arc<FakeSource>) {
        let source = Arc::new(source);
        let credentials = Arc::new(InMemoryCredentialStore::seeded(
            UserId::from("u"),
            Some("xoxb-test".to_string()),
        ));
        let adapter = MessageStoreAdapter::new(source.clone(), credentials, &SourceConfig::default())
            .unwrap();
        let session = AnalysisSession::new(UserId::from("u"), Arc::new(adapter), ai, 12);
        (Arc::new(session), source)
    }

    fn range() -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        (Some(at(2024, 3, 1, 0, 0)), Some(at(2024, 3, 3, 0, 0)))
    }

    async fn selected(ai: FakeIntelligence) -> (Arc<AnalysisSession>, Arc<FakeIntelligence>, Arc<FakeSource>) {
        let ai = Arc::new(ai);
        let (session, source) = session_with(FakeSource::with_history(history()), ai.clone());
        let (start, end) = range();
        session.select(ChannelId::from("C1"), start, end).await.unwrap();
        (session, ai, source)
    }

    fn login(d: u32) -> CellKey {
        CellKey::new("login", day(2024, 3, d))
    }

    #[tokio::test]
    async fn test_select_computes_and_caches_matrix() {
        let (session, ai, source) = selected(FakeIntelligence::with_topics(&["Login", "Deploy"])).await;

        let matrix = session.matrix().unwrap();
        assert_eq!(matrix.days, vec![day(2024, 3, 1), day(2024, 3, 2)]);
        assert_eq!(matrix.values, vec![vec![50, 50], vec![50, 0]]);
        assert_eq!(matrix.trends, vec![vec![0, 0], vec![0, -50]]);

        let (start, end) = range();
        let again = session.select(ChannelId::from("C1"), start, end).await.unwrap();
        assert!(Arc::ptr_eq(&matrix, &again));
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(ai.calls().0, 1);
    }

    #[tokio::test]
    async fn test_inverted_range_keeps_current_selection() {
        let (session, _, _) = selected(FakeIntelligence::with_topics(&["Login"])).await;

        let err = session
            .select(ChannelId::from("C2"), Some(at(2024, 3, 5, 0, 0)), Some(at(2024, 3, 1, 0, 0)))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(session.matrix().is_some());
    }

    #[tokio::test]
    async fn test_source_failure_sets_errored_state() {
        let ai = Arc::new(FakeIntelligence::with_topics(&["Login"]));
        let (session, _) = session_with(FakeSource::failing(ErrorKind::SourceUnavailable), ai.clone());
        let (start, end) = range();

        let err = session.select(ChannelId::from("C1"), start, end).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SourceUnavailable);
        assert!(matches!(
            session.state(),
            SessionState::Errored { kind: ErrorKind::SourceUnavailable, .. }
        ));
        assert_eq!(ai.calls().0, 0);
    }

    #[tokio::test]
    async fn test_cell_insight_uses_counted_messages() {
        let (session, ai, _) = selected(FakeIntelligence::with_topics(&["Login"]).ticket("Fix login", "two reports")).await;

        let insight = session.await_cell(&login(1)).await.unwrap();
        assert_eq!(insight.topic, "Login");
        assert_eq!(insight.relevant_messages.len(), 1);
        assert_eq!(*ai.last_summarized.lock().unwrap(), vec!["U1: login is broken"]);

        // Settled cells are served from the cache
        session.await_cell(&login(1)).await.unwrap();
        assert_eq!(ai.calls(), (1, 1, 1));
    }

    #[tokio::test]
    async fn test_concurrent_selection_shares_one_pipeline() {
        let (session, ai, _) = selected(
            FakeIntelligence::with_topics(&["Login"]).delayed(Duration::from_millis(50)),
        )
        .await;

        let key = login(2);
        let (first, second) = tokio::join!(session.await_cell(&key), session.await_cell(&key));
        assert_eq!(first.unwrap(), second.unwrap());
        assert_eq!(ai.calls().1, 1);
        assert_eq!(ai.calls().2, 1);
    }

    #[tokio::test]
    async fn test_unknown_cell_is_not_found() {
        let (session, _, _) = selected(FakeIntelligence::with_topics(&["Login"])).await;
        let err = session.select_cell(&CellKey::new("payments", day(2024, 3, 1))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let err = session.select_cell(&login(9)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_timeout_cancels_cell_to_idle() {
        let (session, _, _) = selected(
            FakeIntelligence::with_topics(&["Login"]).delayed(Duration::from_secs(30)),
        )
        .await;

        let err = session
            .run_cell(&login(1), Duration::from_millis(20))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(session.cell_phase(&login(1)), CellPhase::Idle);
    }

    #[tokio::test]
    async fn test_cancel_after_ready_keeps_insight() {
        let (session, ai, _) = selected(
            FakeIntelligence::with_topics(&["Login"]).ticket("Fix login", "reports"),
        )
        .await;
        session.await_cell(&login(1)).await.unwrap();

        assert!(!session.cancel_cell(&login(1)));
        let CellPhase::Ready { insight } = session.cell_phase(&login(1)) else {
            panic!("ready insight was discarded");
        };
        assert_eq!(insight.offered_ticket().unwrap().title, "Fix login");

        // Still cached: no second pipeline run
        session.await_cell(&login(1)).await.unwrap();
        assert_eq!(ai.calls().1, 1);
    }

    #[tokio::test]
    async fn test_cancelled_cell_restarts_on_next_selection() {
        let (session, ai, _) = selected(
            FakeIntelligence::with_topics(&["Login"]).delayed(Duration::from_millis(50)),
        )
        .await;
        session.select_cell(&login(1)).unwrap();
        assert!(session.cancel_cell(&login(1)));
        assert_eq!(session.cell_phase(&login(1)), CellPhase::Idle);

        session.await_cell(&login(1)).await.unwrap();
        assert!(matches!(session.cell_phase(&login(1)), CellPhase::Ready { .. }));
    }

    #[tokio::test]
    async fn test_explicit_cancel_wakes_waiters_with_cancelled() {
        let (session, _, _) = selected(
            FakeIntelligence::with_topics(&["Login"]).delayed(Duration::from_secs(30)),
        )
        .await;

        let (_, mut rx) = session.select_cell(&login(1)).unwrap();
        assert!(session.cancel_cell(&login(1)));
        let phase = rx.wait_for(CellPhase::is_settled).await.unwrap().clone();
        assert_eq!(phase, CellPhase::Idle);
        assert_eq!(session.cell_phase(&login(1)), CellPhase::Idle);
        assert!(!session.cancel_cell(&login(1)));
    }

    #[tokio::test]
    async fn test_failed_cell_is_isolated_and_restartable() {
        let (session, ai, _) = selected(FakeIntelligence {
            summary: Err(ErrorKind::SummarizationFailed),
            ..FakeIntelligence::with_topics(&["Login", "Deploy"])
        })
        .await;

        let err = session.await_cell(&login(1)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SummarizationFailed);

        // The matrix and unrelated cells are unaffected
        assert!(session.matrix().is_some());
        assert_eq!(
            session.cell_phase(&CellKey::new("deploy", day(2024, 3, 1))),
            CellPhase::Idle
        );

        // Selecting a failed cell runs it again
        session.await_cell(&login(1)).await.unwrap_err();
        assert_eq!(ai.calls().1, 2);
    }

    #[tokio::test]
    async fn test_new_selection_invalidates_cells() {
        let (session, ai, source) = selected(FakeIntelligence::with_topics(&["Login"])).await;
        session.await_cell(&login(1)).await.unwrap();
        assert_eq!(session.snapshot().cells.len(), 1);

        session
            .select(ChannelId::from("C1"), Some(at(2024, 3, 2, 0, 0)), None)
            .await
            .unwrap();
        assert!(session.snapshot().cells.is_empty());
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
        assert_eq!(ai.calls().0, 2);
    }

    #[tokio::test]
    async fn test_invalidate_resets_state() {
        let (session, _, _) = selected(FakeIntelligence::with_topics(&["Login"])).await;
        session.await_cell(&login(1)).await.unwrap();

        session.invalidate();
        assert!(matches!(session.state(), SessionState::Unselected));
        assert!(session.selection().is_none());
        assert!(session.window().is_none());
        assert_eq!(session.select_cell(&login(1)).unwrap_err().kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_act_on_ticket_is_idempotent() {
        let (session, _, _) = selected(FakeIntelligence::with_topics(&["Login"]).ticket("Fix login", "reports")).await;

        assert_eq!(
            session.act_on_ticket(&login(1)).unwrap_err().kind(),
            ErrorKind::InvalidInput
        );
        session.await_cell(&login(1)).await.unwrap();

        let ticket = session.act_on_ticket(&login(1)).unwrap();
        assert!(ticket.acted_upon);
        assert!(session.act_on_ticket(&login(1)).unwrap().acted_upon);

        let CellPhase::Ready { insight } = session.cell_phase(&login(1)) else {
            panic!("cell should be ready");
        };
        assert!(insight.offered_ticket().is_none());
    }

    #[tokio::test]
    async fn test_act_on_missing_ticket_is_not_found() {
        let (session, _, _) = selected(FakeIntelligence::with_topics(&["Login"])).await;
        session.await_cell(&login(1)).await.unwrap();
        assert_eq!(
            session.act_on_ticket(&login(1)).unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[tokio::test]
    async fn test_snapshot_serializes() {
        let (session, _, _) = selected(FakeIntelligence::with_topics(&["Login"])).await;
        session.await_cell(&login(1)).await.unwrap();

        let json = serde_json::to_value(session.snapshot()).unwrap();
        assert_eq!(json["status"], "ready");
        assert_eq!(json["matrix"]["topics"][0], "Login");
        assert_eq!(json["selection"]["channel"], "C1");
        assert_eq!(json["cells"][0]["phase"], "ready");
        assert_eq!(json["cells"][0]["day"], "2024-03-01");
    }
}
