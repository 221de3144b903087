//! Refresh state machine for one monitored query.
//!
//! [`QueryMonitor`] owns everything derived from successive snapshots: the
//! live snapshot, the stage and task views (which the user may freeze), the
//! counters from the previous poll, and the rate histories. It does no I/O;
//! [`crate::poller::QueryPoller`] feeds it fetch results.
//!
//! ## Lifecycle
//!
//! ```text
//! Uninitialized --(first result)--> Polling --(finalQueryInfo)--> Terminated
//!                                     ^   |
//!                                     +---+ (snapshot or fetch failure)
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::config::MonitorConfig;
use crate::format::{compute_rate, parse_duration};
use crate::history::RateHistories;
use crate::types::{QuerySnapshot, StageNode};

/// A view that either tracks the latest snapshot or is pinned by the user.
#[derive(Debug, Clone)]
pub enum SnapshotView {
    /// Replaced on every successful poll
    Following(Option<Arc<QuerySnapshot>>),
    /// Left alone until the user resumes auto-refresh
    Frozen(Option<Arc<QuerySnapshot>>),
}

impl SnapshotView {
    pub fn snapshot(&self) -> Option<&QuerySnapshot> {
        match self {
            SnapshotView::Following(s) | SnapshotView::Frozen(s) => s.as_deref(),
        }
    }

    pub fn is_following(&self) -> bool {
        matches!(self, SnapshotView::Following(_))
    }

    fn observe(&mut self, latest: &Arc<QuerySnapshot>) {
        if let SnapshotView::Following(current) = self {
            *current = Some(Arc::clone(latest));
        }
    }

    fn set_auto_refresh(&mut self, enabled: bool, live: Option<&Arc<QuerySnapshot>>) {
        *self = match (std::mem::replace(self, SnapshotView::Following(None)), enabled) {
            (SnapshotView::Following(_), false) => SnapshotView::Frozen(live.cloned()),
            (SnapshotView::Frozen(pinned), true) => SnapshotView::Following(pinned),
            (unchanged, _) => unchanged,
        };
    }
}

impl Default for SnapshotView {
    fn default() -> Self {
        SnapshotView::Following(None)
    }
}

/// What the renderer should show in place of the query page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// No fetch has completed yet
    Loading,
    /// A fetch completed but there is no snapshot
    NotFound,
    Loaded,
}

/// Cumulative counters from the previous successful poll.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Counters {
    scheduled_millis: f64,
    cpu_millis: f64,
    input_rows: f64,
    input_bytes: f64,
}

impl Counters {
    fn of(snapshot: &QuerySnapshot) -> Self {
        let stats = &snapshot.query_stats;
        Self {
            scheduled_millis: stats.scheduled_millis(),
            cpu_millis: stats.cpu_millis(),
            input_rows: stats.processed_input_positions,
            input_bytes: stats.input_bytes(),
        }
    }
}

/// Derived state for one query across polls.
#[derive(Debug, Clone)]
pub struct QueryMonitor {
    query_id: String,
    refresh_interval: Duration,

    live: Option<Arc<QuerySnapshot>>,
    stage_view: SnapshotView,
    task_view: SnapshotView,

    previous: Counters,
    last_refresh: Option<DateTime<Utc>>,
    histories: RateHistories,

    initialized: bool,
    terminated: bool,
}

impl QueryMonitor {
    pub fn new(query_id: impl Into<String>, config: &MonitorConfig) -> Self {
        Self {
            query_id: query_id.into(),
            refresh_interval: config.refresh_interval(),
            live: None,
            stage_view: SnapshotView::default(),
            task_view: SnapshotView::default(),
            previous: Counters::default(),
            last_refresh: None,
            histories: RateHistories::with_capacity(config.history_capacity),
            initialized: false,
            terminated: false,
        }
    }

    /// Apply a successfully fetched snapshot observed at `now`.
    pub fn record_snapshot(&mut self, snapshot: QuerySnapshot, now: DateTime<Utc>) {
        let snapshot = Arc::new(snapshot);
        let previous_refresh = self.last_refresh;
        let previous = self.previous;
        let already_terminated = self.terminated;
        let current = Counters::of(&snapshot);

        self.stage_view.observe(&snapshot);
        self.task_view.observe(&snapshot);
        self.live = Some(Arc::clone(&snapshot));
        self.previous = current;
        self.initialized = true;
        self.terminated = snapshot.final_query_info;
        self.last_refresh = Some(now);

        if self.terminated && !already_terminated {
            tracing::info!(query_id = %self.query_id, state = %snapshot.state, "Query reached its final state");
        }

        // Nothing new once terminated; and a running query seen for the first
        // time has no interval to compute a rate over.
        if already_terminated || (previous_refresh.is_none() && snapshot.is_running()) {
            return;
        }

        let reference = match previous_refresh.or_else(|| backdate(&snapshot, now)) {
            Some(reference) => reference,
            None => {
                tracing::debug!(
                    query_id = %self.query_id,
                    elapsed_time = %snapshot.query_stats.elapsed_time,
                    "No usable elapsed time, skipping rates"
                );
                return;
            }
        };
        let elapsed_millis = (now - reference).num_milliseconds() as f64;
        if elapsed_millis < 0.0 {
            tracing::debug!(query_id = %self.query_id, elapsed_millis, "Clock went backwards, skipping rates");
            return;
        }

        let per_millisecond = |delta: f64| {
            if elapsed_millis == 0.0 {
                0.0
            } else {
                delta / elapsed_millis
            }
        };

        let h = &mut self.histories;
        h.scheduled_time_rate = h
            .scheduled_time_rate
            .append(per_millisecond(current.scheduled_millis - previous.scheduled_millis));
        h.cpu_time_rate = h
            .cpu_time_rate
            .append(per_millisecond(current.cpu_millis - previous.cpu_millis));
        h.row_input_rate = h.row_input_rate.append(compute_rate(
            current.input_rows - previous.input_rows,
            elapsed_millis,
        ));
        h.byte_input_rate = h.byte_input_rate.append(compute_rate(
            current.input_bytes - previous.input_bytes,
            elapsed_millis,
        ));
        h.reserved_memory = h
            .reserved_memory
            .append(snapshot.query_stats.reserved_memory_bytes());
    }

    /// Apply a failed fetch: the page is no longer "loading".
    pub fn record_fetch_failure(&mut self) {
        self.initialized = true;
    }

    /// Freeze (`false`) or resume (`true`) the stage view.
    pub fn set_stage_auto_refresh(&mut self, enabled: bool) {
        self.stage_view.set_auto_refresh(enabled, self.live.as_ref());
    }

    /// Freeze (`false`) or resume (`true`) the task view.
    pub fn set_task_auto_refresh(&mut self, enabled: bool) {
        self.task_view.set_auto_refresh(enabled, self.live.as_ref());
    }

    /// Delay before the next poll, or `None` once the query is final.
    pub fn next_poll_delay(&self) -> Option<Duration> {
        if self.terminated {
            None
        } else {
            Some(self.refresh_interval)
        }
    }

    pub fn query_id(&self) -> &str {
        &self.query_id
    }

    pub fn current(&self) -> Option<&QuerySnapshot> {
        self.live.as_deref()
    }

    /// Snapshot backing the stage list (possibly frozen).
    pub fn stage_snapshot(&self) -> Option<&QuerySnapshot> {
        self.stage_view.snapshot()
    }

    /// Snapshot backing the task list (possibly frozen).
    pub fn task_snapshot(&self) -> Option<&QuerySnapshot> {
        self.task_view.snapshot()
    }

    pub fn stage_root(&self) -> Option<&StageNode> {
        self.stage_snapshot().and_then(|s| s.output_stage.as_ref())
    }

    pub fn task_root(&self) -> Option<&StageNode> {
        self.task_snapshot().and_then(|s| s.output_stage.as_ref())
    }

    pub fn histories(&self) -> &RateHistories {
        &self.histories
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn stage_auto_refresh(&self) -> bool {
        self.stage_view.is_following()
    }

    pub fn task_auto_refresh(&self) -> bool {
        self.task_view.is_following()
    }

    pub fn load_state(&self) -> LoadState {
        match (self.initialized, self.live.is_some()) {
            (false, _) => LoadState::Loading,
            (true, false) => LoadState::NotFound,
            (true, true) => LoadState::Loaded,
        }
    }
}

/// `now` minus the query's reported elapsed time; `None` when the elapsed
/// time is missing, unparsable or out of range.
fn backdate(snapshot: &QuerySnapshot, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let elapsed = parse_duration(&snapshot.query_stats.elapsed_time).ok()?;
    if !elapsed.is_finite() {
        return None;
    }
    let elapsed = chrono::Duration::try_milliseconds(elapsed.round() as i64)?;
    now.checked_sub_signed(elapsed)
}
