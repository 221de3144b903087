//! Background poll loop driving a [`QueryMonitor`].
//!
//! One tokio task per monitored query. Each cycle fetches once, applies the
//! result under a short write lock, bumps a generation counter on a `watch`
//! channel, then waits for the next interval or a manual refresh. Since the
//! fetch is awaited before waiting starts, fetches never overlap; a manual
//! refresh requested mid-fetch is picked up right after it completes.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

use crate::client::SnapshotSource;
use crate::config::MonitorConfig;
use crate::monitor::QueryMonitor;

pub struct QueryPoller {
    monitor: Arc<RwLock<QueryMonitor>>,
    source: Arc<dyn SnapshotSource>,
    refresh: Arc<Notify>,
    generation: Arc<watch::Sender<u64>>,
    handle: Option<JoinHandle<()>>,
}

impl QueryPoller {
    pub fn new(
        query_id: impl Into<String>,
        source: Arc<dyn SnapshotSource>,
        config: &MonitorConfig,
    ) -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            monitor: Arc::new(RwLock::new(QueryMonitor::new(query_id, config))),
            source,
            refresh: Arc::new(Notify::new()),
            generation: Arc::new(generation),
            handle: None,
        }
    }

    /// Spawn the poll loop; the first fetch happens immediately.
    ///
    /// Must be called from within a tokio runtime. Calling it while the loop
    /// is already running does nothing.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }

        let monitor = Arc::clone(&self.monitor);
        let source = Arc::clone(&self.source);
        let refresh = Arc::clone(&self.refresh);
        let generation = Arc::clone(&self.generation);

        self.handle = Some(tokio::spawn(poll_loop(monitor, source, refresh, generation)));
    }

    /// Cancel the loop. A fetch in flight is dropped without touching state.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            tracing::debug!("Poller stopped");
        }
    }

    /// Skip the rest of the current wait and poll now.
    pub fn refresh_now(&self) {
        self.refresh.notify_one();
    }

    /// Whether the loop is still scheduled to poll
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Receiver whose value increments after every applied fetch result.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.generation.subscribe()
    }

    pub fn monitor(&self) -> RwLockReadGuard<'_, QueryMonitor> {
        self.monitor.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write access for user actions such as freezing a view.
    pub fn monitor_mut(&self) -> RwLockWriteGuard<'_, QueryMonitor> {
        self.monitor.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for QueryPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn poll_loop(
    monitor: Arc<RwLock<QueryMonitor>>,
    source: Arc<dyn SnapshotSource>,
    refresh: Arc<Notify>,
    generation: Arc<watch::Sender<u64>>,
) {
    let query_id = monitor
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .query_id()
        .to_string();
    tracing::info!(query_id = %query_id, "Starting poll loop");

    loop {
        let result = source.fetch(&query_id).await;

        let delay = {
            let mut monitor = monitor.write().unwrap_or_else(PoisonError::into_inner);
            match result {
                Ok(snapshot) => {
                    tracing::debug!(query_id = %query_id, state = %snapshot.state, "Fetched snapshot");
                    monitor.record_snapshot(snapshot, Utc::now());
                }
                Err(e) => {
                    tracing::warn!(query_id = %query_id, error = %e, "Failed to fetch snapshot, will retry");
                    monitor.record_fetch_failure();
                }
            }
            monitor.next_poll_delay()
        };
        generation.send_modify(|g| *g += 1);

        let Some(delay) = delay else {
            tracing::info!(query_id = %query_id, "Query finished, poll loop exiting");
            break;
        };

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = refresh.notified() => {
                tracing::debug!(query_id = %query_id, "Manual refresh");
            }
        }
    }
}
