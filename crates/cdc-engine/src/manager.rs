use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use cdc_protocol::{AutostartResponse, ClientId, ListenerListResponse, ListenerStatus, ListenerStatusKind, ReplayHint};
use cdc_store::{ConfigStoreError, OffsetStore};
use chrono::Utc;
use sqlx::PgPool;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::notifier::Notifier;
use crate::state::ListenerEntry;
use crate::supervisor;

const STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// Owns every listener this process knows about. A single [`Mutex`] guards
/// registry mutations (creating an entry, taking its run state to stop it);
/// status reads go through each entry's own `RwLock` and never contend with
/// that mutex for longer than a clone.
pub struct Manager {
    pool: PgPool,
    offset_store: Arc<OffsetStore>,
    notifier: Arc<dyn Notifier>,
    registry: Mutex<HashMap<ClientId, ListenerEntry>>,
}

impl Manager {
    pub fn new(pool: PgPool, offset_store: Arc<OffsetStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            pool,
            offset_store,
            notifier,
            registry: Mutex::new(HashMap::new()),
        }
    }

    async fn get_or_create(&self, client_id: ClientId) -> ListenerEntry {
        let mut registry = self.registry.lock().await;
        registry.entry(client_id).or_insert_with(|| ListenerEntry::new(client_id)).clone()
    }

    async fn lookup(&self, client_id: ClientId) -> Option<ListenerEntry> {
        self.registry.lock().await.get(&client_id).cloned()
    }

    /// Idempotent: updates the replay hint unconditionally, but only spawns
    /// a fresh supervisor task when none is currently running, matching the
    /// source's `start()`/`is_running()` gate.
    pub async fn start(&self, client_id: ClientId, replay: Option<ReplayHint>) -> ListenerStatus {
        let entry = self.get_or_create(client_id).await;
        *entry.replay.write().await = replay.unwrap_or_default();

        let mut run = entry.run.lock().await;
        if !run.is_running() {
            {
                let mut guard = entry.status.write().await;
                *guard = ListenerStatus::stopped(client_id);
                guard.status = ListenerStatusKind::Starting;
                guard.running = true;
                guard.started_at = Some(Utc::now());
            }
            let cancel = CancellationToken::new();
            let task = tokio::spawn(supervisor::run(
                client_id,
                self.pool.clone(),
                self.offset_store.clone(),
                self.notifier.clone(),
                entry.replay.clone(),
                entry.status.clone(),
                cancel.clone(),
            ));
            run.cancel = Some(cancel);
            run.task = Some(task);
        }
        drop(run);
        entry.snapshot().await
    }

    /// No-op (returning a `stopped` shape) for a client id that was never
    /// started. A running listener is given up to 10s to exit cleanly after
    /// its cancellation token fires before the task is forcibly aborted.
    pub async fn stop(&self, client_id: ClientId) -> ListenerStatus {
        let Some(entry) = self.lookup(client_id).await else {
            return ListenerStatus::stopped(client_id);
        };

        let (cancel, task) = {
            let mut run = entry.run.lock().await;
            if !run.is_running() {
                return entry.snapshot().await;
            }
            entry.status.write().await.status = ListenerStatusKind::Stopping;
            (run.cancel.take(), run.task.take())
        };

        if let Some(cancel) = cancel {
            cancel.cancel();
        }
        if let Some(mut task) = task {
            if tokio::time::timeout(STOP_TIMEOUT, &mut task).await.is_err() {
                task.abort();
                let _ = task.await;
            }
        }

        {
            let mut guard = entry.status.write().await;
            guard.status = ListenerStatusKind::Stopped;
            guard.running = false;
        }
        entry.snapshot().await
    }

    pub async fn restart(&self, client_id: ClientId, replay: Option<ReplayHint>) -> ListenerStatus {
        self.stop(client_id).await;
        self.start(client_id, replay).await
    }

    pub async fn status(&self, client_id: ClientId) -> ListenerStatus {
        match self.lookup(client_id).await {
            Some(entry) => entry.snapshot().await,
            None => ListenerStatus::stopped(client_id),
        }
    }

    pub async fn status_all(&self) -> ListenerListResponse {
        let entries: Vec<ListenerEntry> = self.registry.lock().await.values().cloned().collect();
        let mut items = Vec::with_capacity(entries.len());
        for entry in entries {
            items.push(entry.snapshot().await);
        }
        ListenerListResponse { items }
    }

    /// Starts every currently-active client that isn't already running.
    /// Returns the number of clients it issued a start for, regardless of
    /// whether that start actually spawned a new task (mirrors the source's
    /// plain start-and-count loop).
    pub async fn autostart_active(&self) -> Result<AutostartResponse, ConfigStoreError> {
        let clients = cdc_store::list_active_clients(&self.pool).await?;
        let started = clients.len();
        for client in clients {
            self.start(client.id, None).await;
        }
        Ok(AutostartResponse { started })
    }
}
