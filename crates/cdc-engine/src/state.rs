use std::sync::Arc;

use cdc_protocol::{ClientId, ListenerStatus, ReplayHint};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Mutable run state for a listener: the supervisor task itself and the
/// token used to ask it to stop. Guarded by its own lock, separate from the
/// [`ListenerStatus`] lock and the Manager's registry lock, so a status read
/// never blocks on a start/stop in flight and vice versa.
#[derive(Default)]
pub struct RunState {
    pub cancel: Option<CancellationToken>,
    pub task: Option<JoinHandle<()>>,
}

impl RunState {
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

/// One entry per client ever started in this process. Created once on first
/// `start` and reused across subsequent start/stop/restart calls — mirroring
/// the source's `Listener` object, which is never discarded once it exists
/// for a given client id, only stopped and relaunched.
#[derive(Clone)]
pub struct ListenerEntry {
    pub client_id: ClientId,
    pub status: Arc<RwLock<ListenerStatus>>,
    pub replay: Arc<RwLock<ReplayHint>>,
    pub run: Arc<Mutex<RunState>>,
}

impl ListenerEntry {
    pub fn new(client_id: ClientId) -> Self {
        Self {
            client_id,
            status: Arc::new(RwLock::new(ListenerStatus::stopped(client_id))),
            replay: Arc::new(RwLock::new(ReplayHint::default())),
            run: Arc::new(Mutex::new(RunState::default())),
        }
    }

    pub async fn snapshot(&self) -> ListenerStatus {
        self.status.read().await.clone()
    }
}
