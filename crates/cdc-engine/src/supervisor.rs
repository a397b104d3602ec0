use std::sync::Arc;
use std::time::Duration;

use cdc_protocol::{ClientConfig, ClientId, ErrorNotification, ListenerStatus, ListenerStatusKind, ReplayHint};
use cdc_store::OffsetStore;
use sqlx::PgPool;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::auth::Authenticator;
use crate::error::EngineError;
use crate::notifier::Notifier;
use crate::stream_engine;
use crate::webhook::WebhookDispatcher;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

fn set_status_kind(guard: &mut ListenerStatus, kind: ListenerStatusKind) {
    guard.running = matches!(kind, ListenerStatusKind::Starting | ListenerStatusKind::Running);
    guard.status = kind;
}

async fn load_client(pool: &PgPool, client_id: ClientId) -> Result<ClientConfig, EngineError> {
    match cdc_store::fetch_client(pool, client_id).await {
        Ok(Some(client)) if client.is_active => Ok(client),
        Ok(Some(_)) => Err(EngineError::Fatal(format!("client {client_id} is disabled"))),
        Ok(None) => Err(EngineError::Fatal(format!("client {client_id} does not exist"))),
        Err(err) => Err(EngineError::Transient(format!("failed to load client {client_id}: {err}"))),
    }
}

async fn attempt(
    client: &ClientConfig,
    replay_hint: &ReplayHint,
    offset_store: &OffsetStore,
    status: &Arc<RwLock<ListenerStatus>>,
    cancel: &CancellationToken,
) -> Result<(), EngineError> {
    let session = Authenticator::new().authenticate(client).await?;

    {
        let mut guard = status.write().await;
        set_status_kind(&mut guard, ListenerStatusKind::Running);
        guard.last_error = None;
    }

    let dispatcher = WebhookDispatcher::new();
    stream_engine::run(client, &session, replay_hint, offset_store, &dispatcher, status, cancel).await
}

/// Records the error on the shared status and fires the notifier at most
/// once per run, regardless of whether this is the fatal or a transient
/// path — both count as the listener's first visible failure.
async fn record_error(
    status: &Arc<RwLock<ListenerStatus>>,
    notifier: &Arc<dyn Notifier>,
    notified: &mut bool,
    client_id: ClientId,
    client_name: String,
    topic_name: Option<String>,
    err: &EngineError,
) {
    {
        let mut guard = status.write().await;
        set_status_kind(&mut guard, ListenerStatusKind::Error);
        guard.last_error = Some(err.to_string());
        guard.fail_count += 1;
    }

    if !*notified {
        notifier
            .notify(ErrorNotification {
                client_id,
                client_name,
                error_message: err.to_string(),
                topic_name,
            })
            .await;
        *notified = true;
    }
}

/// Interruptible backoff sleep. Returns `false` if `cancel` fired first, in
/// which case the caller should stop retrying.
async fn backoff_sleep(cancel: &CancellationToken, backoff: &mut Duration) -> bool {
    tokio::select! {
        () = cancel.cancelled() => false,
        () = tokio::time::sleep(*backoff) => {
            *backoff = std::cmp::min(*backoff * 2, MAX_BACKOFF);
            true
        }
    }
}

/// The retry loop behind a running listener: reload the client row, run one
/// connect/authenticate/stream cycle, and on anything but a fatal error back
/// off (1s, doubling, capped at 60s) and try again. Fatal errors and an
/// explicit stop both end the loop without retrying.
pub async fn run(client_id: ClientId, pool: PgPool, offset_store: Arc<OffsetStore>, notifier: Arc<dyn Notifier>, replay: Arc<RwLock<ReplayHint>>, status: Arc<RwLock<ListenerStatus>>, cancel: CancellationToken) {
    let mut backoff = INITIAL_BACKOFF;
    let mut notified = false;

    while !cancel.is_cancelled() {
        let replay_hint = replay.read().await.clone();

        let client = match load_client(&pool, client_id).await {
            Ok(client) => client,
            Err(err) => {
                let is_fatal = err.is_fatal();
                record_error(&status, &notifier, &mut notified, client_id, format!("client {client_id}"), None, &err).await;
                if is_fatal || !backoff_sleep(&cancel, &mut backoff).await {
                    break;
                }
                continue;
            }
        };

        match attempt(&client, &replay_hint, &offset_store, &status, &cancel).await {
            Ok(()) => break,
            Err(err) => {
                let is_fatal = err.is_fatal();
                if let EngineError::InvalidReplayId(_) = &err {
                    offset_store.clear(client_id, &client.topic_name).await;
                }
                record_error(&status, &notifier, &mut notified, client_id, client.client_name.clone(), Some(client.topic_name.clone()), &err).await;
                if is_fatal || !backoff_sleep(&cancel, &mut backoff).await {
                    break;
                }
            }
        }
    }

    let mut guard = status.write().await;
    if guard.status != ListenerStatusKind::Error {
        set_status_kind(&mut guard, ListenerStatusKind::Stopped);
    }
}
