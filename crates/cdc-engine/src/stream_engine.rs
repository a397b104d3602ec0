use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use cdc_avro::SchemaCache;
use cdc_broker::proto::FetchRequest;
use cdc_broker::{BrokerClient, BrokerError, CallCredentials};
use cdc_protocol::{ClientConfig, ListenerStatus, ReplayHint, ReplayPreset};
use cdc_store::OffsetStore;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::auth::Session;
use crate::error::{EngineError, classify_topic_status};
use crate::event::process_event;
use crate::replay;
use crate::webhook::WebhookDispatcher;

/// Outbound credit pings and the idle watchdog share one ticker: every tick
/// the engine both refills a token's worth of credit and checks how long
/// it's been since the last inbound message. Configurable via
/// `HEARTBEAT_SECONDS` (default 60) and `IDLE_RESET_SECONDS` (default 300).
fn heartbeat_interval() -> Duration {
    Duration::from_secs(env_u64("HEARTBEAT_SECONDS", 60))
}

/// No inbound message (including the broker's own heartbeat acks) within
/// this long means the stream is dead from our side.
fn idle_timeout() -> Duration {
    Duration::from_secs(env_u64("IDLE_RESET_SECONDS", 300))
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_bool(name: &str, default: bool) -> bool {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn preset_wire(preset: &ReplayPreset) -> (i32, Vec<u8>) {
    use cdc_broker::proto::ReplayPreset as WirePreset;
    match preset {
        ReplayPreset::Latest => (WirePreset::Latest as i32, Vec::new()),
        ReplayPreset::Earliest => (WirePreset::Earliest as i32, Vec::new()),
        ReplayPreset::Custom(bytes) => (WirePreset::Custom as i32, bytes.clone()),
    }
}

/// Runs one connect-subscribe-consume cycle for a client: authenticates the
/// gRPC calls with `session`, resolves where to start from `replay_hint`
/// against the durably stored offset, and then drives the `tokio::select!`
/// loop that multiplexes the heartbeat/watchdog ticker, the response
/// stream, and the stop signal into a single task (§4.3). Returns `Ok(())`
/// only on a clean stop via `cancel`; any other exit is an `EngineError` for
/// the supervisor to classify.
pub async fn run(
    client: &ClientConfig,
    session: &Session,
    replay_hint: &ReplayHint,
    offset_store: &OffsetStore,
    dispatcher: &WebhookDispatcher,
    status: &Arc<RwLock<ListenerStatus>>,
    cancel: &CancellationToken,
) -> Result<(), EngineError> {
    let stored = offset_store.load(client.id, &client.topic_name).await;
    let now_ms = chrono::Utc::now().timestamp_millis();
    let resolved = replay::resolve(replay_hint, stored.as_ref(), now_ms);

    if resolved.clear_stored {
        offset_store.clear(client.id, &client.topic_name).await;
    }

    let tenant_id = client.tenant_id.clone().unwrap_or_else(|| session.organization_id.clone());
    let creds = CallCredentials {
        access_token: session.access_token.clone(),
        tenant_id,
        instance_url: session.instance_url.clone(),
    };

    let mut broker = BrokerClient::connect(&client.pubsub_host).await.map_err(|e| EngineError::Transient(format!("failed to connect to broker: {e}")))?;

    let fail_fast_not_found = env_bool("FAIL_FAST_NOT_FOUND", true);
    let fail_fast_auth = env_bool("FAIL_FAST_AUTH", true);

    let topic_info = broker.get_topic(&client.topic_name, &creds).await.map_err(|e| match e {
        BrokerError::Status(status) => classify_topic_status(&status, fail_fast_not_found, fail_fast_auth),
        other => EngineError::Transient(format!("get_topic failed: {other}")),
    })?;
    if topic_info.schema_id.is_empty() {
        return Err(EngineError::Fatal(format!("topic {} returned an empty schema_id", client.topic_name)));
    }

    let mut schema_cache = SchemaCache::new();
    let schema_info = broker.get_schema(&topic_info.schema_id, &creds).await.map_err(|e| EngineError::Transient(format!("get_schema failed: {e}")))?;
    schema_cache
        .insert(&topic_info.schema_id, &schema_info.schema_json)
        .map_err(|e| EngineError::Fatal(format!("topic schema {} is not valid avro: {e}", topic_info.schema_id)))?;

    {
        let mut guard = status.write().await;
        guard.schema_id = Some(topic_info.schema_id.clone());
        guard.chosen_replay_start = Some(resolved.start.preset.label().to_owned());
    }

    let mut subscription = broker.subscribe(&creds).await.map_err(|e| EngineError::Transient(format!("subscribe failed: {e}")))?;

    let (replay_preset, replay_id) = preset_wire(&resolved.start.preset);
    subscription
        .send_credit(FetchRequest {
            topic_name: client.topic_name.clone(),
            replay_preset,
            replay_id,
            num_requested: client.flow_batch_size,
        })
        .map_err(|e| EngineError::Transient(format!("failed to send initial credit: {e}")))?;

    let idle_timeout = idle_timeout();
    let mut ticker = tokio::time::interval(heartbeat_interval());
    ticker.tick().await; // first tick fires immediately; consume it.
    let mut last_rx = Instant::now();

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                subscription.close();
                return Ok(());
            }
            _ = ticker.tick() => {
                if last_rx.elapsed() > idle_timeout {
                    return Err(EngineError::Transient(format!("no message received from broker in {:?}", last_rx.elapsed())));
                }
                // Bare heartbeat: per the resolved contract, the broker only
                // consults topic_name/replay_preset on a stream's first
                // request, so a credit-only refill is sufficient here.
                if subscription
                    .send_credit(FetchRequest {
                        topic_name: String::new(),
                        replay_preset: 0,
                        replay_id: Vec::new(),
                        num_requested: client.flow_batch_size,
                    })
                    .is_err()
                {
                    return Err(EngineError::Transient("heartbeat credit channel closed".to_owned()));
                }
            }
            received = subscription.recv() => {
                let response = match received {
                    Ok(Some(response)) => response,
                    Ok(None) => return Err(EngineError::Transient("broker closed the subscribe stream".to_owned())),
                    Err(BrokerError::Status(grpc_status)) => {
                        if crate::error::mentions_invalid_replay_id(grpc_status.message()) {
                            return Err(EngineError::InvalidReplayId(grpc_status.message().to_owned()));
                        }
                        return Err(EngineError::Transient(format!("subscribe stream error: {grpc_status}")));
                    }
                    Err(other) => return Err(EngineError::Transient(format!("subscribe stream error: {other}"))),
                };

                last_rx = Instant::now();
                {
                    let mut guard = status.write().await;
                    guard.last_beat = Some(chrono::Utc::now());
                }

                if response.events.is_empty() {
                    continue;
                }

                for consumer_event in &response.events {
                    match process_event(client, &mut schema_cache, &mut broker, &creds, dispatcher, offset_store, resolved.start.drop_before_ms, consumer_event).await {
                        Ok(outcome) => {
                            let mut guard = status.write().await;
                            guard.events_received += 1;
                            if let Some(status_code) = outcome.last_webhook_status {
                                guard.last_webhook_status = Some(status_code);
                            }
                            if outcome.advanced {
                                guard.last_replay_b64 = Some(BASE64.encode(&consumer_event.replay_id));
                            }
                        }
                        Err(err) => {
                            tracing::warn!(client_id = client.id, topic = %client.topic_name, %err, "skipping event that failed processing");
                        }
                    }
                }

                if subscription
                    .send_credit(FetchRequest {
                        topic_name: String::new(),
                        replay_preset: 0,
                        replay_id: Vec::new(),
                        num_requested: response.events.len() as i32,
                    })
                    .is_err()
                {
                    return Err(EngineError::Transient("credit refill channel closed".to_owned()));
                }
            }
        }
    }
}
