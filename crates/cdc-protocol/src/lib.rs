//! Shared wire and domain types for the event-ingestion service.
//!
//! Types here are used by `cdc-store` (rows read from Postgres), `cdc-engine`
//! (the listener supervisor and stream engine), and `services/ingestor` (the
//! control-surface HTTP API). None of this crate talks to Postgres or gRPC
//! directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type ClientId = i64;

/// OAuth grant kind, tagged rather than a bare string so that the required
/// username/password pair is enforced by the type rather than by a
/// cross-field validator re-run on every read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantKind {
    Password { username: String, password: String },
    ClientCredentials { username: String, password: String },
}

/// A client (tenant) configuration row, already validated by its producer.
/// The core only reads these; it never writes them.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub id: ClientId,
    pub client_name: String,
    pub login_url: String,
    pub grant: GrantKind,
    pub oauth_client_id: String,
    pub oauth_client_secret: String,
    pub topic_name: String,
    pub webhook_url: String,
    pub pubsub_host: String,
    pub tenant_id: Option<String>,
    pub flow_batch_size: i32,
    pub is_active: bool,
}

/// A previously-committed replay cursor for a `(client_id, topic_name)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredOffset {
    pub replay_b64: String,
    pub commit_ms: Option<i64>,
}

/// How a Stream Engine run should pick its starting point, supplied by a
/// caller of `Manager::start`/`restart` or defaulted to `Stored`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ReplayHint {
    #[default]
    Stored,
    Latest,
    Earliest,
    Custom {
        replay_id_b64: String,
    },
    Since {
        since_minutes: i64,
    },
}

/// The resolved replay-start descriptor, computed once per Supervisor run
/// from a `ReplayHint` (see `cdc-engine::replay_start`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayPreset {
    Latest,
    Earliest,
    Custom(Vec<u8>),
}

impl ReplayPreset {
    pub fn label(&self) -> &'static str {
        match self {
            ReplayPreset::Latest => "latest",
            ReplayPreset::Earliest => "earliest",
            ReplayPreset::Custom(_) => "custom",
        }
    }
}

/// A fully resolved replay start, including the optional local cutoff used
/// by `since` mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayStart {
    pub preset: ReplayPreset,
    pub drop_before_ms: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenerStatusKind {
    Stopped,
    Starting,
    Running,
    Stopping,
    Error,
}

/// Point-in-time snapshot of a listener, as exposed by the control surface.
///
/// `running` is `true` when `status` is `starting` or `running`, matching
/// the source system's own `is_running()` semantics rather than tracking a
/// separate boolean.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerStatus {
    pub client_id: ClientId,
    pub status: ListenerStatusKind,
    pub running: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub last_beat: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub fail_count: u32,
    pub events_received: u64,
    pub last_webhook_status: Option<u16>,
    pub schema_id: Option<String>,
    pub last_replay_b64: Option<String>,
    pub chosen_replay_start: Option<String>,
}

impl ListenerStatus {
    pub fn stopped(client_id: ClientId) -> Self {
        Self {
            client_id,
            status: ListenerStatusKind::Stopped,
            running: false,
            started_at: None,
            last_beat: None,
            last_error: None,
            fail_count: 0,
            events_received: 0,
            last_webhook_status: None,
            schema_id: None,
            last_replay_b64: None,
            chosen_replay_start: None,
        }
    }
}

/// Body accepted by the `start`/`restart` control-surface routes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartListenerRequest {
    pub replay: Option<ReplayHint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerListResponse {
    pub items: Vec<ListenerStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutostartResponse {
    pub started: usize,
}

/// Payload handed to the `Notifier` on a listener's first error.
#[derive(Debug, Clone)]
pub struct ErrorNotification {
    pub client_id: ClientId,
    pub client_name: String,
    pub error_message: String,
    pub topic_name: Option<String>,
}

/// The webhook envelope posted per dispatched record. `decoded` carries the
/// full decoded event with `ChangeEventHeader.recordIds` narrowed to the
/// single `record_id` this envelope is for.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookEnvelope {
    pub client_id: ClientId,
    pub topic: String,
    pub schema_id: String,
    #[serde(rename = "recordId")]
    pub record_id: String,
    pub decoded: serde_json::Value,
}
