/// Flat per-subsystem error enum, matching the teacher's one-enum-per-concern
/// style (`ForwarderError`, `JournalError`, `ConfigError`) rather than a
/// single crate-wide error type. Each variant corresponds to a row of the
/// error taxonomy.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Misconfiguration the operator must fix: bad credentials, missing
    /// token, topic not found, missing schema id, identity failure. Stops
    /// the supervisor; never retried.
    #[error("fatal configuration error: {0}")]
    Fatal(String),

    /// gRPC errors not classified fatal, idle-timeout watchdog trips,
    /// channel errors. Reconnect with backoff after reloading the offset.
    #[error("transient stream error: {0}")]
    Transient(String),

    /// The broker rejected our replay id. The caller clears the Offset
    /// Store entry and resets to `EARLIEST` before reconnecting.
    #[error("invalid replay id: {0}")]
    InvalidReplayId(String),
}

impl EngineError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::Fatal(_))
    }
}

/// Per-event failure: decode, schema fetch, or per-event logic error. Never
/// propagated past the event loop; the event is skipped and the stream
/// continues.
#[derive(Debug, thiserror::Error)]
#[error("event processing error: {0}")]
pub struct EventProcessingError(pub String);

/// Detects the broker's "invalid replay id" error text. The exact wording
/// is broker-specific; this matches on a stable substring rather than an
/// error code since the broker reports it via `tonic::Status` message text.
pub fn mentions_invalid_replay_id(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("invalid replay id") || lower.contains("invalid_replay_id")
}

/// Classifies a gRPC status from `GetTopic`/`Subscribe` per the fatal table:
/// `NOT_FOUND`/`PERMISSION_DENIED` are fatal when `fail_fast_not_found` is
/// set (`FAIL_FAST_NOT_FOUND`, default on); `UNAUTHENTICATED` is fatal when
/// `fail_fast_auth` is set (`FAIL_FAST_AUTH`, default on). Either flag
/// turned off downgrades its class to transient so the Supervisor retries
/// instead of giving up.
pub fn classify_topic_status(status: &tonic::Status, fail_fast_not_found: bool, fail_fast_auth: bool) -> EngineError {
    use tonic::Code;
    match status.code() {
        Code::Unauthenticated if fail_fast_auth => EngineError::Fatal(format!("GetTopic unauthenticated: {status}")),
        Code::NotFound | Code::PermissionDenied if fail_fast_not_found => EngineError::Fatal(format!("GetTopic failed fast: {status}")),
        _ if mentions_invalid_replay_id(status.message()) => EngineError::InvalidReplayId(status.message().to_owned()),
        _ => EngineError::Transient(format!("GetTopic transient error: {status}")),
    }
}
