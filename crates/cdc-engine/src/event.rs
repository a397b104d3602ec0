use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use cdc_avro::{SchemaCache, extract_header, normalize_commit_ms, resolve_per_record};
use cdc_broker::{BrokerClient, CallCredentials, proto};
use cdc_protocol::{ClientConfig, WebhookEnvelope};
use cdc_store::OffsetStore;

use crate::error::EventProcessingError;
use crate::webhook::{WebhookDispatcher, is_success};

/// Result of processing one received event, fed back into the Stream
/// Engine's counters (`events_received`, `last_webhook_status`).
pub struct EventOutcome {
    pub dispatched: usize,
    pub advanced: bool,
    pub last_webhook_status: Option<u16>,
    pub commit_ms: i64,
}

fn narrow_to_record(decoded: &serde_json::Value, record_id: &str) -> serde_json::Value {
    let mut narrowed = decoded.clone();
    if let Some(header) = narrowed.get_mut("ChangeEventHeader") {
        header["recordIds"] = serde_json::Value::Array(vec![serde_json::Value::String(record_id.to_owned())]);
    }
    narrowed
}

/// Implements §4.4: decode, extract header, normalize the commit timestamp,
/// apply the `since` cutoff, resolve the `FlashField__c` filter per record,
/// dispatch one webhook per matching record, and compute the commit
/// decision. Returns `Ok` with `advanced = false` when the event must not
/// move the cursor (a dispatched webhook failed) — the caller must not call
/// `OffsetStore::save` in that case.
#[allow(clippy::too_many_arguments)]
pub async fn process_event(
    client: &ClientConfig,
    schema_cache: &mut SchemaCache,
    broker: &mut BrokerClient,
    creds: &CallCredentials,
    dispatcher: &WebhookDispatcher,
    offset_store: &OffsetStore,
    drop_before_ms: Option<i64>,
    consumer_event: &proto::ConsumerEvent,
) -> Result<EventOutcome, EventProcessingError> {
    let event_info = consumer_event.event.as_ref().ok_or_else(|| EventProcessingError("consumer event missing event payload".to_owned()))?;
    let schema_id = event_info.schema_id.clone();
    let replay_b64 = BASE64.encode(&consumer_event.replay_id);

    if schema_cache.get(&schema_id).is_none() {
        let schema_info = broker
            .get_schema(&schema_id, creds)
            .await
            .map_err(|e| EventProcessingError(format!("failed to fetch schema {schema_id}: {e}")))?;
        schema_cache
            .insert(&schema_id, &schema_info.schema_json)
            .map_err(|e| EventProcessingError(format!("failed to parse schema {schema_id}: {e}")))?;
    }
    let schema = schema_cache.get(&schema_id).expect("schema was just inserted");

    let decoded = cdc_avro::decode(schema, &schema_id, &event_info.payload).map_err(|e| EventProcessingError(format!("failed to decode event: {e}")))?;

    let header = extract_header(&decoded).ok_or_else(|| EventProcessingError("event missing ChangeEventHeader or commitTimestamp".to_owned()))?;
    let commit_ms = normalize_commit_ms(header.commit_timestamp);

    if let Some(cutoff) = drop_before_ms {
        if commit_ms < cutoff {
            offset_store.save(client.id, &client.topic_name, &replay_b64, Some(commit_ms)).await;
            return Ok(EventOutcome {
                dispatched: 0,
                advanced: true,
                last_webhook_status: None,
                commit_ms,
            });
        }
    }

    let flash_field = decoded.get("FlashField__c");
    let filters = resolve_per_record(flash_field, &header.record_ids);

    let mut dispatched = 0usize;
    let mut all_succeeded = true;
    let mut last_webhook_status = None;

    for (record_id, filter) in header.record_ids.iter().zip(filters.iter()) {
        if !filter.is_true() {
            continue;
        }
        let envelope = WebhookEnvelope {
            client_id: client.id,
            topic: client.topic_name.clone(),
            schema_id: schema_id.clone(),
            record_id: record_id.clone(),
            decoded: narrow_to_record(&decoded, record_id),
        };
        let status = dispatcher.post(&client.webhook_url, &envelope).await;
        dispatched += 1;
        last_webhook_status = Some(status);
        if !is_success(status) {
            all_succeeded = false;
        }
    }

    let advanced = dispatched == 0 || all_succeeded;
    if advanced {
        offset_store.save(client.id, &client.topic_name, &replay_b64, Some(commit_ms)).await;
    }

    Ok(EventOutcome {
        dispatched,
        advanced,
        last_webhook_status,
        commit_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrow_to_record_sets_single_record_id() {
        let decoded = serde_json::json!({
            "ChangeEventHeader": { "recordIds": ["A", "B"] },
            "Name": "x",
        });
        let narrowed = narrow_to_record(&decoded, "A");
        assert_eq!(narrowed["ChangeEventHeader"]["recordIds"], serde_json::json!(["A"]));
        assert_eq!(narrowed["Name"], serde_json::json!("x"));
        // original is untouched
        assert_eq!(decoded["ChangeEventHeader"]["recordIds"], serde_json::json!(["A", "B"]));
    }
}
