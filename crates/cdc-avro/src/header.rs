/// The `ChangeEventHeader` sub-record every change event carries.
#[derive(Debug, Clone)]
pub struct ChangeEventHeader {
    pub entity_name: Option<String>,
    pub change_type: Option<String>,
    pub record_ids: Vec<String>,
    pub commit_timestamp: i64,
}

/// Pulls `ChangeEventHeader` out of a decoded event tree. Returns `None` if
/// the header is absent or `commitTimestamp` cannot be read as an integer —
/// the caller treats that as an `EventProcessingError` and skips the event.
pub fn extract_header(decoded: &serde_json::Value) -> Option<ChangeEventHeader> {
    let header = decoded.get("ChangeEventHeader")?;
    let commit_timestamp = header.get("commitTimestamp")?.as_i64()?;
    let record_ids = header
        .get("recordIds")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_owned)).collect())
        .unwrap_or_default();
    Some(ChangeEventHeader {
        entity_name: header.get("entityName").and_then(|v| v.as_str()).map(str::to_owned),
        change_type: header.get("changeType").and_then(|v| v.as_str()).map(str::to_owned),
        record_ids,
        commit_timestamp,
    })
}

/// Normalizes a raw `commitTimestamp` to milliseconds by guessing its unit
/// from magnitude: nanoseconds above 10^14, milliseconds above 10^11,
/// seconds above 10^9, otherwise passed through unchanged (small values
/// only occur in tests, never in a real broker response).
pub fn normalize_commit_ms(raw: i64) -> i64 {
    const NANOS_THRESHOLD: i64 = 100_000_000_000_000;
    const MILLIS_THRESHOLD: i64 = 100_000_000_000;
    const SECONDS_THRESHOLD: i64 = 1_000_000_000;

    if raw > NANOS_THRESHOLD {
        raw / 1_000_000
    } else if raw > MILLIS_THRESHOLD {
        raw
    } else if raw > SECONDS_THRESHOLD {
        raw * 1000
    } else {
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_nanoseconds() {
        assert_eq!(normalize_commit_ms(1_700_000_000_000_000_000), 1_700_000_000_000);
    }

    #[test]
    fn passes_through_milliseconds() {
        assert_eq!(normalize_commit_ms(1_700_000_000_000), 1_700_000_000_000);
    }

    #[test]
    fn scales_seconds() {
        assert_eq!(normalize_commit_ms(1_700_000_000), 1_700_000_000_000);
    }

    #[test]
    fn passes_through_small_test_values() {
        assert_eq!(normalize_commit_ms(42), 42);
    }

    #[test]
    fn extracts_header_fields() {
        let decoded = serde_json::json!({
            "ChangeEventHeader": {
                "entityName": "Account",
                "changeType": "UPDATE",
                "recordIds": ["A", "B"],
                "commitTimestamp": 1_700_000_000_000i64,
            }
        });
        let header = extract_header(&decoded).expect("header present");
        assert_eq!(header.entity_name.as_deref(), Some("Account"));
        assert_eq!(header.record_ids, vec!["A".to_owned(), "B".to_owned()]);
        assert_eq!(header.commit_timestamp, 1_700_000_000_000);
    }

    #[test]
    fn missing_header_returns_none() {
        let decoded = serde_json::json!({});
        assert!(extract_header(&decoded).is_none());
    }
}
