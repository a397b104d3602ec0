/// Tri-valued coercion result for the tenant-specific `FlashField__c` filter.
/// Only `True` causes a record to be dispatched; `False` and `Undefined`
/// both suppress it, but are kept distinct for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterValue {
    True,
    False,
    Undefined,
}

impl FilterValue {
    pub fn is_true(self) -> bool {
        matches!(self, FilterValue::True)
    }
}

fn coerce_scalar(value: &serde_json::Value) -> FilterValue {
    match value {
        serde_json::Value::Null => FilterValue::Undefined,
        serde_json::Value::Bool(b) => {
            if *b {
                FilterValue::True
            } else {
                FilterValue::False
            }
        }
        serde_json::Value::String(s) => {
            let lower = s.to_ascii_lowercase();
            match lower.as_str() {
                "true" | "1" | "yes" | "y" => FilterValue::True,
                "false" | "0" | "no" | "n" | "" => FilterValue::False,
                _ => {
                    tracing::warn!(value = %s, "FlashField__c string did not match a known true/false token, coercing by truthiness");
                    FilterValue::True
                }
            }
        }
        serde_json::Value::Number(n) => {
            if n.as_f64().is_some_and(|f| f != 0.0) {
                FilterValue::True
            } else {
                FilterValue::False
            }
        }
        other => {
            tracing::warn!(?other, "FlashField__c had an unexpected type, coercing by truthiness");
            if other.is_array() && other.as_array().is_some_and(|a| a.is_empty()) {
                FilterValue::False
            } else {
                FilterValue::True
            }
        }
    }
}

/// Resolves the per-`recordId` filter value for an event. `FlashField__c`
/// may be a scalar applying to every record, or a list indexed element-wise
/// against `record_ids`; a list shorter than `record_ids` leaves the
/// out-of-range records `Undefined` rather than falling back to a scalar
/// coercion of the list itself (matching the source's per-index lookup,
/// which simply has nothing to return past the end of the list).
pub fn resolve_per_record(flash_field: Option<&serde_json::Value>, record_ids: &[String]) -> Vec<FilterValue> {
    let Some(value) = flash_field else {
        return vec![FilterValue::Undefined; record_ids.len()];
    };

    if let Some(list) = value.as_array() {
        return (0..record_ids.len()).map(|i| list.get(i).map_or(FilterValue::Undefined, coerce_scalar)).collect();
    }

    let scalar = coerce_scalar(value);
    vec![scalar; record_ids.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_aligned_to_record_ids() {
        let record_ids = vec!["A".to_owned(), "B".to_owned()];
        let flash = serde_json::json!([true, false]);
        let resolved = resolve_per_record(Some(&flash), &record_ids);
        assert_eq!(resolved, vec![FilterValue::True, FilterValue::False]);
    }

    #[test]
    fn scalar_applies_to_all_records() {
        let record_ids = vec!["A".to_owned(), "B".to_owned(), "C".to_owned()];
        let flash = serde_json::json!("yes");
        let resolved = resolve_per_record(Some(&flash), &record_ids);
        assert_eq!(resolved, vec![FilterValue::True; 3]);
    }

    #[test]
    fn short_list_leaves_tail_undefined() {
        let record_ids = vec!["A".to_owned(), "B".to_owned()];
        let flash = serde_json::json!([false]);
        let resolved = resolve_per_record(Some(&flash), &record_ids);
        assert_eq!(resolved, vec![FilterValue::False, FilterValue::Undefined]);
    }

    #[test]
    fn missing_field_is_undefined() {
        let record_ids = vec!["A".to_owned()];
        let resolved = resolve_per_record(None, &record_ids);
        assert_eq!(resolved, vec![FilterValue::Undefined]);
    }

    #[test]
    fn false_tokens_are_recognized() {
        for token in ["false", "0", "no", "n", ""] {
            assert_eq!(coerce_scalar(&serde_json::Value::String(token.to_owned())), FilterValue::False);
        }
    }
}
