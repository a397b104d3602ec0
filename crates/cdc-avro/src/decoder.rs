use std::collections::HashMap;

use apache_avro::Schema;
use apache_avro::types::Value as AvroValue;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid avro schema for schema_id {0}: {1}")]
    InvalidSchema(String, apache_avro::Error),
    #[error("failed to decode avro payload with schema_id {0}: {1}")]
    Decode(String, apache_avro::Error),
}

/// Per-stream Avro schema cache keyed by schema id. Rebuilt on every
/// reconnect; cross-stream sharing is unnecessary since schema ids are
/// globally unique by construction.
#[derive(Default)]
pub struct SchemaCache {
    schemas: HashMap<String, Schema>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, schema_id: &str) -> Option<&Schema> {
        self.schemas.get(schema_id)
    }

    pub fn insert(&mut self, schema_id: &str, schema_json: &str) -> Result<&Schema, DecodeError> {
        let schema = Schema::parse_str(schema_json).map_err(|e| DecodeError::InvalidSchema(schema_id.to_owned(), e))?;
        Ok(self.schemas.entry(schema_id.to_owned()).or_insert(schema))
    }
}

/// Decodes a single binary Avro datum (no container-file header, matching
/// the broker's wire format) into a generic JSON tree so callers can look up
/// fields like `ChangeEventHeader` or `FlashField__c` without binding to a
/// generated type for every tenant's schema.
pub fn decode(schema: &Schema, schema_id: &str, payload: &[u8]) -> Result<serde_json::Value, DecodeError> {
    let mut reader = payload;
    let value = apache_avro::from_avro_datum(schema, &mut reader, None).map_err(|e| DecodeError::Decode(schema_id.to_owned(), e))?;
    Ok(avro_value_to_json(value))
}

fn avro_value_to_json(value: AvroValue) -> serde_json::Value {
    use serde_json::Value as J;
    match value {
        AvroValue::Null => J::Null,
        AvroValue::Boolean(b) => J::Bool(b),
        AvroValue::Int(n) => J::from(n),
        AvroValue::Long(n) => J::from(n),
        AvroValue::Float(f) => serde_json::Number::from_f64(f as f64).map(J::Number).unwrap_or(J::Null),
        AvroValue::Double(f) => serde_json::Number::from_f64(f).map(J::Number).unwrap_or(J::Null),
        AvroValue::Bytes(b) => J::String(String::from_utf8_lossy(&b).into_owned()),
        AvroValue::String(s) => J::String(s),
        AvroValue::Fixed(_, b) => J::String(String::from_utf8_lossy(&b).into_owned()),
        AvroValue::Enum(_, symbol) => J::String(symbol),
        AvroValue::Union(_, inner) => avro_value_to_json(*inner),
        AvroValue::Array(items) => J::Array(items.into_iter().map(avro_value_to_json).collect()),
        AvroValue::Map(entries) => {
            let mut obj = serde_json::Map::with_capacity(entries.len());
            for (k, v) in entries {
                obj.insert(k, avro_value_to_json(v));
            }
            J::Object(obj)
        }
        AvroValue::Record(fields) => {
            let mut obj = serde_json::Map::with_capacity(fields.len());
            for (name, v) in fields {
                obj.insert(name, avro_value_to_json(v));
            }
            J::Object(obj)
        }
        AvroValue::Date(days) => J::from(days),
        AvroValue::Decimal(d) => J::String(format!("{d:?}")),
        AvroValue::BigDecimal(d) => J::String(d.to_string()),
        AvroValue::TimeMillis(ms) => J::from(ms),
        AvroValue::TimeMicros(us) => J::from(us),
        AvroValue::TimestampMillis(ms) => J::from(ms),
        AvroValue::TimestampMicros(us) => J::from(us),
        AvroValue::LocalTimestampMillis(ms) => J::from(ms),
        AvroValue::LocalTimestampMicros(us) => J::from(us),
        AvroValue::TimestampNanos(ns) => J::from(ns),
        AvroValue::LocalTimestampNanos(ns) => J::from(ns),
        AvroValue::Duration(d) => J::String(format!("{d:?}")),
        AvroValue::Uuid(u) => J::String(u.to_string()),
    }
}
