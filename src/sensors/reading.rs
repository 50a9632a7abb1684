//! Typed sensor readings ingested from the JSON feed
//!
//! The feed sends an open-ended JSON object per reading. Ingestion keeps only
//! the configured keys. A configured key that is absent, `null` or not a
//! number reads as `0.0`: a reading with no data draws as the calmest state
//! instead of failing the whole tick.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use super::SensorKey;

/// Value reported for a key the reading does not carry
pub const MISSING_VALUE: f64 = 0.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SensorReading {
    values: BTreeMap<SensorKey, f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<DateTime<Utc>>,
}

impl SensorReading {
    /// Reading with no values and no timestamp
    pub fn empty() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn with(mut self, key: SensorKey, value: f64) -> Self {
        self.values.insert(key, value);
        self
    }

    #[cfg(test)]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Ingest one element of the feed array, keeping only `keys`
    pub fn from_json(item: &Value, keys: impl IntoIterator<Item = SensorKey>) -> Self {
        let Some(obj) = item.as_object() else {
            tracing::debug!("Reading is not a JSON object ({}), treating as empty", kind_of(item));
            return Self::empty();
        };

        let mut values = BTreeMap::new();
        for key in keys {
            match obj.get(key.as_str()).and_then(number_of) {
                Some(v) => {
                    values.insert(key, v);
                }
                None => {
                    if let Some(raw) = obj.get(key.as_str()).filter(|v| !v.is_null()) {
                        tracing::debug!("Ignoring non-numeric {} value: {}", key, raw);
                    }
                }
            }
        }

        let timestamp = match obj.get("timestamp").filter(|v| !v.is_null()) {
            Some(raw) => {
                let parsed = parse_timestamp(raw);
                if parsed.is_none() {
                    tracing::debug!("Ignoring unparseable timestamp: {}", raw);
                }
                parsed
            }
            None => None,
        };

        Self { values, timestamp }
    }

    /// Value for `key`, or [`MISSING_VALUE`] when absent
    pub fn value(&self, key: SensorKey) -> f64 {
        self.values.get(&key).copied().unwrap_or(MISSING_VALUE)
    }

    pub fn has(&self, key: SensorKey) -> bool {
        self.values.contains_key(&key)
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }
}

fn number_of(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS` (as UTC) or epoch milliseconds,
/// the latter as an integer or an integral float
fn parse_timestamp(v: &Value) -> Option<DateTime<Utc>> {
    match v {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                    .ok()
                    .map(|naive| Utc.from_utc_datetime(&naive))
            }),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| {
                n.as_f64()
                    .filter(|ms| ms.is_finite() && ms.fract() == 0.0 && ms.abs() < i64::MAX as f64)
                    .map(|ms| ms as i64)
            })
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}

pub(crate) fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
