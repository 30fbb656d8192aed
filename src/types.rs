use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use serde_json::{Number, Value};

/// A decoded document field value.
///
/// Documents are decoded into this tagged form before any flattening or
/// classification happens, so the rest of the pipeline dispatches on the tag
/// instead of probing `serde_json::Value` at every step.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Number(Number),
    Text(String),
    /// A date/time value, e.g. a `$date` extended-JSON wrapper.
    Timestamp(DateTime<FixedOffset>),
    /// A store-assigned identifier in canonical hex text, e.g. `$oid`.
    Identifier(String),
    Object(Vec<(String, FieldValue)>),
    Array(Vec<FieldValue>),
}

impl FieldValue {
    /// Decode a JSON value, recognizing the extended-JSON wrappers document
    /// store dumps use for identifiers, dates and sized numbers.
    pub fn from_json(value: Value) -> FieldValue {
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Bool(b),
            Value::Number(n) => FieldValue::Number(n),
            Value::String(s) => FieldValue::Text(s),
            Value::Array(items) => {
                FieldValue::Array(items.into_iter().map(FieldValue::from_json).collect())
            }
            Value::Object(map) => {
                if map.len() == 1 {
                    if let Some((key, inner)) = map.iter().next() {
                        if let Some(decoded) = Self::from_extended(key, inner) {
                            return decoded;
                        }
                    }
                }
                FieldValue::Object(
                    map.into_iter()
                        .map(|(k, v)| (k, FieldValue::from_json(v)))
                        .collect(),
                )
            }
        }
    }

    /// Decode a single-key `{"$...": ...}` wrapper, or `None` if the key is
    /// not a recognized wrapper (the object is then kept as a plain object).
    fn from_extended(key: &str, inner: &Value) -> Option<FieldValue> {
        match key {
            "$oid" => inner.as_str().map(|s| FieldValue::Identifier(s.to_string())),
            "$date" => match inner {
                Value::String(s) => DateTime::parse_from_rfc3339(s)
                    .ok()
                    .map(FieldValue::Timestamp),
                Value::Object(m) => m
                    .get("$numberLong")
                    .and_then(Value::as_str)
                    .and_then(|ms| ms.parse::<i64>().ok())
                    .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
                    .map(|dt| FieldValue::Timestamp(dt.fixed_offset())),
                _ => None,
            },
            "$numberInt" | "$numberLong" => inner
                .as_str()
                .and_then(|s| s.parse::<i64>().ok())
                .map(|n| FieldValue::Number(n.into())),
            "$numberDouble" => inner
                .as_str()
                .and_then(|s| s.parse::<f64>().ok())
                .and_then(Number::from_f64)
                .map(FieldValue::Number),
            _ => None,
        }
    }

    /// Coerce a value to its textual column form.
    ///
    /// `None` means a true null cell; it is the one uniform representation of
    /// missing data all the way to the artifact. Coercion never fails: values
    /// with no obvious text form fall back to their JSON rendering.
    pub fn coerce(&self) -> Option<String> {
        match self {
            FieldValue::Null => None,
            FieldValue::Bool(b) => Some(b.to_string()),
            FieldValue::Number(n) => Some(n.to_string()),
            FieldValue::Text(s) => Some(s.clone()),
            FieldValue::Timestamp(dt) => Some(dt.to_rfc3339()),
            FieldValue::Identifier(id) => Some(id.clone()),
            FieldValue::Object(_) | FieldValue::Array(_) => {
                Some(serde_json::to_string(&self.to_json()).unwrap_or_default())
            }
        }
    }

    /// Re-encode as plain JSON, with timestamps and identifiers as text.
    /// Used to serialize scalar arrays into their single-column literal form.
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Null => Value::Null,
            FieldValue::Bool(b) => Value::Bool(*b),
            FieldValue::Number(n) => Value::Number(n.clone()),
            FieldValue::Text(s) => Value::String(s.clone()),
            FieldValue::Timestamp(dt) => Value::String(dt.to_rfc3339()),
            FieldValue::Identifier(id) => Value::String(id.clone()),
            FieldValue::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            FieldValue::Array(items) => {
                Value::Array(items.iter().map(FieldValue::to_json).collect())
            }
        }
    }
}

/// One document as fetched from the store: an ordered list of top-level
/// fields. Never persisted; it only lives for the duration of one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceRecord {
    pub fields: Vec<(String, FieldValue)>,
}

impl SourceRecord {
    /// Decode a JSON document. Returns `None` for non-object values.
    pub fn from_json(value: Value) -> Option<SourceRecord> {
        match FieldValue::from_json(value) {
            FieldValue::Object(fields) => Some(SourceRecord { fields }),
            _ => None,
        }
    }
}

/// Configuration for the stage-1 pipeline.
#[derive(Debug, Clone)]
pub struct StageConfig {
    /// Maximum number of documents sampled per collection when classifying.
    pub sample_cap: usize,

    /// Percentage of nested documents in the sample above which a collection
    /// is routed through flatten + denormalize. Strict: exactly this value
    /// still exports as simple.
    pub nested_threshold: f64,

    /// Separator joining path segments in flattened column names.
    pub separator: String,
}

impl Default for StageConfig {
    fn default() -> Self {
        StageConfig {
            sample_cap: 100,
            nested_threshold: 10.0,
            separator: String::from("_"),
        }
    }
}
