use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One entry of an account's transaction history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionRecord {
    #[serde(deserialize_with = "deserialize_u64_lenient")]
    pub version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default, deserialize_with = "deserialize_events_lenient")]
    pub events: Vec<EventRecord>,
}

/// An event embedded in a transaction.
///
/// A missing or non-string `type` decodes as an empty string, so one bad event
/// surfaces later as a malformed event instead of failing the whole page.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EventRecord {
    /// Fully-qualified `<address>::<module>::<name>`
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: Value,
}

impl From<Value> for EventRecord {
    fn from(raw: Value) -> Self {
        let event_type = raw
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let data = match raw {
            Value::Object(mut map) => map.remove("data").unwrap_or(Value::Null),
            _ => Value::Null,
        };

        Self { event_type, data }
    }
}

impl<'de> Deserialize<'de> for EventRecord {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(EventRecord::from)
    }
}

/// Query parameters for the transaction history endpoint, passed through as-is
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct TransactionQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<u64>,
}

impl TransactionQuery {
    pub fn with_limit(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            start: None,
        }
    }

    pub fn starting_at(mut self, start: u64) -> Self {
        self.start = Some(start);
        self
    }
}

/// Result of a dry-run transaction
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationResult {
    pub success: bool,
    #[serde(deserialize_with = "deserialize_u64_lenient")]
    pub gas_used: u64,
    #[serde(default, deserialize_with = "deserialize_u64_lenient")]
    pub gas_unit_price: u64,
    pub vm_status: String,
    #[serde(default)]
    pub changes: Vec<Value>,
    #[serde(default, deserialize_with = "deserialize_events_lenient")]
    pub events: Vec<EventRecord>,
}

/// `null` and non-array `events` decode as no events
fn deserialize_events_lenient<'de, D>(deserializer: D) -> Result<Vec<EventRecord>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Array(items) => Ok(items.into_iter().map(EventRecord::from).collect()),
        _ => Ok(Vec::new()),
    }
}

/// Accepts a u64 encoded either as a JSON number or a decimal string
fn deserialize_u64_lenient<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(u64),
        String(String),
    }

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::String(s) => s
            .trim()
            .parse::<u64>()
            .map_err(|e| serde::de::Error::custom(format!("invalid u64 '{}': {}", s, e))),
    }
}
