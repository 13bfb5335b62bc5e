use serde_json::Value;

use crate::error::EventError;
use crate::models::EventRecord;

/// Placeholder printed for a field the event data does not carry
pub const MISSING_FIELD: &str = "undefined";

/// The three leading segments of a fully-qualified event type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventType {
    pub address: String,
    pub module: String,
    pub name: String,
}

/// Split `<address>::<module>::<name>`. Segments after the third are ignored.
pub fn parse_event_type(raw: &str) -> Option<EventType> {
    let mut segments = raw.split("::");
    let address = segments.next()?;
    let module = segments.next()?;
    let name = segments.next()?;

    Some(EventType {
        address: address.to_string(),
        module: module.to_string(),
        name: name.to_string(),
    })
}

/// Supply-chain event kinds with a dedicated rendering
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    DrillingStarted,
    DrillingCompleted,
    Transportation,
    Refining,
    Delivery,
    Unknown(String),
}

impl EventKind {
    pub fn from_name(name: &str) -> Self {
        match name {
            "DrillingStartedEvent" => EventKind::DrillingStarted,
            "DrillingCompletedEvent" => EventKind::DrillingCompleted,
            "TransportationEvent" => EventKind::Transportation,
            "RefiningEvent" => EventKind::Refining,
            "DeliveryEvent" => EventKind::Delivery,
            other => EventKind::Unknown(other.to_string()),
        }
    }

    /// Render the event data as one human-readable line
    pub fn render(&self, data: &Value) -> String {
        match self {
            EventKind::DrillingStarted => format!(
                "Drilling started: batch {} at {} ({} {})",
                field(data, "batch_id"),
                field(data, "location"),
                field(data, "quantity"),
                field(data, "unit"),
            ),
            EventKind::DrillingCompleted => format!(
                "Drilling completed: batch {} at {} ({} {})",
                field(data, "batch_id"),
                field(data, "location"),
                field(data, "quantity"),
                field(data, "unit"),
            ),
            EventKind::Transportation => format!(
                "Transportation: batch {} from {} to {} via {} ({} {})",
                field(data, "batch_id"),
                field(data, "from"),
                field(data, "to"),
                field(data, "method"),
                field(data, "quantity"),
                field(data, "unit"),
            ),
            EventKind::Refining => format!(
                "Refining: batch {} at {} produced {} {}",
                field(data, "batch_id"),
                field(data, "refinery"),
                field(data, "output_quantity"),
                field(data, "unit"),
            ),
            EventKind::Delivery => format!(
                "Delivery: batch {} delivered to {} ({} {})",
                field(data, "batch_id"),
                field(data, "destination"),
                field(data, "quantity"),
                field(data, "unit"),
            ),
            EventKind::Unknown(name) => format!("{}: {}", name, dump(data)),
        }
    }
}

/// An event whose type string parsed successfully
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedEvent {
    pub event_type: EventType,
    pub kind: EventKind,
}

impl ClassifiedEvent {
    pub fn module(&self) -> &str {
        &self.event_type.module
    }
}

pub fn classify(event: &EventRecord) -> Result<ClassifiedEvent, EventError> {
    let event_type = parse_event_type(&event.event_type)
        .ok_or_else(|| EventError::Malformed(event.event_type.clone()))?;
    let kind = EventKind::from_name(&event_type.name);
    Ok(ClassifiedEvent { event_type, kind })
}

/// Human-readable line for any event; malformed types fall back to the raw type and data
pub fn format_event(event: &EventRecord) -> String {
    match classify(event) {
        Ok(classified) => classified.kind.render(&event.data),
        Err(_) => format!("{}: {}", event.event_type, dump(&event.data)),
    }
}

/// String value of a data field, `undefined` when absent
fn field(data: &Value, key: &str) -> String {
    match data.get(key) {
        None => MISSING_FIELD.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// `key: value` pairs for objects in wire order, the JSON text for anything else
fn dump(data: &Value) -> String {
    match data {
        Value::Object(map) => map
            .keys()
            .map(|key| format!("{}: {}", key, field(data, key)))
            .collect::<Vec<_>>()
            .join(", "),
        Value::Null => "{}".to_string(),
        other => other.to_string(),
    }
}
