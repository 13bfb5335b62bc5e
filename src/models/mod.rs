pub mod transaction;
pub mod event_classifier;

pub use transaction::{EventRecord, SimulationResult, TransactionQuery, TransactionRecord};
pub use event_classifier::{
    classify, format_event, parse_event_type, ClassifiedEvent, EventKind, EventType, MISSING_FIELD,
};
