use serde_json::Value;

use crate::models::ClassifiedEvent;

/// Module and batch predicates fixed for the lifetime of a poller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    pub module: Option<String>,
    pub batch_id: Option<String>,
}

impl FilterCriteria {
    pub fn new(module: Option<String>, batch_id: Option<String>) -> Self {
        Self { module, batch_id }
    }

    /// True when the event passes both the module and the batch predicate
    pub fn matches(&self, event: &ClassifiedEvent, data: &Value) -> bool {
        if let Some(module) = &self.module {
            if event.module() != module {
                return false;
            }
        }

        if let Some(batch_id) = &self.batch_id {
            // batch ids compare as strings only; a numeric batch_id never matches
            if data.get("batch_id").and_then(Value::as_str) != Some(batch_id.as_str()) {
                return false;
            }
        }

        true
    }

    /// Short description for startup output and logs
    pub fn describe(&self) -> String {
        format!(
            "module={}, batch={}",
            self.module.as_deref().unwrap_or("*"),
            self.batch_id.as_deref().unwrap_or("*")
        )
    }
}
