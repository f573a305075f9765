use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::calendar_event::EventTime;

/// Contact data pulled out of an eligible event, consumed by one dispatch attempt.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ContactRecord {
    pub name: String,
    pub phone_number: String,
    pub reason: String,
    pub start_time: Option<EventTime>,
    pub end_time: Option<EventTime>,
}

impl ContactRecord {
    pub fn has_phone_number(&self) -> bool {
        !self.phone_number.trim().is_empty()
    }

    /// Named variables the voice agent can reference during the call.
    /// Times are passed exactly as the calendar declared them.
    pub fn call_variables(&self) -> BTreeMap<String, String> {
        let format_time = |time: &Option<EventTime>| {
            time.as_ref()
                .map(|t| t.declared.clone())
                .unwrap_or_default()
        };
        BTreeMap::from([
            ("name".to_string(), self.name.clone()),
            ("phone_number".to_string(), self.phone_number.clone()),
            ("reason".to_string(), self.reason.clone()),
            ("start_time".to_string(), format_time(&self.start_time)),
            ("end_time".to_string(), format_time(&self.end_time)),
        ])
    }
}
