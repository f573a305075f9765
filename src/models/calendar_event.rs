use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// An event as listed by the calendar provider. Never mutated locally.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    /// `None` for all-day events, which only carry a date.
    pub start_time: Option<EventTime>,
    pub end_time: Option<EventTime>,
    pub status: Option<String>,
}

impl CalendarEvent {
    pub fn description_text(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }
}

/// A timestamp as the provider declared it, plus the parsed instant.
///
/// `declared` is what gets handed on to the voice agent; `instant` is what
/// window checks and local rendering use.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct EventTime {
    pub instant: DateTime<FixedOffset>,
    pub declared: String,
}

impl EventTime {
    pub fn parse(raw: &str) -> Result<Self, chrono::ParseError> {
        let instant = DateTime::parse_from_rfc3339(raw)?;
        Ok(Self {
            instant,
            declared: raw.to_string(),
        })
    }
}

impl From<DateTime<FixedOffset>> for EventTime {
    fn from(instant: DateTime<FixedOffset>) -> Self {
        Self {
            declared: instant.to_rfc3339(),
            instant,
        }
    }
}
