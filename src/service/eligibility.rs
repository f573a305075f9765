//! Decides whether an event is due for its outbound call.
//!
//! The window spans `[now - 3 min, now + 2 min]`, both ends inclusive. Its
//! five minute width matches the default poll cadence, so an event is normally
//! seen by one poll, but clock jitter can let two consecutive polls accept the
//! same event. The dispatch ledger suppresses the second call.

use chrono::{DateTime, Duration, Utc};

use crate::models::calendar_event::CalendarEvent;

pub const LEAD_MINUTES: i64 = 2;
pub const GRACE_MINUTES: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallWindow {
    /// How far ahead of `now` an event may start.
    pub lead: Duration,
    /// How long after its start an event is still callable.
    pub grace: Duration,
}

impl Default for CallWindow {
    fn default() -> Self {
        Self {
            lead: Duration::minutes(LEAD_MINUTES),
            grace: Duration::minutes(GRACE_MINUTES),
        }
    }
}

impl CallWindow {
    pub fn contains(&self, start: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        start <= now + self.lead && start >= now - self.grace
    }

    /// Fails closed for events without a start instant.
    pub fn is_eligible(&self, event: &CalendarEvent, now: DateTime<Utc>) -> bool {
        match &event.start_time {
            Some(start) => self.contains(start.instant.with_timezone(&Utc), now),
            None => false,
        }
    }
}

pub fn is_eligible(event: &CalendarEvent, now: DateTime<Utc>) -> bool {
    CallWindow::default().is_eligible(event, now)
}
