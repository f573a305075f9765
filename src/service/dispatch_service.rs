use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::models::calendar_event::CalendarEvent;
use crate::service::calendar_service::CalendarProvider;
use crate::service::contact_extractor::ContactExtractor;
use crate::service::eligibility::CallWindow;
use crate::service::phone_call_service::VoiceCallProvider;

pub const DEFAULT_LEDGER_RETENTION_MINUTES: i64 = 10;

const LOCAL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S %Z";

/// Event ids dispatched recently. Entries expire after `retention`.
#[derive(Debug, Clone)]
pub struct DispatchLedger {
    retention: Duration,
    dispatched: HashMap<String, DateTime<Utc>>,
}

impl Default for DispatchLedger {
    fn default() -> Self {
        Self::new(Duration::minutes(DEFAULT_LEDGER_RETENTION_MINUTES))
    }
}

impl DispatchLedger {
    pub fn new(retention: Duration) -> Self {
        Self {
            retention,
            dispatched: HashMap::new(),
        }
    }

    fn prune(&mut self, now: DateTime<Utc>) {
        let retention = self.retention;
        self.dispatched.retain(|_, at| now - *at < retention);
    }

    pub fn contains(&mut self, event_id: &str, now: DateTime<Utc>) -> bool {
        self.prune(now);
        self.dispatched.contains_key(event_id)
    }

    /// Claims `event_id`; false when another dispatch already holds it.
    pub fn try_reserve(&mut self, event_id: &str, now: DateTime<Utc>) -> bool {
        self.prune(now);
        if self.dispatched.contains_key(event_id) {
            return false;
        }
        self.dispatched.insert(event_id.to_string(), now);
        true
    }

    pub fn release(&mut self, event_id: &str) {
        self.dispatched.remove(event_id);
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DispatchResult {
    Dispatched { call_id: String },
    MissingPhone,
    AlreadyDispatched,
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct EventOutcome {
    pub event_id: String,
    pub title: String,
    pub extraction: Option<&'static str>,
    #[serde(flatten)]
    pub result: DispatchResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub cycle_id: String,
    pub checked_at: DateTime<Utc>,
    pub fetched: usize,
    pub eligible: usize,
    pub outcomes: Vec<EventOutcome>,
}

impl CycleReport {
    pub fn dispatched(&self) -> impl Iterator<Item = &EventOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.result, DispatchResult::Dispatched { .. }))
    }
}

/// One row of the diagnostic listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPreview {
    pub event_id: String,
    pub event: String,
    pub start_time: Option<String>,
    pub should_process: bool,
    pub event_start: Option<String>,
    pub current_time: String,
}

pub struct CallDispatcher {
    calendar: Arc<dyn CalendarProvider>,
    extractor: ContactExtractor,
    voice: Arc<dyn VoiceCallProvider>,
    window: CallWindow,
    ledger: Option<Mutex<DispatchLedger>>,
    timezone: Tz,
}

impl CallDispatcher {
    pub fn new(
        calendar: Arc<dyn CalendarProvider>,
        extractor: ContactExtractor,
        voice: Arc<dyn VoiceCallProvider>,
        timezone: Tz,
    ) -> Self {
        Self {
            calendar,
            extractor,
            voice,
            window: CallWindow::default(),
            ledger: None,
            timezone,
        }
    }

    pub fn with_window(mut self, window: CallWindow) -> Self {
        self.window = window;
        self
    }

    pub fn with_ledger(mut self, ledger: DispatchLedger) -> Self {
        self.ledger = Some(Mutex::new(ledger));
        self
    }

    pub fn voice(&self) -> &Arc<dyn VoiceCallProvider> {
        &self.voice
    }

    pub fn calendar(&self) -> &Arc<dyn CalendarProvider> {
        &self.calendar
    }

    /// Fetches, filters, extracts and dispatches. Only a failed listing is an error.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> Result<CycleReport> {
        let cycle_id = Uuid::new_v4().to_string();
        let span = info_span!("poll_cycle", cycle_id = %cycle_id);
        async move {
            info!("checking calendar events");
            let events = match self.calendar.list_upcoming(now).await {
                Ok(events) => events,
                Err(err) => {
                    error!(error = %err, "failed to fetch calendar events");
                    return Err(err);
                }
            };
            if events.is_empty() {
                info!("no upcoming events found");
            }

            let mut report = CycleReport {
                cycle_id: cycle_id.clone(),
                checked_at: now,
                fetched: events.len(),
                eligible: 0,
                outcomes: Vec::new(),
            };

            for event in &events {
                if !self.window.is_eligible(event, now) {
                    continue;
                }
                report.eligible += 1;
                let outcome = self.process_event(event, now).await;
                report.outcomes.push(outcome);
            }

            info!(
                fetched = report.fetched,
                eligible = report.eligible,
                dispatched = report.dispatched().count(),
                "poll cycle finished"
            );
            Ok(report)
        }
        .instrument(span)
        .await
    }

    async fn process_event(&self, event: &CalendarEvent, now: DateTime<Utc>) -> EventOutcome {
        let outcome = |extraction: Option<&'static str>, result: DispatchResult| EventOutcome {
            event_id: event.id.clone(),
            title: event.title.clone(),
            extraction,
            result,
        };

        if let Some(ledger) = &self.ledger {
            if ledger.lock().await.contains(&event.id, now) {
                info!(event_id = %event.id, "call already dispatched for event, skipping");
                return outcome(None, DispatchResult::AlreadyDispatched);
            }
        }

        info!(event_id = %event.id, title = %event.title, "processing event");
        let extraction = self.extractor.extract(event).await;
        let source = Some(extraction.source.as_str());
        let record = extraction.record;

        if !record.has_phone_number() {
            warn!(event_id = %event.id, "no phone number extracted, skipping call");
            return outcome(source, DispatchResult::MissingPhone);
        }

        if let Some(ledger) = &self.ledger {
            if !ledger.lock().await.try_reserve(&event.id, now) {
                info!(event_id = %event.id, "call already dispatched for event, skipping");
                return outcome(source, DispatchResult::AlreadyDispatched);
            }
        }

        match self
            .voice
            .create_call(&record.phone_number, &record.call_variables())
            .await
        {
            Ok(call) => {
                info!(event_id = %event.id, call_id = %call.call_id, "call initiated");
                outcome(source, DispatchResult::Dispatched { call_id: call.call_id })
            }
            Err(err) => {
                error!(event_id = %event.id, error = %err, "failed to create call");
                if let Some(ledger) = &self.ledger {
                    ledger.lock().await.release(&event.id);
                }
                outcome(source, DispatchResult::Failed { error: err.to_string() })
            }
        }
    }

    /// Lists candidate events with their eligibility, without dispatching.
    pub async fn preview(&self, now: DateTime<Utc>) -> Result<Vec<EventPreview>> {
        let events = self.calendar.list_upcoming(now).await?;
        let current_time = now.with_timezone(&self.timezone).format(LOCAL_TIME_FORMAT).to_string();
        Ok(events
            .iter()
            .map(|event| EventPreview {
                event_id: event.id.clone(),
                event: event.title.clone(),
                start_time: event.start_time.as_ref().map(|t| t.declared.clone()),
                should_process: self.window.is_eligible(event, now),
                event_start: event.start_time.as_ref().map(|t| {
                    t.instant
                        .with_timezone(&self.timezone)
                        .format(LOCAL_TIME_FORMAT)
                        .to_string()
                }),
                current_time: current_time.clone(),
            })
            .collect())
    }
}
