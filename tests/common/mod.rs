#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use meetingCaller::clients::retell_client::CallInfo;
use meetingCaller::error::{Error, Result};
use meetingCaller::models::calendar_event::CalendarEvent;
use meetingCaller::service::calendar_service::CalendarProvider;
use meetingCaller::service::contact_extractor::ContactExtractor;
use meetingCaller::service::dispatch_service::CallDispatcher;
use meetingCaller::service::openai_service::OpenAIClient;
use meetingCaller::service::phone_call_service::VoiceCallProvider;
use tokio::sync::{Barrier, Mutex};

pub fn event(id: &str, start: Option<DateTime<Utc>>, description: &str) -> CalendarEvent {
    CalendarEvent {
        id: id.to_string(),
        title: format!("Meeting {}", id),
        description: Some(description.to_string()),
        start_time: start.map(|s| s.fixed_offset().into()),
        end_time: start.map(|s| (s + Duration::hours(1)).fixed_offset().into()),
        status: Some("confirmed".to_string()),
    }
}

pub struct FakeCalendar {
    pub events: Vec<CalendarEvent>,
    pub fail: bool,
    pub list_calls: AtomicUsize,
}

impl FakeCalendar {
    pub fn new(events: Vec<CalendarEvent>) -> Self {
        Self {
            events,
            fail: false,
            list_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            events: Vec::new(),
            fail: true,
            list_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CalendarProvider for FakeCalendar {
    async fn list_upcoming(&self, _now: DateTime<Utc>) -> Result<Vec<CalendarEvent>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::provider("google-calendar", 401, "invalid_grant"));
        }
        Ok(self.events.clone())
    }

    async fn get_event(&self, event_id: &str) -> Result<CalendarEvent> {
        self.events
            .iter()
            .find(|e| e.id == event_id)
            .cloned()
            .ok_or_else(|| Error::provider("google-calendar", 404, "not found"))
    }
}

/// Replies per prompt: the first rule whose marker appears in the prompt wins.
/// With a barrier set, every reply waits until that many requests are in flight.
pub struct ScriptedOpenAI {
    pub rules: Vec<(String, std::result::Result<String, String>)>,
    pub calls: AtomicUsize,
    pub barrier: Option<Barrier>,
}

impl ScriptedOpenAI {
    pub fn new(rules: Vec<(&str, std::result::Result<&str, &str>)>) -> Self {
        Self {
            rules: rules
                .into_iter()
                .map(|(marker, reply)| {
                    (
                        marker.to_string(),
                        reply.map(str::to_string).map_err(str::to_string),
                    )
                })
                .collect(),
            calls: AtomicUsize::new(0),
            barrier: None,
        }
    }

    pub fn in_lockstep(mut self, requests: usize) -> Self {
        self.barrier = Some(Barrier::new(requests));
        self
    }
}

#[async_trait]
impl OpenAIClient for ScriptedOpenAI {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(barrier) = &self.barrier {
            barrier.wait().await;
        }
        for (marker, reply) in &self.rules {
            if prompt.contains(marker.as_str()) {
                return match reply {
                    Ok(body) => Ok(body.clone()),
                    Err(err) => Err(Error::message(err.clone())),
                };
            }
        }
        Err(Error::message("no scripted reply"))
    }
}

pub struct RecordingVoice {
    pub calls: Mutex<Vec<(String, BTreeMap<String, String>)>>,
    pub fail_numbers: Vec<String>,
}

impl RecordingVoice {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_numbers: Vec::new(),
        }
    }

    pub fn failing_for(numbers: &[&str]) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_numbers: numbers.iter().map(|n| n.to_string()).collect(),
        }
    }
}

#[async_trait]
impl VoiceCallProvider for RecordingVoice {
    async fn create_call(
        &self,
        to_number: &str,
        variables: &BTreeMap<String, String>,
    ) -> Result<CallInfo> {
        if self.fail_numbers.iter().any(|n| n == to_number) {
            return Err(Error::provider("retell", 400, "invalid number"));
        }
        let mut calls = self.calls.lock().await;
        calls.push((to_number.to_string(), variables.clone()));
        Ok(CallInfo {
            call_id: format!("call_{}", calls.len()),
            call_status: Some("registered".to_string()),
            to_number: Some(to_number.to_string()),
            disconnection_reason: None,
        })
    }

    async fn call_status(&self, call_id: &str) -> Result<CallInfo> {
        if call_id == "missing" {
            return Err(Error::provider("retell", 404, "call not found"));
        }
        Ok(CallInfo {
            call_id: call_id.to_string(),
            call_status: Some("ended".to_string()),
            to_number: None,
            disconnection_reason: Some("user_hangup".to_string()),
        })
    }
}

pub fn dispatcher(
    calendar: Arc<FakeCalendar>,
    llm: Option<Arc<ScriptedOpenAI>>,
    voice: Arc<RecordingVoice>,
) -> CallDispatcher {
    let llm = llm.map(|l| l as Arc<dyn OpenAIClient>);
    CallDispatcher::new(
        calendar,
        ContactExtractor::new(llm, chrono_tz::UTC),
        voice,
        chrono_tz::UTC,
    )
}
