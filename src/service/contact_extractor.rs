use std::sync::{Arc, LazyLock};

use chrono_tz::Tz;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::clients::openai_client::build_extraction_prompt;
use crate::models::calendar_event::CalendarEvent;
use crate::models::contact::ContactRecord;
use crate::service::openai_service::OpenAIClient;

const PURPOSE_PHRASE: &str = "The purpose of this meeting";

static PURPOSE_SENTENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)The purpose of this meeting is to (.+?)(?:\.|$)")
        .unwrap_or_else(|err| panic!("invalid purpose regex: {err}"))
});

/// Which path produced the record. Every variant carries a usable record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionSource {
    Model,
    ModelParseFailure,
    ModelCallFailure,
    /// No language model configured.
    FallbackOnly,
}

impl ExtractionSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::ModelParseFailure => "model_parse_failure",
            Self::ModelCallFailure => "model_call_failure",
            Self::FallbackOnly => "fallback_only",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Extraction {
    pub record: ContactRecord,
    pub source: ExtractionSource,
}

pub struct ContactExtractor {
    llm: Option<Arc<dyn OpenAIClient>>,
    timezone: Tz,
}

impl ContactExtractor {
    pub fn new(llm: Option<Arc<dyn OpenAIClient>>, timezone: Tz) -> Self {
        Self { llm, timezone }
    }

    pub async fn extract(&self, event: &CalendarEvent) -> Extraction {
        let Some(llm) = &self.llm else {
            return fallback(event, ExtractionSource::FallbackOnly);
        };

        let prompt = build_extraction_prompt(event, self.timezone);
        let reply = match llm.generate(&prompt).await {
            Ok(reply) => reply,
            Err(err) => {
                warn!(
                    event_id = %event.id,
                    error = %err,
                    "language model call failed, using fallback"
                );
                return fallback(event, ExtractionSource::ModelCallFailure);
            }
        };

        match parse_model_reply(&reply, event) {
            Some(record) => {
                debug!(event_id = %event.id, "language model extracted contact");
                Extraction {
                    record,
                    source: ExtractionSource::Model,
                }
            }
            None => {
                warn!(
                    event_id = %event.id,
                    "language model reply had no JSON object, using fallback"
                );
                fallback(event, ExtractionSource::ModelParseFailure)
            }
        }
    }
}

fn fallback(event: &CalendarEvent, source: ExtractionSource) -> Extraction {
    let record = fallback_extract(event);
    debug!(
        event_id = %event.id,
        source = source.as_str(),
        has_phone = record.has_phone_number(),
        "fallback extraction finished"
    );
    Extraction { record, source }
}

/// Line-scan extraction over the event description.
pub fn fallback_extract(event: &CalendarEvent) -> ContactRecord {
    let description = event.description_text();
    let mut name = String::new();
    let mut phone_number = String::new();
    let mut reason = String::new();

    for line in description.lines() {
        let lower = line.to_lowercase();
        let value = || {
            line.split_once(':')
                .map(|(_, rest)| rest.trim().to_string())
                .unwrap_or_default()
        };
        if lower.contains("client:") {
            name = value();
        } else if lower.contains("phone:") {
            phone_number = value();
        } else if lower.contains("meeting purpose:") || lower.contains("purpose:") {
            reason = value();
        }
    }

    if reason.is_empty() && description.contains(PURPOSE_PHRASE) {
        if let Some(captures) = PURPOSE_SENTENCE.captures(description) {
            reason = captures[1].trim().to_string();
        }
    }

    ContactRecord {
        name,
        phone_number,
        reason,
        start_time: event.start_time.clone(),
        end_time: event.end_time.clone(),
    }
}

/// Returns the first balanced `{...}` span, skipping braces inside strings.
pub fn find_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_model_reply(reply: &str, event: &CalendarEvent) -> Option<ContactRecord> {
    let candidate = find_json_object(reply)?;
    let object: Map<String, Value> = serde_json::from_str(candidate).ok()?;
    let field = |key: &str| match object.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };

    Some(ContactRecord {
        name: field("name"),
        phone_number: field("phone_number"),
        reason: field("reason"),
        start_time: event.start_time.clone(),
        end_time: event.end_time.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::models::calendar_event::EventTime;
    use async_trait::async_trait;

    struct FakeOpenAI {
        response: std::result::Result<String, String>,
    }

    #[async_trait]
    impl OpenAIClient for FakeOpenAI {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            match &self.response {
                Ok(body) => Ok(body.clone()),
                Err(err) => Err(Error::message(err.clone())),
            }
        }
    }

    fn event(description: &str) -> CalendarEvent {
        CalendarEvent {
            id: "evt-1".to_string(),
            title: "Intro".to_string(),
            description: Some(description.to_string()),
            start_time: Some(EventTime::parse("2026-03-02T10:00:00+02:00").unwrap()),
            end_time: Some(EventTime::parse("2026-03-02T11:00:00+02:00").unwrap()),
            status: Some("confirmed".to_string()),
        }
    }

    fn extractor(response: std::result::Result<&str, &str>) -> ContactExtractor {
        let fake = FakeOpenAI {
            response: response.map(str::to_string).map_err(str::to_string),
        };
        ContactExtractor::new(Some(Arc::new(fake)), chrono_tz::Europe::Kyiv)
    }

    #[test]
    fn fallback_reads_labelled_lines() {
        let record = fallback_extract(&event("Client: Jane Doe\nPhone: +15551234\nPurpose: demo"));
        assert_eq!(record.name, "Jane Doe");
        assert_eq!(record.phone_number, "+15551234");
        assert_eq!(record.reason, "demo");
    }

    #[test]
    fn fallback_labels_are_case_insensitive() {
        let record = fallback_extract(&event("CLIENT: Ann\nphone: 555\nMeeting Purpose: pricing"));
        assert_eq!(record.name, "Ann");
        assert_eq!(record.phone_number, "555");
        assert_eq!(record.reason, "pricing");
    }

    #[test]
    fn fallback_keeps_text_after_first_colon() {
        let record = fallback_extract(&event("Purpose: review: Q3 numbers"));
        assert_eq!(record.reason, "review: Q3 numbers");
    }

    #[test]
    fn fallback_reads_purpose_sentence() {
        let record = fallback_extract(&event(
            "Phone: +1555\nThe purpose of this meeting is to discuss onboarding. Bring notes.",
        ));
        assert_eq!(record.reason, "discuss onboarding");
        assert_eq!(record.phone_number, "+1555");
    }

    #[test]
    fn purpose_line_wins_over_sentence() {
        let record = fallback_extract(&event(
            "Purpose: demo\nThe purpose of this meeting is to discuss onboarding.",
        ));
        assert_eq!(record.reason, "demo");
    }

    #[test]
    fn fallback_defaults_to_empty_fields() {
        let mut source = event("");
        source.description = None;
        let record = fallback_extract(&source);
        assert_eq!(record.name, "");
        assert_eq!(record.phone_number, "");
        assert_eq!(record.reason, "");
        assert_eq!(record.start_time, source.start_time);
    }

    #[test]
    fn find_json_object_skips_prose_and_string_braces() {
        let text = "Sure! {\"name\":\"A {B}\",\"nested\":{\"x\":1}} trailing } text";
        assert_eq!(
            find_json_object(text),
            Some("{\"name\":\"A {B}\",\"nested\":{\"x\":1}}")
        );
        assert_eq!(find_json_object("no json here"), None);
        assert_eq!(find_json_object("{ unterminated"), None);
    }

    #[tokio::test]
    async fn model_reply_is_used_but_times_come_from_event() {
        let source = event("irrelevant");
        let extraction = extractor(Ok(
            "Here you go:\n{\"name\":\"Bob\",\"phone_number\":\"+380501112233\",\"reason\":\"demo\",\"start_time\":\"1999-01-01T00:00:00Z\",\"end_time\":\"bogus\"}",
        ))
        .extract(&source)
        .await;

        assert_eq!(extraction.source, ExtractionSource::Model);
        assert_eq!(extraction.record.name, "Bob");
        assert_eq!(extraction.record.phone_number, "+380501112233");
        assert_eq!(extraction.record.start_time, source.start_time);
        assert_eq!(extraction.record.end_time, source.end_time);
    }

    #[tokio::test]
    async fn numeric_phone_numbers_are_stringified() {
        let extraction = extractor(Ok("{\"name\":\"Bob\",\"phone_number\":15551234}"))
            .extract(&event(""))
            .await;
        assert_eq!(extraction.record.phone_number, "15551234");
        assert_eq!(extraction.record.reason, "");
    }

    #[tokio::test]
    async fn unparseable_reply_falls_back() {
        let extraction = extractor(Ok("I could not find anything."))
            .extract(&event("Client: Jane Doe\nPhone: +15551234"))
            .await;
        assert_eq!(extraction.source, ExtractionSource::ModelParseFailure);
        assert_eq!(extraction.record.phone_number, "+15551234");
    }

    #[tokio::test]
    async fn failed_call_falls_back() {
        let extraction = extractor(Err("rate limited"))
            .extract(&event("Client: Jane Doe\nPhone: +15551234"))
            .await;
        assert_eq!(extraction.source, ExtractionSource::ModelCallFailure);
        assert_eq!(extraction.record.name, "Jane Doe");
    }

    #[tokio::test]
    async fn no_model_means_fallback_only() {
        let extractor = ContactExtractor::new(None, chrono_tz::UTC);
        let extraction = extractor.extract(&event("Phone: 123")).await;
        assert_eq!(extraction.source, ExtractionSource::FallbackOnly);
        assert_eq!(extraction.record.phone_number, "123");
    }
}
