use chrono_tz::Tz;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::LlmSettings;
use crate::error::{Error, Result};
use crate::models::calendar_event::{CalendarEvent, EventTime};

const TEMPERATURE: f32 = 0.7;
const MAX_TOKENS: u32 = 1000;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a client relationship manager preparing scheduled \
outbound calls for a technology company. You read calendar event details and identify who should \
be called, on which number, and why. Never invent or assume details that are not present in the \
event. When asked for structured data, reply with a single JSON object and nothing else.";

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: Option<String>,
}

/// Builds the per-event user prompt asking for the contact JSON object.
pub fn build_extraction_prompt(event: &CalendarEvent, timezone: Tz) -> String {
    let local = |time: &Option<EventTime>| match time {
        Some(t) => t.instant.with_timezone(&timezone).to_rfc3339(),
        None => "unknown".to_string(),
    };
    let start = local(&event.start_time);
    let end = local(&event.end_time);

    format!(
        "You are about to call a client on behalf of our company.\n\
         Event details:\n\
         - Event Title: {title}\n\
         - Start Time: {start} ({timezone} time)\n\
         - End Time: {end} ({timezone} time)\n\
         - Description: {description}\n\
         Task: extract the client's name, phone number and the purpose of the meeting from the description.\n\
         Rules:\n\
         - Use an empty string for any field you cannot find.\n\
         - Keep the phone number exactly as written, including any leading +.\n\
         - Output ONLY raw JSON, no prose, markdown, or code fences.\n\
         - The JSON shape must be exactly:\n\
         {{\"name\":\"<string>\",\"phone_number\":\"<string>\",\"reason\":\"<string>\",\"start_time\":\"{start}\",\"end_time\":\"{end}\"}}",
        title = event.title,
        start = start,
        end = end,
        timezone = timezone.name(),
        description = event.description_text(),
    )
}

/// Single-turn chat completion against an OpenAI-compatible endpoint.
pub async fn query_chat(
    http: &Client,
    settings: &LlmSettings,
    system_message: &str,
    prompt: &str,
) -> Result<String> {
    let request = ChatRequest {
        model: settings.model.clone(),
        messages: vec![
            ChatMessage {
                role: "system".to_string(),
                content: system_message.to_string(),
            },
            ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            },
        ],
        max_tokens: MAX_TOKENS,
        temperature: TEMPERATURE,
    };

    let response = http
        .post(format!("{}/chat/completions", settings.api_base))
        .bearer_auth(&settings.api_key)
        .json(&request)
        .send()
        .await?;

    let status = response.status();
    let text = response.text().await?; // read the body once

    if !status.is_success() {
        return Err(Error::provider("openrouter", status.as_u16(), text));
    }

    let parsed: ChatResponse = serde_json::from_str(&text)?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| Error::message("No response from language model"))
}
