use chrono::{DateTime, Duration, SecondsFormat, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::warn;
use urlencoding::encode;

use crate::config::GoogleSettings;
use crate::error::{Error, Result};
use crate::models::calendar_event::{CalendarEvent, EventTime};

#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct EventsResponse {
    #[serde(default)]
    items: Vec<GoogleEvent>,
}

#[derive(Debug, Deserialize)]
struct GoogleEvent {
    id: String,
    summary: Option<String>,
    description: Option<String>,
    start: Option<EventDateTime>,
    end: Option<EventDateTime>,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventDateTime {
    #[serde(rename = "dateTime")]
    date_time: Option<String>,
}

pub async fn refresh_access_token(
    http: &Client,
    settings: &GoogleSettings,
    now: DateTime<Utc>,
) -> Result<AccessToken> {
    let response = http
        .post(&settings.token_url)
        .form(&[
            ("client_id", settings.client_id.as_str()),
            ("client_secret", settings.client_secret.as_str()),
            ("refresh_token", settings.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ])
        .send()
        .await?;

    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        return Err(Error::auth(format!("{}: {}", status, text)));
    }

    let parsed: TokenResponse = serde_json::from_str(&text)?;
    Ok(AccessToken {
        token: parsed.access_token,
        expires_at: now + Duration::seconds(parsed.expires_in),
    })
}

pub async fn list_events(
    http: &Client,
    settings: &GoogleSettings,
    access_token: &str,
    time_min: DateTime<Utc>,
    time_max: DateTime<Utc>,
    max_results: u32,
) -> Result<Vec<CalendarEvent>> {
    let url = events_url(settings);
    let query = [
        ("timeMin", time_min.to_rfc3339_opts(SecondsFormat::Millis, true)),
        ("timeMax", time_max.to_rfc3339_opts(SecondsFormat::Millis, true)),
        ("maxResults", max_results.to_string()),
        ("singleEvents", "true".to_string()),
        ("orderBy", "startTime".to_string()),
    ];

    let response = http
        .get(&url)
        .bearer_auth(access_token)
        .query(&query)
        .send()
        .await?;

    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        return Err(Error::provider("google-calendar", status.as_u16(), text));
    }

    let parsed: EventsResponse = serde_json::from_str(&text)?;
    Ok(parsed.items.into_iter().map(into_calendar_event).collect())
}

pub async fn get_event(
    http: &Client,
    settings: &GoogleSettings,
    access_token: &str,
    event_id: &str,
) -> Result<CalendarEvent> {
    let url = format!("{}/{}", events_url(settings), encode(event_id));
    let response = http.get(&url).bearer_auth(access_token).send().await?;

    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        return Err(Error::provider("google-calendar", status.as_u16(), text));
    }

    let parsed: GoogleEvent = serde_json::from_str(&text)?;
    Ok(into_calendar_event(parsed))
}

/// Calendar ids routinely contain `@` and `#`, so each path segment is encoded.
fn events_url(settings: &GoogleSettings) -> String {
    format!(
        "{}/calendars/{}/events",
        settings.api_base,
        encode(&settings.calendar_id)
    )
}

fn into_calendar_event(event: GoogleEvent) -> CalendarEvent {
    let start_time = parse_instant(&event.id, event.start);
    let end_time = parse_instant(&event.id, event.end);
    CalendarEvent {
        id: event.id,
        title: event.summary.unwrap_or_default(),
        description: event.description,
        start_time,
        end_time,
        status: event.status,
    }
}

fn parse_instant(event_id: &str, value: Option<EventDateTime>) -> Option<EventTime> {
    let raw = value?.date_time?;
    match EventTime::parse(&raw) {
        Ok(time) => Some(time),
        Err(err) => {
            warn!(event_id, raw = %raw, error = %err, "unparseable event timestamp");
            None
        }
    }
}
