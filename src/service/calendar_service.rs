use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::clients::google_calendar_client::{self, AccessToken};
use crate::config::GoogleSettings;
use crate::error::Result;
use crate::models::calendar_event::CalendarEvent;

pub const LOOKAHEAD_HOURS: i64 = 24;
pub const MAX_RESULTS: u32 = 10;

/// Tokens are refreshed this long before the provider says they expire.
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;

#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// Events starting in `[now, now + 24h]`, ordered by start time.
    async fn list_upcoming(&self, now: DateTime<Utc>) -> Result<Vec<CalendarEvent>>;

    async fn get_event(&self, event_id: &str) -> Result<CalendarEvent>;
}

pub struct GoogleCalendarService {
    http: Client,
    settings: GoogleSettings,
    token: Mutex<Option<AccessToken>>,
}

impl GoogleCalendarService {
    pub fn new(http: Client, settings: GoogleSettings) -> Self {
        Self {
            http,
            settings,
            token: Mutex::new(None),
        }
    }

    async fn access_token(&self) -> Result<String> {
        let now = Utc::now();
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at - Duration::seconds(TOKEN_EXPIRY_MARGIN_SECS) > now {
                return Ok(token.token.clone());
            }
        }
        debug!("refreshing calendar access token");
        let fresh =
            google_calendar_client::refresh_access_token(&self.http, &self.settings, now).await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }
}

#[async_trait]
impl CalendarProvider for GoogleCalendarService {
    async fn list_upcoming(&self, now: DateTime<Utc>) -> Result<Vec<CalendarEvent>> {
        let token = self.access_token().await?;
        let events = google_calendar_client::list_events(
            &self.http,
            &self.settings,
            &token,
            now,
            now + Duration::hours(LOOKAHEAD_HOURS),
            MAX_RESULTS,
        )
        .await?;
        info!(count = events.len(), "fetched upcoming calendar events");
        Ok(events)
    }

    async fn get_event(&self, event_id: &str) -> Result<CalendarEvent> {
        let token = self.access_token().await?;
        google_calendar_client::get_event(&self.http, &self.settings, &token, event_id).await
    }
}
