use std::collections::HashMap;
use std::env;
use std::fs;
use std::time::Duration;

use chrono_tz::Tz;

use crate::error::{Error, Result};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_CALENDAR_ID: &str = "primary";
pub const DEFAULT_LLM_MODEL: &str = "openai/gpt-4.1";
pub const DEFAULT_TIMEZONE: &str = "Europe/Kyiv";
pub const DEFAULT_GOOGLE_API_BASE: &str = "https://www.googleapis.com/calendar/v3";
pub const DEFAULT_GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_OPENROUTER_API_BASE: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_RETELL_API_BASE: &str = "https://api.retellai.com";

const DEFAULT_POLL_INTERVAL_SECS: u64 = 5 * 60;
const DEFAULT_STARTUP_DELAY_SECS: u64 = 5;
const DEFAULT_KEEP_ALIVE_INTERVAL_SECS: u64 = 14 * 60;

/// Raw key/value pairs read from an env-style file.
#[derive(Debug, Default, Clone)]
pub struct AppConfig {
    values: HashMap<String, String>,
}

impl AppConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let mut values = HashMap::new();
        for (idx, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
            let Some((key, value)) = trimmed.split_once('=') else {
                return Err(Error::message(format!(
                    "Invalid config line {}: {}",
                    idx + 1,
                    line
                )));
            };
            let key = key.trim();
            let mut value = value.trim().to_string();
            if value.len() >= 2
                && ((value.starts_with('"') && value.ends_with('"'))
                    || (value.starts_with('\'') && value.ends_with('\'')))
            {
                value = value[1..value.len() - 1].to_string();
            }
            values.insert(key.to_string(), value);
        }
        Ok(Self { values })
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    /// File values win over the process environment.
    pub fn get_or_env(&self, key: &str) -> Option<String> {
        self.get(key).or_else(|| env::var(key).ok())
    }
}

#[derive(Debug, Clone)]
pub struct GoogleSettings {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub calendar_id: String,
    pub api_base: String,
    pub token_url: String,
}

#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub api_key: String,
    pub model: String,
    pub api_base: String,
    pub system_prompt: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RetellSettings {
    pub api_key: String,
    pub agent_id: String,
    pub from_number: String,
    pub api_base: String,
}

/// Typed settings handed to every collaborator at construction time.
#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    pub app_url: Option<String>,
    pub google: GoogleSettings,
    /// `None` runs extraction in fallback-only mode.
    pub llm: Option<LlmSettings>,
    pub retell: RetellSettings,
    pub poll_interval: Duration,
    pub startup_delay: Duration,
    pub keep_alive_interval: Duration,
    pub timezone: Tz,
    pub dispatch_dedup: bool,
}

impl Settings {
    pub fn load() -> Result<Self> {
        let config = match env::var("CONFIG_FILE") {
            Ok(path) => AppConfig::from_file(&path)?,
            Err(_) => AppConfig::default(),
        };
        Self::from_lookup(|key| config.get_or_env(key))
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| optional(key).ok_or_else(|| Error::missing_config(key));
        let or_default = |key: &str, default: &str| optional(key).unwrap_or(default.to_string());

        let google = GoogleSettings {
            client_id: required("GOOGLE_CLIENT_ID")?,
            client_secret: required("GOOGLE_CLIENT_SECRET")?,
            refresh_token: required("GOOGLE_REFRESH_TOKEN")?,
            calendar_id: or_default("GOOGLE_CALENDAR_ID", DEFAULT_CALENDAR_ID),
            api_base: or_default("GOOGLE_API_BASE", DEFAULT_GOOGLE_API_BASE),
            token_url: or_default("GOOGLE_TOKEN_URL", DEFAULT_GOOGLE_TOKEN_URL),
        };

        let system_prompt = match optional("LLM_SYSTEM_PROMPT_FILE") {
            Some(path) => Some(fs::read_to_string(path)?),
            None => None,
        };
        let llm = optional("OPENROUTER_API_KEY").map(|api_key| LlmSettings {
            api_key,
            model: or_default("LLM_MODEL", DEFAULT_LLM_MODEL),
            api_base: or_default("OPENROUTER_API_BASE", DEFAULT_OPENROUTER_API_BASE),
            system_prompt,
        });

        let retell = RetellSettings {
            api_key: required("RETELL_API_KEY")?,
            agent_id: required("RETELL_AGENT_ID")?,
            from_number: required("FROM_PHONE_NUMBER")?,
            api_base: or_default("RETELL_API_BASE", DEFAULT_RETELL_API_BASE),
        };

        let timezone_name = or_default("CALL_TIMEZONE", DEFAULT_TIMEZONE);
        let timezone: Tz = timezone_name
            .parse()
            .map_err(|_| Error::invalid_config("CALL_TIMEZONE", &timezone_name))?;

        Ok(Self {
            port: parse_or("PORT", optional("PORT"), DEFAULT_PORT)?,
            app_url: optional("APP_URL").map(|url| url.trim_end_matches('/').to_string()),
            google,
            llm,
            retell,
            poll_interval: Duration::from_secs(parse_or(
                "POLL_INTERVAL_SECS",
                optional("POLL_INTERVAL_SECS"),
                DEFAULT_POLL_INTERVAL_SECS,
            )?),
            startup_delay: Duration::from_secs(parse_or(
                "STARTUP_DELAY_SECS",
                optional("STARTUP_DELAY_SECS"),
                DEFAULT_STARTUP_DELAY_SECS,
            )?),
            keep_alive_interval: Duration::from_secs(parse_or(
                "KEEP_ALIVE_INTERVAL_SECS",
                optional("KEEP_ALIVE_INTERVAL_SECS"),
                DEFAULT_KEEP_ALIVE_INTERVAL_SECS,
            )?),
            timezone,
            dispatch_dedup: parse_or("DISPATCH_DEDUP", optional("DISPATCH_DEDUP"), true)?,
        })
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T> {
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| Error::invalid_config(key, value)),
        None => Ok(default),
    }
}
