use async_trait::async_trait;
use reqwest::Client;

use crate::clients::openai_client;
use crate::config::LlmSettings;
use crate::error::Result;

#[async_trait]
pub trait OpenAIClient: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

pub struct OpenAIService {
    http: Client,
    settings: LlmSettings,
}

impl OpenAIService {
    pub fn new(http: Client, settings: LlmSettings) -> Self {
        Self { http, settings }
    }

    fn system_prompt(&self) -> &str {
        self.settings
            .system_prompt
            .as_deref()
            .unwrap_or(openai_client::DEFAULT_SYSTEM_PROMPT)
    }
}

#[async_trait]
impl OpenAIClient for OpenAIService {
    async fn generate(&self, prompt: &str) -> Result<String> {
        openai_client::query_chat(&self.http, &self.settings, self.system_prompt(), prompt).await
    }
}
