use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::Client;

use crate::clients::retell_client::{self, CallInfo};
use crate::config::RetellSettings;
use crate::error::Result;

#[async_trait]
pub trait VoiceCallProvider: Send + Sync {
    async fn create_call(
        &self,
        to_number: &str,
        variables: &BTreeMap<String, String>,
    ) -> Result<CallInfo>;

    async fn call_status(&self, call_id: &str) -> Result<CallInfo>;
}

pub struct RetellService {
    http: Client,
    settings: RetellSettings,
}

impl RetellService {
    pub fn new(http: Client, settings: RetellSettings) -> Self {
        Self { http, settings }
    }
}

#[async_trait]
impl VoiceCallProvider for RetellService {
    async fn create_call(
        &self,
        to_number: &str,
        variables: &BTreeMap<String, String>,
    ) -> Result<CallInfo> {
        retell_client::create_phone_call(&self.http, &self.settings, to_number, variables).await
    }

    async fn call_status(&self, call_id: &str) -> Result<CallInfo> {
        retell_client::get_call(&self.http, &self.settings, call_id).await
    }
}
