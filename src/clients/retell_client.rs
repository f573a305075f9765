use std::collections::BTreeMap;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use urlencoding::encode;

use crate::config::RetellSettings;
use crate::error::{Error, Result};

#[derive(Debug, Serialize)]
struct CreateCallRequest<'a> {
    from_number: &'a str,
    to_number: &'a str,
    retell_llm_dynamic_variables: &'a BTreeMap<String, String>,
    override_agent_id: &'a str,
}

/// Subset of the provider's call object this service reads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallInfo {
    pub call_id: String,
    #[serde(default)]
    pub call_status: Option<String>,
    #[serde(default)]
    pub to_number: Option<String>,
    #[serde(default)]
    pub disconnection_reason: Option<String>,
}

pub async fn create_phone_call(
    http: &Client,
    settings: &RetellSettings,
    to_number: &str,
    variables: &BTreeMap<String, String>,
) -> Result<CallInfo> {
    let request = CreateCallRequest {
        from_number: &settings.from_number,
        to_number,
        retell_llm_dynamic_variables: variables,
        override_agent_id: &settings.agent_id,
    };

    let response = http
        .post(format!("{}/v2/create-phone-call", settings.api_base))
        .bearer_auth(&settings.api_key)
        .json(&request)
        .send()
        .await?;

    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        return Err(Error::provider("retell", status.as_u16(), text));
    }
    Ok(serde_json::from_str(&text)?)
}

pub async fn get_call(http: &Client, settings: &RetellSettings, call_id: &str) -> Result<CallInfo> {
    let response = http
        .get(format!("{}/v2/call/{}", settings.api_base, encode(call_id)))
        .bearer_auth(&settings.api_key)
        .send()
        .await?;

    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        return Err(Error::provider("retell", status.as_u16(), text));
    }
    Ok(serde_json::from_str(&text)?)
}
