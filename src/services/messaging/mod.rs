pub mod appwrite;
pub mod log;
pub mod twilio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmsRequest {
    pub message_id: String,
    pub content: String,
    pub topics: Vec<String>,
    pub users: Vec<String>,
}

/// Message record returned by the provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SmsMessage {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub provider_message_id: Option<String>,
}

#[async_trait]
pub trait MessagingProvider: Send + Sync {
    async fn create_sms(&self, request: &SmsRequest) -> anyhow::Result<SmsMessage>;
}
