use anyhow::Context;
use async_trait::async_trait;

use super::{MessagingProvider, SmsMessage, SmsRequest};

pub struct AppwriteMessagingProvider {
    endpoint: String,
    project_id: String,
    api_key: String,
    client: reqwest::Client,
}

impl AppwriteMessagingProvider {
    pub fn new(endpoint: String, project_id: String, api_key: String) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            project_id,
            api_key,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl MessagingProvider for AppwriteMessagingProvider {
    async fn create_sms(&self, request: &SmsRequest) -> anyhow::Result<SmsMessage> {
        let url = format!("{}/messaging/messages/sms", self.endpoint);

        let resp = self
            .client
            .post(&url)
            .header("X-Appwrite-Project", &self.project_id)
            .header("X-Appwrite-Key", &self.api_key)
            .json(request)
            .send()
            .await
            .context("failed to call Appwrite createSms")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Appwrite createSms error ({status}): {body}");
        }

        resp.json()
            .await
            .context("failed to parse Appwrite createSms response")
    }
}
