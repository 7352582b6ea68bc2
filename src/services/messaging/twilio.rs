use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;

use super::{MessagingProvider, SmsMessage, SmsRequest};
use crate::store::DocumentStore;

/// Sends through Twilio. Target user ids are resolved to phone numbers from
/// the users collection; topics are not supported.
pub struct TwilioSmsProvider {
    account_sid: String,
    auth_token: String,
    from_number: String,
    status_callback: Option<String>,
    store: Arc<dyn DocumentStore>,
    users_collection: String,
    client: reqwest::Client,
}

impl TwilioSmsProvider {
    pub fn new(
        account_sid: String,
        auth_token: String,
        from_number: String,
        store: Arc<dyn DocumentStore>,
        users_collection: String,
    ) -> Self {
        Self {
            account_sid,
            auth_token,
            from_number,
            status_callback: None,
            store,
            users_collection,
            client: reqwest::Client::new(),
        }
    }

    /// Twilio posts delivery updates to this URL.
    pub fn with_status_callback(mut self, url: String) -> Self {
        self.status_callback = Some(url);
        self
    }

    async fn phone_for(&self, user_id: &str) -> anyhow::Result<String> {
        let user = self
            .store
            .get_document(&self.users_collection, user_id)
            .await?
            .with_context(|| format!("no user {user_id} to send SMS to"))?;
        user.get_str("phone")
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .with_context(|| format!("user {user_id} has no phone number"))
    }
}

#[async_trait]
impl MessagingProvider for TwilioSmsProvider {
    async fn create_sms(&self, request: &SmsRequest) -> anyhow::Result<SmsMessage> {
        if !request.topics.is_empty() {
            tracing::warn!(topics = ?request.topics, "Twilio provider ignores SMS topics");
        }
        anyhow::ensure!(!request.users.is_empty(), "SMS has no recipients");

        let url = format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            self.account_sid
        );

        let mut last_sid = None;
        let mut last_status = String::new();
        for user_id in &request.users {
            let to = self.phone_for(user_id).await?;

            let mut form = vec![
                ("To", to.as_str()),
                ("From", self.from_number.as_str()),
                ("Body", request.content.as_str()),
            ];
            if let Some(callback) = &self.status_callback {
                form.push(("StatusCallback", callback.as_str()));
            }

            let data: serde_json::Value = self
                .client
                .post(&url)
                .basic_auth(&self.account_sid, Some(&self.auth_token))
                .form(&form)
                .send()
                .await
                .context("failed to send Twilio SMS")?
                .error_for_status()
                .context("Twilio API returned error")?
                .json()
                .await
                .context("failed to parse Twilio response")?;

            last_sid = data["sid"].as_str().map(str::to_string);
            last_status = data["status"].as_str().unwrap_or("queued").to_string();
        }

        Ok(SmsMessage {
            id: request.message_id.clone(),
            status: last_status,
            provider_message_id: last_sid,
        })
    }
}
