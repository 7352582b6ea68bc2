use async_trait::async_trait;

use super::{MessagingProvider, SmsMessage, SmsRequest};

/// Development provider: writes messages to the log instead of sending them.
pub struct LogSmsProvider;

#[async_trait]
impl MessagingProvider for LogSmsProvider {
    async fn create_sms(&self, request: &SmsRequest) -> anyhow::Result<SmsMessage> {
        tracing::info!(
            message_id = %request.message_id,
            users = ?request.users,
            content = %request.content,
            "SMS (not sent, log provider)"
        );
        Ok(SmsMessage {
            id: request.message_id.clone(),
            status: "logged".to_string(),
            provider_message_id: None,
        })
    }
}
