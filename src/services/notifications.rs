//! SMS outbox: appointment updates enqueue messages here and return at once;
//! a worker delivers them with retries and records each outcome in the
//! notifications collection.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map, Value};
use tokio::sync::{broadcast, mpsc};

use super::messaging::{MessagingProvider, SmsMessage, SmsRequest};
use crate::errors::AppError;
use crate::models::{AdminEvent, Notification, NotificationStatus};
use crate::store::{unique_id, DocumentStore, Query};

#[derive(Debug, Clone, PartialEq)]
pub struct OutboundSms {
    pub user_id: String,
    pub content: String,
}

#[derive(Clone)]
pub struct NotificationQueue {
    tx: mpsc::Sender<OutboundSms>,
}

impl NotificationQueue {
    /// Never waits. Returns false when the job was dropped.
    pub fn enqueue(&self, sms: OutboundSms) -> bool {
        match self.tx.try_send(sms) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(sms)) => {
                tracing::error!(user_id = %sms.user_id, "notification queue full, SMS dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(sms)) => {
                tracing::error!(user_id = %sms.user_id, "notification worker stopped, SMS dropped");
                false
            }
        }
    }
}

pub fn notification_channel(capacity: usize) -> (NotificationQueue, mpsc::Receiver<OutboundSms>) {
    let (tx, rx) = mpsc::channel(capacity);
    (NotificationQueue { tx }, rx)
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// Sends one SMS to a single user.
pub async fn send_sms_notification(
    messaging: &dyn MessagingProvider,
    user_id: &str,
    content: &str,
) -> Result<SmsMessage, AppError> {
    let request = SmsRequest {
        message_id: unique_id(),
        content: content.to_string(),
        topics: Vec::new(),
        users: vec![user_id.to_string()],
    };
    messaging.create_sms(&request).await.map_err(|e| {
        tracing::error!(user_id, error = %e, "sendSMSNotification failed");
        AppError::Messaging(e)
    })
}

pub struct NotificationWorker {
    rx: mpsc::Receiver<OutboundSms>,
    store: Arc<dyn DocumentStore>,
    messaging: Arc<dyn MessagingProvider>,
    events_tx: broadcast::Sender<AdminEvent>,
    collection: String,
    retry: RetryPolicy,
}

impl NotificationWorker {
    pub fn new(
        rx: mpsc::Receiver<OutboundSms>,
        store: Arc<dyn DocumentStore>,
        messaging: Arc<dyn MessagingProvider>,
        events_tx: broadcast::Sender<AdminEvent>,
        collection: String,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            rx,
            store,
            messaging,
            events_tx,
            collection,
            retry,
        }
    }

    /// Runs until every queue handle is dropped.
    pub async fn run(mut self) {
        tracing::info!("notification worker started");
        while let Some(sms) = self.rx.recv().await {
            self.deliver(sms).await;
        }
        tracing::info!("notification worker stopped");
    }

    /// Delivers whatever is queued right now, then returns.
    pub async fn process_pending(&mut self) -> usize {
        let mut delivered = 0;
        while let Ok(sms) = self.rx.try_recv() {
            self.deliver(sms).await;
            delivered += 1;
        }
        delivered
    }

    async fn deliver(&self, sms: OutboundSms) {
        let notification_id = unique_id();
        let record = data(json!({
            "userId": sms.user_id,
            "content": sms.content,
            "status": NotificationStatus::Pending.as_str(),
            "attempts": 0,
        }));
        let recorded = match self
            .store
            .create_document(&self.collection, &notification_id, record)
            .await
        {
            Ok(_) => true,
            Err(e) => {
                tracing::error!(error = %e, "failed to record notification");
                false
            }
        };

        let mut attempts = 0;
        let outcome = loop {
            attempts += 1;
            match send_sms_notification(self.messaging.as_ref(), &sms.user_id, &sms.content).await {
                Ok(message) => break Ok(message),
                Err(e) if attempts >= self.retry.max_attempts => break Err(e),
                Err(e) => {
                    tracing::warn!(attempts, error = %e, "SMS attempt failed, retrying");
                    tokio::time::sleep(self.retry.delay_after(attempts)).await;
                }
            }
        };

        let (patch, event) = match outcome {
            Ok(message) => {
                tracing::info!(notification_id = %notification_id, user_id = %sms.user_id, "SMS sent");
                let provider_id = message.provider_message_id.unwrap_or(message.id);
                (
                    data(json!({
                        "status": NotificationStatus::Sent.as_str(),
                        "attempts": attempts,
                        "providerMessageId": provider_id,
                    })),
                    AdminEvent::NotificationSent {
                        notification_id: notification_id.clone(),
                        user_id: sms.user_id.clone(),
                    },
                )
            }
            Err(e) => {
                tracing::error!(notification_id = %notification_id, attempts, error = %e, "SMS delivery gave up");
                (
                    data(json!({
                        "status": NotificationStatus::Failed.as_str(),
                        "attempts": attempts,
                        "lastError": e.to_string(),
                    })),
                    AdminEvent::NotificationFailed {
                        notification_id: notification_id.clone(),
                        user_id: sms.user_id.clone(),
                        error: e.to_string(),
                    },
                )
            }
        };

        if recorded {
            if let Err(e) = self
                .store
                .update_document(&self.collection, &notification_id, patch)
                .await
            {
                tracing::error!(error = %e, "failed to update notification outcome");
            }
        }

        // No subscribers is fine.
        let _ = self.events_tx.send(event);
    }
}

pub async fn list_notifications(
    store: &dyn DocumentStore,
    collection: &str,
    limit: usize,
) -> Result<Vec<Notification>, AppError> {
    let list = store
        .list_documents(collection, &[Query::order_desc("$createdAt"), Query::Limit(limit)])
        .await
        .map_err(AppError::Store)?;

    list.documents
        .into_iter()
        .map(|doc| Notification::try_from(doc).map_err(AppError::Store))
        .collect()
}

/// Applies a provider delivery report. Returns false if no notification carries that id.
pub async fn record_delivery_status(
    store: &dyn DocumentStore,
    collection: &str,
    provider_message_id: &str,
    delivery_status: &str,
) -> Result<bool, AppError> {
    let list = store
        .list_documents(
            collection,
            &[Query::equal("providerMessageId", provider_message_id), Query::Limit(1)],
        )
        .await
        .map_err(AppError::Store)?;

    let Some(doc) = list.documents.into_iter().next() else {
        return Ok(false);
    };

    let updated = store
        .update_document(collection, &doc.id, data(json!({ "deliveryStatus": delivery_status })))
        .await
        .map_err(AppError::Store)?;
    Ok(updated.is_some())
}

fn data(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
