use std::sync::Arc;

use tokio::sync::broadcast;

use crate::config::AppConfig;
use crate::models::AdminEvent;
use crate::services::messaging::MessagingProvider;
use crate::services::notifications::NotificationQueue;
use crate::store::{DocumentStore, FileStorage};

pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn DocumentStore>,
    pub files: Arc<dyn FileStorage>,
    pub messaging: Arc<dyn MessagingProvider>,
    pub notifications: NotificationQueue,
    pub events_tx: broadcast::Sender<AdminEvent>,
}
