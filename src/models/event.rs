use serde::{Deserialize, Serialize};

/// Live update pushed to admin dashboards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AdminEvent {
    AppointmentCreated { appointment_id: String },
    AppointmentUpdated { appointment_id: String, status: String },
    NotificationSent { notification_id: String, user_id: String },
    NotificationFailed { notification_id: String, user_id: String, error: String },
}

impl AdminEvent {
    pub fn name(&self) -> &'static str {
        match self {
            AdminEvent::AppointmentCreated { .. } => "appointment_created",
            AdminEvent::AppointmentUpdated { .. } => "appointment_updated",
            AdminEvent::NotificationSent { .. } => "notification_sent",
            AdminEvent::NotificationFailed { .. } => "notification_failed",
        }
    }
}
