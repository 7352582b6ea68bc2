pub mod admin;
pub mod appointments;
pub mod files;
pub mod forms;
pub mod health;
pub mod patients;
pub mod webhook;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::Router;

use crate::errors::AppError;
use crate::state::AppState;

/// Identification uploads arrive base64-encoded inside the JSON body.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/forms/:name", get(forms::get_form))
        .route("/api/users", post(patients::create_user))
        .route("/api/users/:user_id", get(patients::get_user))
        .route(
            "/api/patients/:user_id/register",
            post(patients::register_patient),
        )
        .route("/api/patients/:user_id", get(patients::get_patient))
        .route(
            "/api/patients/:user_id/appointments",
            post(appointments::create_appointment),
        )
        .route("/api/appointments/:id", get(appointments::get_appointment))
        .route("/api/files/:id", get(files::download_file))
        .route("/api/admin/appointments", get(admin::get_appointments))
        .route(
            "/api/admin/appointments/:id/schedule",
            post(admin::schedule_appointment),
        )
        .route(
            "/api/admin/appointments/:id/cancel",
            post(admin::cancel_appointment),
        )
        .route("/api/admin/notifications", get(admin::get_notifications))
        .route("/api/admin/sms", post(admin::send_sms))
        .route("/api/admin/events", get(admin::events_stream))
        .route("/webhook/sms/status", post(webhook::sms_status_callback))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

pub(crate) fn check_auth(headers: &HeaderMap, passkey: &str) -> Result<(), AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if token.is_empty() || token != passkey {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}
