use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event, Sse};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use super::check_auth;
use crate::errors::AppError;
use crate::forms::catalog::{self, AppointmentForm};
use crate::forms::{FormSubmission, IntakeRecord, Submitted};
use crate::models::{
    Appointment, AppointmentListSummary, AppointmentPatch, AppointmentStatus, Notification,
    UpdateAppointmentParams, UpdateKind,
};
use crate::services::datetime::parse_time_zone;
use crate::services::messaging::SmsMessage;
use crate::services::{appointments, notifications};
use crate::state::AppState;

const ADMIN_PATH: &str = "/admin";

// GET /api/admin/appointments
pub async fn get_appointments(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<AppointmentListSummary>, AppError> {
    check_auth(&headers, &state.config.admin_passkey)?;
    Ok(Json(appointments::get_recent_appointment_list(&state).await?))
}

#[derive(Serialize)]
pub struct AppointmentUpdated {
    appointment: Appointment,
}

// POST /api/admin/appointments/:id/schedule
pub async fn schedule_appointment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<Map<String, Value>>,
) -> Result<Json<Submitted<AppointmentUpdated>>, AppError> {
    check_auth(&headers, &state.config.admin_passkey)?;
    update(state, id, body, UpdateKind::Schedule).await
}

// POST /api/admin/appointments/:id/cancel
pub async fn cancel_appointment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<Map<String, Value>>,
) -> Result<Json<Submitted<AppointmentUpdated>>, AppError> {
    check_auth(&headers, &state.config.admin_passkey)?;
    update(state, id, body, UpdateKind::Cancel).await
}

async fn update(
    state: Arc<AppState>,
    appointment_id: String,
    body: Map<String, Value>,
    kind: UpdateKind,
) -> Result<Json<Submitted<AppointmentUpdated>>, AppError> {
    let time_zone = parse_time_zone(body.get("timeZone").and_then(Value::as_str).unwrap_or("UTC"))?;
    let form = catalog::appointment_form(match kind {
        UpdateKind::Schedule => AppointmentForm::Schedule,
        UpdateKind::Cancel => AppointmentForm::Cancel,
    });
    let mut submission = FormSubmission::new(&form);

    let submitted = submission
        .submit(&body, |record| async move {
            let current = appointments::get_appointment(&state, &appointment_id).await?;
            let params = UpdateAppointmentParams {
                appointment_id,
                user_id: current.user_id,
                appointment: patch_for(kind, &record),
                kind,
                time_zone,
            };
            let appointment = appointments::update_appointment(&state, params).await?;
            Ok((AppointmentUpdated { appointment }, ADMIN_PATH.to_string()))
        })
        .await?;

    Ok(Json(submitted))
}

fn patch_for(kind: UpdateKind, record: &IntakeRecord) -> AppointmentPatch {
    match kind {
        UpdateKind::Schedule => AppointmentPatch {
            schedule: record.date("schedule"),
            status: Some(AppointmentStatus::Scheduled),
            primary_physician: record.text("primaryPhysician").map(str::to_string),
            cancellation_reason: None,
        },
        UpdateKind::Cancel => AppointmentPatch {
            status: Some(AppointmentStatus::Cancelled),
            cancellation_reason: record.text("cancellationReason").map(str::to_string),
            ..Default::default()
        },
    }
}

// GET /api/admin/notifications
#[derive(Deserialize)]
pub struct NotificationsQuery {
    pub limit: Option<usize>,
}

pub async fn get_notifications(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<NotificationsQuery>,
) -> Result<Json<Vec<Notification>>, AppError> {
    check_auth(&headers, &state.config.admin_passkey)?;

    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    let list = notifications::list_notifications(
        state.store.as_ref(),
        &state.config.collections.notifications,
        limit,
    )
    .await?;
    Ok(Json(list))
}

// POST /api/admin/sms
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendSmsRequest {
    pub user_id: String,
    pub content: String,
}

pub async fn send_sms(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<SendSmsRequest>,
) -> Result<Json<SmsMessage>, AppError> {
    check_auth(&headers, &state.config.admin_passkey)?;

    let content = req.content.trim();
    if req.user_id.trim().is_empty() || content.is_empty() {
        return Err(AppError::BadRequest("userId and content are required".to_string()));
    }

    let message =
        notifications::send_sms_notification(state.messaging.as_ref(), req.user_id.trim(), content)
            .await?;
    Ok(Json(message))
}

// GET /api/admin/events (SSE)
#[derive(Deserialize)]
pub struct SseQuery {
    pub token: Option<String>,
}

pub async fn events_stream(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SseQuery>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>, AppError> {
    // EventSource can't set headers, so the passkey comes in the query string.
    let token = query.token.as_deref().unwrap_or("");
    if token.is_empty() || token != state.config.admin_passkey {
        return Err(AppError::Unauthorized);
    }

    let rx = state.events_tx.subscribe();

    let live_stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(event) => {
            let data = serde_json::to_string(&event).unwrap_or_default();
            Some(Ok(Event::default().data(data).event(event.name())))
        }
        Err(tokio_stream::wrappers::errors::BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(skipped, "admin event stream lagged");
            None
        }
    });

    let keepalive_stream = tokio_stream::StreamExt::map(
        tokio_stream::wrappers::IntervalStream::new(tokio::time::interval(Duration::from_secs(30))),
        |_| Ok(Event::default().comment("keepalive")),
    );

    Ok(Sse::new(StreamExt::merge(live_stream, keepalive_stream)))
}
