use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde_json::{json, Map, Value};

use super::datetime::format_date_time;
use super::notifications::OutboundSms;
use super::store_error;
use crate::errors::AppError;
use crate::models::{
    AdminEvent, Appointment, AppointmentListSummary, AppointmentStatus, UpdateAppointmentParams,
    UpdateKind,
};
use crate::state::AppState;
use crate::store::{unique_id, Query};

#[derive(Debug, Clone)]
pub struct CreateAppointmentParams {
    pub user_id: String,
    pub patient_id: Option<String>,
    pub primary_physician: String,
    pub schedule: DateTime<Utc>,
    pub reason: String,
    pub note: Option<String>,
}

/// New appointments start out pending until an admin schedules them.
pub async fn create_appointment(
    state: &AppState,
    params: CreateAppointmentParams,
) -> Result<Appointment, AppError> {
    let data = match json!({
        "userId": params.user_id,
        "patient": params.patient_id,
        "primaryPhysician": params.primary_physician,
        "schedule": params.schedule,
        "reason": params.reason,
        "note": params.note,
        "status": AppointmentStatus::Pending,
    }) {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    let doc = state
        .store
        .create_document(&state.config.collections.appointments, &unique_id(), data)
        .await
        .map_err(store_error("createAppointment"))?;
    let appointment = Appointment::try_from(doc).map_err(store_error("createAppointment"))?;

    tracing::info!(appointment_id = %appointment.id, user_id = %appointment.user_id, "appointment requested");
    let _ = state.events_tx.send(AdminEvent::AppointmentCreated {
        appointment_id: appointment.id.clone(),
    });
    Ok(appointment)
}

pub async fn get_appointment(state: &AppState, appointment_id: &str) -> Result<Appointment, AppError> {
    let doc = state
        .store
        .get_document(&state.config.collections.appointments, appointment_id)
        .await
        .map_err(store_error("getAppointment"))?
        .ok_or_else(|| AppError::NotFound(format!("appointment {appointment_id}")))?;

    Appointment::try_from(doc).map_err(store_error("getAppointment"))
}

/// Lists every appointment, newest first, with per-status counts. Pages with a
/// cursor so documents created mid-walk cannot shift later pages; the walk
/// covers exactly the documents counted by the first page's total.
pub async fn get_recent_appointment_list(state: &AppState) -> Result<AppointmentListSummary, AppError> {
    let page_size = state.config.list_page_size;
    let mut appointments = Vec::new();
    let mut snapshot = None;
    let mut cursor: Option<String> = None;

    let total = loop {
        let mut queries = vec![Query::order_desc("$createdAt"), Query::Limit(page_size)];
        if let Some(id) = cursor.take() {
            queries.push(Query::CursorAfter(id));
        }
        let page = state
            .store
            .list_documents(&state.config.collections.appointments, &queries)
            .await
            .map_err(store_error("getRecentAppointmentList"))?;

        let total = *snapshot.get_or_insert(page.total);
        let fetched = page.documents.len();
        cursor = page.documents.last().map(|doc| doc.id.clone());
        for doc in page.documents {
            appointments.push(Appointment::try_from(doc).map_err(store_error("getRecentAppointmentList"))?);
        }

        if fetched < page_size || appointments.len() >= total {
            break total;
        }
    };

    let summary = summarize(total, appointments);
    tracing::debug!(
        total = summary.total_count,
        scheduled = summary.scheduled_count,
        pending = summary.pending_count,
        cancelled = summary.cancelled_count,
        "appointment counts"
    );
    Ok(summary)
}

/// Counts each appointment under exactly one status. Statuses outside the
/// known three go to `unrecognized_count`.
pub fn summarize(total_count: usize, documents: Vec<Appointment>) -> AppointmentListSummary {
    let mut summary = AppointmentListSummary {
        total_count,
        ..Default::default()
    };

    for appointment in &documents {
        match &appointment.status {
            AppointmentStatus::Scheduled => summary.scheduled_count += 1,
            AppointmentStatus::Pending => summary.pending_count += 1,
            AppointmentStatus::Cancelled => summary.cancelled_count += 1,
            AppointmentStatus::Other(status) => {
                tracing::warn!(appointment_id = %appointment.id, status = %status, "unrecognized appointment status");
                summary.unrecognized_count += 1;
            }
        }
    }

    summary.documents = documents;
    summary
}

pub fn compose_sms_message(
    clinic_name: &str,
    kind: UpdateKind,
    appointment: &Appointment,
    time_zone: Tz,
) -> String {
    let when = format_date_time(&appointment.schedule, time_zone).date_time;
    let body = match kind {
        UpdateKind::Schedule => format!(
            "Your appointment is confirmed for {when} with Dr. {}",
            appointment.primary_physician
        ),
        UpdateKind::Cancel => format!(
            "We regret to inform that your appointment for {when} is cancelled. Reason: {}",
            appointment.cancellation_reason.as_deref().unwrap_or_default()
        ),
    };
    format!("Greetings from {clinic_name}. {body}.")
}

/// Applies the patch, then queues the patient's SMS. The SMS is not awaited and
/// its failure does not undo the update.
pub async fn update_appointment(
    state: &AppState,
    params: UpdateAppointmentParams,
) -> Result<Appointment, AppError> {
    if let Some(status) = &params.appointment.status {
        if !status.is_known() {
            return Err(AppError::BadRequest(format!(
                "unsupported appointment status: {}",
                status.as_str()
            )));
        }
    }

    let patch = match serde_json::to_value(&params.appointment) {
        Ok(Value::Object(map)) => map,
        Ok(_) => Map::new(),
        Err(e) => return Err(store_error("updateAppointment")(e.into())),
    };

    let doc = state
        .store
        .update_document(&state.config.collections.appointments, &params.appointment_id, patch)
        .await
        .map_err(store_error("updateAppointment"))?
        .ok_or_else(|| {
            tracing::error!(appointment_id = %params.appointment_id, "updateAppointment: appointment not found");
            AppError::NotFound("appointment not found".to_string())
        })?;
    let appointment = Appointment::try_from(doc).map_err(store_error("updateAppointment"))?;

    let content = compose_sms_message(
        &state.config.clinic_name,
        params.kind,
        &appointment,
        params.time_zone,
    );
    state.notifications.enqueue(OutboundSms {
        user_id: params.user_id.clone(),
        content,
    });

    tracing::info!(
        appointment_id = %appointment.id,
        status = %appointment.status.as_str(),
        "appointment updated"
    );
    let _ = state.events_tx.send(AdminEvent::AppointmentUpdated {
        appointment_id: appointment.id.clone(),
        status: appointment.status.as_str().to_string(),
    });
    Ok(appointment)
}
