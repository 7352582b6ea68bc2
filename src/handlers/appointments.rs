use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use serde_json::{Map, Value};

use super::patients::text;
use crate::errors::AppError;
use crate::forms::catalog::{self, AppointmentForm};
use crate::forms::{FormSubmission, Submitted};
use crate::models::Appointment;
use crate::services::appointments::{self, CreateAppointmentParams};
use crate::services::patients;
use crate::state::AppState;

pub fn success_path(user_id: &str, appointment_id: &str) -> String {
    format!("/patients/{user_id}/new-appointment/success?appointmentId={appointment_id}")
}

#[derive(Serialize)]
pub struct AppointmentCreated {
    appointment: Appointment,
}

// POST /api/patients/:user_id/appointments
pub async fn create_appointment(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(body): Json<Map<String, Value>>,
) -> Result<Json<Submitted<AppointmentCreated>>, AppError> {
    let form = catalog::appointment_form(AppointmentForm::Create);
    let mut submission = FormSubmission::new(&form);

    let submitted = submission
        .submit(&body, |record| async move {
            let patient = patients::get_patient(&state, &user_id).await?;
            let schedule = record
                .date("schedule")
                .ok_or_else(|| AppError::BadRequest("schedule is required".to_string()))?;

            let params = CreateAppointmentParams {
                user_id: user_id.clone(),
                patient_id: Some(patient.id),
                primary_physician: text(&record, "primaryPhysician"),
                schedule,
                reason: text(&record, "reason"),
                note: record.text("note").map(str::to_string),
            };
            let appointment = appointments::create_appointment(&state, params).await?;
            let path = success_path(&user_id, &appointment.id);
            Ok((AppointmentCreated { appointment }, path))
        })
        .await?;

    Ok(Json(submitted))
}

// GET /api/appointments/:id
pub async fn get_appointment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Appointment>, AppError> {
    Ok(Json(appointments::get_appointment(&state, &id).await?))
}
