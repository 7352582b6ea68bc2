use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::errors::AppError;
use crate::forms::{catalog, FormSubmission, IntakeRecord, Submitted};
use crate::models::{Patient, User};
use crate::services::patients::{self, CreateUserParams};
use crate::state::AppState;

pub fn register_path(user_id: &str) -> String {
    format!("/patients/{user_id}/register")
}

pub fn new_appointment_path(user_id: &str) -> String {
    format!("/patients/{user_id}/new-appointment")
}

/// Text of a field the form's schema already guaranteed.
pub(crate) fn text(record: &IntakeRecord, name: &str) -> String {
    record.text(name).unwrap_or_default().to_string()
}

#[derive(Serialize)]
pub struct UserCreated {
    user: User,
}

// POST /api/users
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Map<String, Value>>,
) -> Result<Json<Submitted<UserCreated>>, AppError> {
    let form = catalog::patient_form();
    let mut submission = FormSubmission::new(&form);

    let submitted = submission
        .submit(&body, |record| async move {
            let params = CreateUserParams {
                name: text(&record, "name"),
                email: text(&record, "email"),
                phone: text(&record, "phone"),
            };
            let user = patients::create_user(&state, params).await?;
            let path = register_path(&user.id);
            Ok((UserCreated { user }, path))
        })
        .await?;

    Ok(Json(submitted))
}

// GET /api/users/:user_id
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<User>, AppError> {
    Ok(Json(patients::get_user(&state, &user_id).await?))
}

#[derive(Serialize)]
pub struct PatientRegistered {
    patient: Patient,
}

// POST /api/patients/:user_id/register
pub async fn register_patient(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(body): Json<Map<String, Value>>,
) -> Result<Json<Submitted<PatientRegistered>>, AppError> {
    let form = catalog::register_form();
    let mut submission = FormSubmission::new(&form);

    let submitted = submission
        .submit(&body, |record| async move {
            let user = patients::get_user(&state, &user_id).await?;
            let patient = patients::register_patient(&state, &user.id, record).await?;
            Ok((PatientRegistered { patient }, new_appointment_path(&user.id)))
        })
        .await?;

    Ok(Json(submitted))
}

// GET /api/patients/:user_id
pub async fn get_patient(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Patient>, AppError> {
    Ok(Json(patients::get_patient(&state, &user_id).await?))
}
