use serde_json::{json, Value};

use super::store_error;
use crate::errors::AppError;
use crate::forms::catalog::IDENTIFICATION_DOCUMENT_FIELD;
use crate::forms::IntakeRecord;
use crate::models::{Patient, User};
use crate::state::AppState;
use crate::store::{unique_id, Query};

#[derive(Debug, Clone)]
pub struct CreateUserParams {
    pub name: String,
    pub email: String,
    pub phone: String,
}

/// Returns the existing user with this email, or creates one.
pub async fn create_user(state: &AppState, params: CreateUserParams) -> Result<User, AppError> {
    let users = &state.config.collections.users;

    let existing = state
        .store
        .list_documents(users, &[Query::equal("email", params.email.as_str()), Query::Limit(1)])
        .await
        .map_err(store_error("createUser"))?;
    if let Some(doc) = existing.documents.into_iter().next() {
        tracing::info!(user_id = %doc.id, "user already registered");
        return User::try_from(doc).map_err(store_error("createUser"));
    }

    let data = json!({
        "name": params.name,
        "email": params.email,
        "phone": params.phone,
    });
    let doc = state
        .store
        .create_document(users, &unique_id(), object(data))
        .await
        .map_err(store_error("createUser"))?;

    tracing::info!(user_id = %doc.id, "user created");
    User::try_from(doc).map_err(store_error("createUser"))
}

pub async fn get_user(state: &AppState, user_id: &str) -> Result<User, AppError> {
    let doc = state
        .store
        .get_document(&state.config.collections.users, user_id)
        .await
        .map_err(store_error("getUser"))?
        .ok_or_else(|| AppError::NotFound(format!("user {user_id}")))?;

    User::try_from(doc).map_err(store_error("getUser"))
}

/// Stores the identification document (if one was uploaded) and then the
/// patient record pointing at it.
pub async fn register_patient(
    state: &AppState,
    user_id: &str,
    mut record: IntakeRecord,
) -> Result<Patient, AppError> {
    let upload = record.take_upload(IDENTIFICATION_DOCUMENT_FIELD);
    let mut data = record.to_data();

    if let Some(upload) = upload {
        let file = state
            .files
            .create_file(&state.config.collections.bucket, &unique_id(), upload)
            .await
            .map_err(store_error("registerPatient"))?;
        tracing::info!(file_id = %file.id, size = file.size, "identification document stored");
        data.insert("identificationDocumentId".to_string(), Value::String(file.id));
        data.insert("identificationDocumentUrl".to_string(), Value::String(file.url));
    }

    data.insert("userId".to_string(), Value::String(user_id.to_string()));
    for consent in ["treatmentConsent", "disclosureConsent", "privacyConsent"] {
        data.entry(consent.to_string()).or_insert(Value::Bool(false));
    }

    let doc = state
        .store
        .create_document(&state.config.collections.patients, &unique_id(), data)
        .await
        .map_err(store_error("registerPatient"))?;

    tracing::info!(patient_id = %doc.id, user_id, "patient registered");
    Patient::try_from(doc).map_err(store_error("registerPatient"))
}

pub async fn get_patient(state: &AppState, user_id: &str) -> Result<Patient, AppError> {
    let list = state
        .store
        .list_documents(
            &state.config.collections.patients,
            &[Query::equal("userId", user_id), Query::Limit(1)],
        )
        .await
        .map_err(store_error("getPatient"))?;

    let doc = list
        .documents
        .into_iter()
        .next()
        .ok_or_else(|| AppError::NotFound(format!("patient for user {user_id}")))?;

    Patient::try_from(doc).map_err(store_error("getPatient"))
}

fn object(value: Value) -> serde_json::Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    }
}
