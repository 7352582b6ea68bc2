use axum::extract::Path;
use axum::Json;
use serde::Serialize;

use crate::errors::AppError;
use crate::forms::{catalog, IntakeRecord, RenderedField};

#[derive(Serialize)]
pub struct FormResponse {
    name: String,
    fields: Vec<RenderedField>,
}

// GET /api/forms/:name
pub async fn get_form(Path(name): Path<String>) -> Result<Json<FormResponse>, AppError> {
    let form = catalog::by_name(&name).ok_or_else(|| AppError::NotFound(format!("form {name}")))?;

    Ok(Json(FormResponse {
        name: form.name().to_string(),
        fields: form.render(&IntakeRecord::new()),
    }))
}
