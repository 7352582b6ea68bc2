pub mod appointments;
pub mod datetime;
pub mod messaging;
pub mod notifications;
pub mod patients;

use crate::errors::AppError;

/// Logs a remote-store failure at the action boundary and converts it.
pub(crate) fn store_error(action: &'static str) -> impl FnOnce(anyhow::Error) -> AppError {
    move |e| {
        tracing::error!(action, error = %e, "document store call failed");
        AppError::Store(e)
    }
}
