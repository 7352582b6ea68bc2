use std::future::Future;

use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::watch;

use super::{Form, IntakeRecord};
use crate::errors::AppError;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SubmissionState {
    Idle,
    Submitting,
    NavigatedAway { path: String },
    Failed { error: String },
}

/// What a successful submission hands back: the action's output and where to go next.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Submitted<T> {
    #[serde(flatten)]
    pub output: T,
    pub redirect: String,
}

/// Drives one form submission: Idle → Submitting → NavigatedAway | Failed.
/// Invalid input leaves the submission Idle and never reaches the action.
///
/// Transitions are published on a watch channel, so a caller holding a
/// receiver from [`FormSubmission::subscribe`] sees `Submitting` while the
/// action is still running.
pub struct FormSubmission<'a> {
    form: &'a Form,
    state: watch::Sender<SubmissionState>,
}

impl<'a> FormSubmission<'a> {
    pub fn new(form: &'a Form) -> Self {
        let (state, _) = watch::channel(SubmissionState::Idle);
        Self { form, state }
    }

    pub fn state(&self) -> SubmissionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SubmissionState> {
        self.state.subscribe()
    }

    /// True only while the action is in flight.
    pub fn is_loading(&self) -> bool {
        *self.state.borrow() == SubmissionState::Submitting
    }

    pub async fn submit<T, F, Fut>(
        &mut self,
        raw: &Map<String, Value>,
        action: F,
    ) -> Result<Submitted<T>, AppError>
    where
        F: FnOnce(IntakeRecord) -> Fut,
        Fut: Future<Output = Result<(T, String), AppError>>,
    {
        let record = self.form.parse_and_validate(raw).map_err(|errors| {
            tracing::debug!(form = %self.form.name(), %errors, "form rejected");
            AppError::Validation(errors)
        })?;

        self.state.send_replace(SubmissionState::Submitting);

        match action(record).await {
            Ok((output, path)) => {
                tracing::info!(form = %self.form.name(), redirect = %path, "form submitted");
                self.state
                    .send_replace(SubmissionState::NavigatedAway { path: path.clone() });
                Ok(Submitted {
                    output,
                    redirect: path,
                })
            }
            Err(e) => {
                tracing::error!(form = %self.form.name(), error = %e, "form submission failed");
                self.state.send_replace(SubmissionState::Failed {
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }
}
