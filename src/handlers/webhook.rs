use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Form;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::errors::AppError;
use crate::services::notifications;
use crate::state::AppState;

pub const STATUS_CALLBACK_PATH: &str = "/webhook/sms/status";

/// Twilio signs the full URL followed by every POST parameter, sorted by name.
fn validate_twilio_signature(
    auth_token: &str,
    signature: &str,
    url: &str,
    params: &BTreeMap<String, String>,
) -> bool {
    let mut data = url.to_string();
    for (key, value) in params {
        data.push_str(key);
        data.push_str(value);
    }

    let Ok(provided) = base64::engine::general_purpose::STANDARD.decode(signature) else {
        return false;
    };
    let mut mac = match Hmac::<Sha1>::new_from_slice(auth_token.as_bytes()) {
        Ok(m) => m,
        Err(_) => return false,
    };
    mac.update(data.as_bytes());

    // Constant-time comparison.
    mac.verify_slice(&provided).is_ok()
}

fn callback_url(public_url: &str, headers: &HeaderMap) -> String {
    if !public_url.is_empty() {
        return format!("{}{STATUS_CALLBACK_PATH}", public_url.trim_end_matches('/'));
    }
    // Behind a proxy, rebuild what Twilio actually called.
    let proto = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("https");
    let host = headers
        .get("x-forwarded-host")
        .or_else(|| headers.get("host"))
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    format!("{proto}://{host}{STATUS_CALLBACK_PATH}")
}

// POST /webhook/sms/status
pub async fn sms_status_callback(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(params): Form<BTreeMap<String, String>>,
) -> Result<Response, AppError> {
    // No auth token configured means signatures can't be checked (local dev).
    if !state.config.twilio_auth_token.is_empty() {
        let signature = headers
            .get("x-twilio-signature")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        if signature.is_empty() {
            tracing::warn!("missing X-Twilio-Signature header");
            return Ok((StatusCode::FORBIDDEN, "Missing signature").into_response());
        }

        let url = callback_url(&state.config.public_url, &headers);
        if !validate_twilio_signature(&state.config.twilio_auth_token, signature, &url, &params) {
            tracing::warn!(url = %url, "invalid Twilio signature");
            return Ok((StatusCode::FORBIDDEN, "Invalid signature").into_response());
        }
    }

    let (Some(sid), Some(status)) = (params.get("MessageSid"), params.get("MessageStatus")) else {
        return Err(AppError::BadRequest(
            "MessageSid and MessageStatus are required".to_string(),
        ));
    };

    let found = notifications::record_delivery_status(
        state.store.as_ref(),
        &state.config.collections.notifications,
        sid,
        status,
    )
    .await?;

    if found {
        tracing::info!(message_sid = %sid, status = %status, "SMS delivery status recorded");
    } else {
        tracing::warn!(message_sid = %sid, status = %status, "delivery status for unknown message");
    }

    Ok(StatusCode::NO_CONTENT.into_response())
}
