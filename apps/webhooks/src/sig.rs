//! Signature gate for the inbound-message route.
//!
//! The check runs before the handler, so nothing unauthenticated ever
//! reaches storage or the notifier. The body is buffered here and handed
//! back to the handler untouched.

use axum::{
    body::{Body, to_bytes},
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{AppState, extract};

pub const SIGNATURE_HEADER: &str = "X-Twilio-Signature";

pub async fn require_twilio_signature(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();
    let body_bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::error!(error = %err, "failed to buffer request body");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let signature = parts
        .headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    let url = extract::request_url(&parts);
    let form = extract::form_params(&parts.headers, &body_bytes);

    if !state.validator.validate(&url, &form, signature) {
        tracing::warn!(%url, "rejected webhook with invalid signature");
        return StatusCode::FORBIDDEN.into_response();
    }

    let request = Request::from_parts(parts, Body::from(body_bytes));
    next.run(request).await
}
