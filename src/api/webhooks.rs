use crate::api::AppState;
use crate::error::{AppError, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};

const SIGNATURE_HEADER: &str = "x-gateway-signature";
const TIMESTAMP_HEADER: &str = "x-gateway-timestamp";

/// Ingests a signed webhook from the upstream gateway.
///
/// Processing failures are handled by the retry subsystem; the gateway only
/// ever sees verification failures, so its own retry logic never storms us.
///
/// # Errors
/// Returns `AppError::WebhookVerification` when the signature headers are
/// missing or invalid, `AppError::BadRequest` for malformed payloads.
pub async fn ingest(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::WebhookVerification("missing signature header".to_string()))?;
    let timestamp = headers
        .get(TIMESTAMP_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::WebhookVerification("missing timestamp header".to_string()))?;

    state.webhooks.ingest(&body, signature, timestamp).await?;

    Ok(StatusCode::OK)
}
