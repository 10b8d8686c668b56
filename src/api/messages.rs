use crate::api::AppState;
use crate::domain::decision::{CheckResult, Decision};
use crate::domain::message::{DeliveryState, Direction, Message};
use crate::error::Result;
use crate::services::compliance::SendCandidate;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub campaign_id: Uuid,
    pub from: String,
    pub to: String,
    pub body: String,
    #[serde(default)]
    pub media_urls: Vec<String>,
    /// Evaluation timestamp for scheduled sends; defaults to now.
    pub scheduled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub id: Uuid,
    pub external_id: Option<String>,
    pub direction: Direction,
    pub from: String,
    pub to: String,
    pub campaign_id: Option<Uuid>,
    pub state: DeliveryState,
    pub segments: u32,
    pub cost: Option<f64>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Message> for MessageResponse {
    fn from(message: Message) -> Self {
        Self {
            id: message.id,
            external_id: message.external_id,
            direction: message.direction,
            from: message.from,
            to: message.to,
            campaign_id: message.campaign_id,
            state: message.state,
            segments: message.segments,
            cost: message.cost,
            error: message.error,
            created_at: message.created_at,
            updated_at: message.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeniedResponse {
    pub allowed: bool,
    pub reasons: Vec<&'static str>,
    pub checks: Vec<CheckResult>,
}

impl From<Decision> for DeniedResponse {
    fn from(decision: Decision) -> Self {
        let reasons = decision.reasons();
        Self { allowed: decision.allowed, reasons, checks: decision.checks }
    }
}

/// Evaluates a send request against the compliance gate and dispatches it.
///
/// # Errors
/// Returns `AppError::DispatchRejected` or `AppError::DispatchFailed` when
/// the upstream gateway refuses or stays unavailable.
pub async fn send_message(
    State(state): State<AppState>,
    Json(request): Json<SendMessageRequest>,
) -> Result<impl IntoResponse> {
    let candidate = SendCandidate {
        campaign_id: Some(request.campaign_id),
        from: request.from.clone(),
        to: request.to.clone(),
        body: request.body.clone(),
        send_at: request.scheduled_at.unwrap_or_else(Utc::now),
    };

    let decision = state.compliance.evaluate(&candidate).await;
    if !decision.allowed {
        return Ok((StatusCode::UNPROCESSABLE_ENTITY, Json(DeniedResponse::from(decision)))
            .into_response());
    }

    let message = Message::outbound(
        Some(request.campaign_id),
        request.from,
        request.to,
        request.body,
        request.media_urls,
    );
    let dispatched = state.dispatcher.dispatch(message).await?;

    Ok((StatusCode::CREATED, Json(MessageResponse::from(dispatched))).into_response())
}

/// Returns the tracked record for one message.
///
/// # Errors
/// Returns `AppError::NotFound` for unknown ids.
pub async fn get_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let message = state.messages.get(id).ok_or(crate::error::AppError::NotFound)?;
    Ok(Json(MessageResponse::from(message)))
}
