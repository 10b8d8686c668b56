use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Envelope the gateway wraps every webhook in.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEnvelope {
    pub data: GatewayEvent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayEvent {
    /// Provider-assigned event id; the idempotency key for ingestion.
    pub id: String,
    pub event_type: GatewayEventType,
    pub occurred_at: DateTime<Utc>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GatewayEventType {
    #[serde(rename = "message.sent")]
    Sent,
    #[serde(rename = "message.delivered")]
    Delivered,
    #[serde(rename = "message.delivery_failed")]
    DeliveryFailed,
    #[serde(rename = "message.received")]
    Received,
    #[serde(other, rename = "unknown")]
    Unknown,
}

/// Payload carried by lifecycle events (`message.sent` and friends).
#[derive(Debug, Clone, Deserialize)]
pub struct LifecyclePayload {
    /// Gateway message id, correlating to `Message.external_id`.
    pub id: String,
    #[serde(default)]
    pub cost: Option<WebhookCost>,
    #[serde(default)]
    pub failure_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookCost {
    pub amount: String,
    pub currency: String,
}

/// Payload carried by `message.received` events.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundPayload {
    pub from: String,
    pub to: String,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEventStatus {
    /// Stored, first processing attempt not yet resolved.
    Pending,
    Processed,
    /// Processing failed; a retry is scheduled.
    Failed,
    /// Retry budget exhausted; requires operator attention.
    Dead,
}

/// Audit record for one received webhook. Retained whether or not the
/// event was ultimately applied.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookEvent {
    pub event_id: String,
    pub event: GatewayEvent,
    pub received_at: DateTime<Utc>,
    pub status: WebhookEventStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub next_attempt_at: Option<DateTime<Utc>>,
}

impl WebhookEvent {
    #[must_use]
    pub fn received(event: GatewayEvent, received_at: DateTime<Utc>) -> Self {
        Self {
            event_id: event.id.clone(),
            event,
            received_at,
            status: WebhookEventStatus::Pending,
            attempts: 0,
            last_error: None,
            next_attempt_at: None,
        }
    }
}
