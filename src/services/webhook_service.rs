use crate::config::WebhookConfig;
use crate::domain::message::{DeliveryState, Message};
use crate::domain::webhook::{
    GatewayEvent, GatewayEventType, InboundPayload, LifecyclePayload, WebhookEnvelope,
};
use crate::error::{AppError, Result};
use crate::services::inbound_service::InboundService;
use crate::storage::{InsertOutcome, MessageStore, TransitionOutcome, WebhookEventStore};
use anyhow::{Context as _, anyhow};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, Duration, Utc};
use ed25519_dalek::{Signature, Verifier as _, VerifyingKey};
use opentelemetry::{KeyValue, global, metrics::Counter};
use rand::Rng as _;
use std::sync::Arc;

#[derive(Clone, Debug)]
struct Metrics {
    events_total: Counter<u64>,
    rejected_total: Counter<u64>,
    anomalies_total: Counter<u64>,
    dead_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("mercury-server");
        Self {
            events_total: meter
                .u64_counter("mercury_webhook_events_total")
                .with_description("Webhook events by processing outcome")
                .build(),
            rejected_total: meter
                .u64_counter("mercury_webhook_rejected_total")
                .with_description("Webhooks rejected at ingress (signature/skew)")
                .build(),
            anomalies_total: meter
                .u64_counter("mercury_state_anomalies_total")
                .with_description("Discarded out-of-order or into-terminal transitions")
                .build(),
            dead_total: meter
                .u64_counter("mercury_webhook_dead_total")
                .with_description("Webhook events that exhausted their retry budget")
                .build(),
        }
    }
}

/// Verifies the gateway's detached Ed25519 signature over
/// `"{timestamp}|{raw_body}"`, bounding replay with a timestamp window.
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    key: VerifyingKey,
    max_skew_secs: i64,
}

impl SignatureVerifier {
    /// Parses the base64 public key.
    ///
    /// # Errors
    /// Returns an error if the key is missing or not a valid Ed25519 key.
    pub fn from_base64(public_key: &str, max_skew_secs: i64) -> anyhow::Result<Self> {
        let raw = BASE64.decode(public_key).context("webhook public key is not valid base64")?;
        let bytes: [u8; 32] =
            raw.try_into().map_err(|_| anyhow!("webhook public key must be 32 bytes"))?;
        let key = VerifyingKey::from_bytes(&bytes).context("invalid Ed25519 public key")?;
        Ok(Self { key, max_skew_secs })
    }

    /// # Errors
    /// Returns a detail string when the timestamp is stale or the signature
    /// does not verify.
    pub fn verify(
        &self,
        raw_body: &[u8],
        signature_b64: &str,
        timestamp: &str,
        now: DateTime<Utc>,
    ) -> std::result::Result<(), String> {
        let ts: i64 = timestamp.parse().map_err(|_| "malformed timestamp header".to_string())?;
        if (now.timestamp() - ts).abs() > self.max_skew_secs {
            return Err(format!("timestamp skew exceeds {}s", self.max_skew_secs));
        }

        let sig_bytes =
            BASE64.decode(signature_b64).map_err(|_| "signature is not valid base64".to_string())?;
        let signature =
            Signature::from_slice(&sig_bytes).map_err(|_| "malformed signature".to_string())?;

        let mut signed = Vec::with_capacity(timestamp.len() + 1 + raw_body.len());
        signed.extend_from_slice(timestamp.as_bytes());
        signed.push(b'|');
        signed.extend_from_slice(raw_body);

        self.key.verify(&signed, &signature).map_err(|_| "signature mismatch".to_string())
    }
}

/// Applies carrier webhooks to tracked messages: verify, deduplicate,
/// transition, and schedule retries for processing failures.
#[derive(Debug)]
pub struct WebhookService {
    events: Arc<WebhookEventStore>,
    messages: Arc<MessageStore>,
    inbound: Arc<InboundService>,
    verifier: SignatureVerifier,
    config: WebhookConfig,
    metrics: Metrics,
}

impl WebhookService {
    /// # Errors
    /// Returns an error if the configured webhook public key is invalid.
    pub fn new(
        events: Arc<WebhookEventStore>,
        messages: Arc<MessageStore>,
        inbound: Arc<InboundService>,
        config: WebhookConfig,
    ) -> anyhow::Result<Self> {
        let verifier = SignatureVerifier::from_base64(&config.public_key, config.max_skew_secs)?;
        Ok(Self { events, messages, inbound, verifier, config, metrics: Metrics::new() })
    }

    /// Ingests one raw webhook delivery.
    ///
    /// Verification failures are the only errors surfaced to the gateway;
    /// everything after the event is recorded is acknowledged so the
    /// gateway never enters a retry storm. Replays of processed events are
    /// acknowledged without reapplying.
    ///
    /// # Errors
    /// Returns `AppError::WebhookVerification` on signature or skew
    /// failures and `AppError::BadRequest` when the payload is not a
    /// well-formed envelope.
    #[tracing::instrument(skip_all)]
    pub async fn ingest(&self, raw_body: &[u8], signature: &str, timestamp: &str) -> Result<()> {
        let now = Utc::now();
        if let Err(detail) = self.verifier.verify(raw_body, signature, timestamp, now) {
            self.metrics.rejected_total.add(1, &[]);
            return Err(AppError::WebhookVerification(detail));
        }

        let envelope: WebhookEnvelope = serde_json::from_slice(raw_body)
            .map_err(|e| AppError::BadRequest(format!("malformed webhook payload: {e}")))?;
        let event = envelope.data;

        match self.events.insert_if_new(event.clone(), now) {
            InsertOutcome::Duplicate { already_processed } => {
                tracing::debug!(event_id = %event.id, already_processed, "Duplicate webhook event acknowledged");
                self.metrics.events_total.add(1, &[KeyValue::new("outcome", "duplicate")]);
                Ok(())
            }
            InsertOutcome::Created => {
                self.process_event(&event).await;
                Ok(())
            }
        }
    }

    /// Runs one processing attempt for a stored event, updating the audit
    /// record: processed on success, rescheduled with backoff on failure,
    /// dead once the attempt budget is spent.
    pub async fn process_event(&self, event: &GatewayEvent) {
        match self.apply(event).await {
            Ok(()) => {
                self.events.mark_processed(&event.id);
                self.metrics.events_total.add(1, &[KeyValue::new("outcome", "processed")]);
            }
            Err(err) => {
                let attempts = self.events.record_failure(&event.id, &err.to_string());
                if attempts >= self.config.max_attempts {
                    self.events.mark_dead(&event.id);
                    self.metrics.dead_total.add(1, &[]);
                    tracing::error!(
                        event_id = %event.id,
                        attempts,
                        error = %err,
                        "Webhook event permanently failed; operator attention required"
                    );
                } else {
                    let delay = self.retry_delay(attempts);
                    self.events.schedule_retry(&event.id, Utc::now() + delay);
                    self.metrics.events_total.add(1, &[KeyValue::new("outcome", "retried")]);
                    tracing::warn!(
                        event_id = %event.id,
                        attempts,
                        retry_in_ms = delay.num_milliseconds(),
                        error = %err,
                        "Webhook processing failed, retry scheduled"
                    );
                }
            }
        }
    }

    async fn apply(&self, event: &GatewayEvent) -> anyhow::Result<()> {
        match event.event_type {
            GatewayEventType::Sent => self.apply_lifecycle(event, DeliveryState::Sent),
            GatewayEventType::Delivered => self.apply_lifecycle(event, DeliveryState::Delivered),
            GatewayEventType::DeliveryFailed => self.apply_lifecycle(event, DeliveryState::Failed),
            GatewayEventType::Received => self.apply_inbound(event).await,
            GatewayEventType::Unknown => {
                tracing::debug!(event_id = %event.id, "Ignoring unrecognized webhook event type");
                Ok(())
            }
        }
    }

    fn apply_lifecycle(&self, event: &GatewayEvent, target: DeliveryState) -> anyhow::Result<()> {
        let payload: LifecyclePayload = serde_json::from_value(event.payload.clone())
            .context("lifecycle event payload missing message id")?;
        let message = self
            .messages
            .get_by_external_id(&payload.id)
            .ok_or_else(|| anyhow!("no tracked message with external id {}", payload.id))?;

        match target {
            DeliveryState::Failed => {
                let reason = payload.failure_reason.as_deref().unwrap_or("carrier reported failure");
                self.record_outcome(self.messages.record_failure(message.id, reason)?, event, target);
            }
            _ => {
                self.record_outcome(self.messages.transition(message.id, target)?, event, target);
            }
        }

        if let Some(cost) = payload.cost
            && let Ok(amount) = cost.amount.parse::<f64>()
        {
            self.messages.set_cost(message.id, amount);
        }
        Ok(())
    }

    fn record_outcome(&self, outcome: TransitionOutcome, event: &GatewayEvent, target: DeliveryState) {
        match outcome {
            TransitionOutcome::Applied { from } => {
                tracing::debug!(
                    event_id = %event.id,
                    from = from.as_str(),
                    to = target.as_str(),
                    "Delivery state advanced"
                );
            }
            TransitionOutcome::Discarded { current } => {
                // Not an error: the webhook is still acknowledged. Recorded
                // for audit as an out-of-order or into-terminal attempt.
                self.metrics.anomalies_total.add(1, &[]);
                tracing::warn!(
                    event_id = %event.id,
                    current = current.as_str(),
                    attempted = target.as_str(),
                    "Discarded state-transition anomaly"
                );
            }
        }
    }

    async fn apply_inbound(&self, event: &GatewayEvent) -> anyhow::Result<()> {
        let payload: InboundPayload = serde_json::from_value(event.payload.clone())
            .context("inbound event payload missing sender/recipient")?;
        let message =
            Message::inbound(Some(event.id.clone()), payload.from, payload.to, payload.text);
        self.inbound.handle(message).await
    }

    /// Exponential backoff with jitter: base doubles per attempt, capped,
    /// plus up to 25% random spread to avoid synchronized retries.
    fn retry_delay(&self, attempts: u32) -> Duration {
        let shift = attempts.saturating_sub(1).min(16);
        let capped =
            self.config.retry_base_secs.saturating_mul(1u64 << shift).min(self.config.retry_max_secs);
        let capped_ms = capped * 1000;
        let jitter_ms = rand::thread_rng().gen_range(0..=(capped_ms / 4).max(1));
        Duration::milliseconds(i64::try_from(capped_ms + jitter_ms).unwrap_or(i64::MAX))
    }
}
