use crate::config::GatewayConfig;
use crate::domain::message::{DeliveryState, Message};
use crate::error::{AppError, Result};
use crate::gateway::{CarrierGateway, GatewayError};
use crate::storage::MessageStore;
use backon::{ExponentialBuilder, Retryable};
use dashmap::DashMap;
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[derive(Clone, Debug)]
struct Metrics {
    dispatched_total: Counter<u64>,
    attempts_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("mercury-server");
        Self {
            dispatched_total: meter
                .u64_counter("mercury_messages_dispatched_total")
                .with_description("Dispatch outcomes by status")
                .build(),
            attempts_total: meter
                .u64_counter("mercury_gateway_attempts_total")
                .with_description("Individual gateway send attempts")
                .build(),
        }
    }
}

/// Releases the per-message in-flight slot when a dispatch attempt ends,
/// including when the caller cancels the request mid-retry.
struct InFlightGuard<'a> {
    in_flight: &'a DashMap<Uuid, ()>,
    id: Uuid,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.remove(&self.id);
    }
}

/// Hands approved messages to the upstream carrier gateway.
///
/// Exactly one gateway call is made per attempt, and at most one attempt
/// chain runs per message id at a time; the retry loop backs off
/// exponentially with jitter on transient failures and never retries
/// client errors.
#[derive(Debug)]
pub struct DispatchService {
    store: Arc<MessageStore>,
    gateway: Arc<dyn CarrierGateway>,
    config: GatewayConfig,
    in_flight: DashMap<Uuid, ()>,
    metrics: Metrics,
}

impl DispatchService {
    #[must_use]
    pub fn new(store: Arc<MessageStore>, gateway: Arc<dyn CarrierGateway>, config: GatewayConfig) -> Self {
        Self { store, gateway, config, in_flight: DashMap::new(), metrics: Metrics::new() }
    }

    /// Dispatches a message that already passed the compliance gate.
    ///
    /// The `queued` record is persisted before the first gateway call, so a
    /// crash mid-dispatch leaves an auditable trail. On success the message
    /// carries its external id in state `dispatched`; on failure it is
    /// marked `failed` with the gateway error recorded.
    ///
    /// # Errors
    /// Returns `AppError::Conflict` if a dispatch for this message is
    /// already running, `AppError::DispatchRejected` on permanent gateway
    /// errors and `AppError::DispatchFailed` once the retry budget is
    /// exhausted.
    #[tracing::instrument(
        err(level = "warn"),
        skip(self, message),
        fields(message_id = %message.id, recipient = %message.to)
    )]
    pub async fn dispatch(&self, message: Message) -> Result<Message> {
        let id = message.id;
        if self.in_flight.insert(id, ()).is_some() {
            return Err(AppError::Conflict(format!("dispatch already in progress for message {id}")));
        }
        let _guard = InFlightGuard { in_flight: &self.in_flight, id };
        self.store.insert(message.clone());

        let strategy = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(self.config.retry_base_ms))
            .with_max_delay(Duration::from_millis(self.config.retry_max_ms))
            .with_max_times(self.config.max_retries)
            .with_jitter();

        let result = (|| async {
            self.metrics.attempts_total.add(1, &[]);
            self.gateway.send_message(&message.from, &message.to, &message.body, &message.media_urls).await
        })
        .retry(&strategy)
        .when(GatewayError::is_transient)
        .notify(|err, delay| {
            tracing::warn!(error = %err, retry_in = ?delay, "Transient gateway failure, retrying");
        })
        .await;

        match result {
            Ok(external_id) => {
                self.store.assign_external_id(id, &external_id)?;
                self.store.transition(id, DeliveryState::Dispatched)?;
                self.metrics.dispatched_total.add(1, &[KeyValue::new("status", "dispatched")]);
                tracing::debug!(%external_id, "Message handed to gateway");
                self.store.get(id).ok_or(AppError::Internal)
            }
            Err(GatewayError::Rejected { code, message: detail }) => {
                self.store.record_failure(id, &format!("{code}: {detail}"))?;
                self.metrics.dispatched_total.add(1, &[KeyValue::new("status", "rejected")]);
                Err(AppError::DispatchRejected { message_id: id, code, message: detail })
            }
            Err(err) => {
                self.store.record_failure(id, &err.to_string())?;
                self.metrics.dispatched_total.add(1, &[KeyValue::new("status", "failed")]);
                Err(AppError::DispatchFailed { message_id: id, source: err })
            }
        }
    }
}
