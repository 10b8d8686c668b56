use crate::services::webhook_service::WebhookService;
use crate::storage::WebhookEventStore;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::Instrument as _;

/// Background worker that reprocesses failed webhook events when their
/// scheduled retry time arrives. Retrying here instead of inline keeps the
/// gateway's request cycle fast and makes backoff a delayed re-enqueue
/// rather than a recursive callback.
#[derive(Debug)]
pub struct WebhookRetryWorker {
    service: Arc<WebhookService>,
    events: Arc<WebhookEventStore>,
    interval_secs: u64,
    batch: usize,
}

impl WebhookRetryWorker {
    #[must_use]
    pub const fn new(
        service: Arc<WebhookService>,
        events: Arc<WebhookEventStore>,
        interval_secs: u64,
        batch: usize,
    ) -> Self {
        Self { service, events, interval_secs, batch }
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs.max(1)));

        tracing::info!("Webhook retry worker started");

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,

                _ = interval.tick() => {
                    self.process_due()
                        .instrument(tracing::debug_span!("webhook_retry_tick"))
                        .await;
                }
            }
        }

        tracing::info!("Webhook retry worker shutting down...");
    }

    async fn process_due(&self) {
        let due = self.events.due(Utc::now(), self.batch);
        if due.is_empty() {
            return;
        }

        tracing::info!(count = due.len(), "Reprocessing due webhook events");
        for stored in due {
            self.service.process_event(&stored.event).await;
        }
    }
}
