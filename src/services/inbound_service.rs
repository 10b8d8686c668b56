use crate::config::ReplyConfig;
use crate::domain::keyword::{KeywordAction, classify};
use crate::domain::message::Message;
use crate::domain::opt_out::{OptOutRecord, OptOutScope};
use crate::registry::CampaignRegistry;
use crate::services::compliance::{ComplianceService, GateOverrides, SendCandidate};
use crate::services::dispatch_service::DispatchService;
use crate::storage::{MessageStore, OptOutStore};
use chrono::Utc;
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::sync::Arc;
use tracing::Instrument as _;

#[derive(Clone, Debug)]
struct Metrics {
    keywords_total: Counter<u64>,
    opt_outs_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("mercury-server");
        Self {
            keywords_total: meter
                .u64_counter("mercury_inbound_keywords_total")
                .with_description("Inbound messages by classified keyword action")
                .build(),
            opt_outs_total: meter
                .u64_counter("mercury_opt_outs_recorded_total")
                .with_description("Opt-out records written from reply keywords")
                .build(),
        }
    }
}

/// Classifies inbound messages and feeds the opt-out ledger. STOP-family
/// keywords write a campaign-scoped record and trigger a confirmation
/// reply; HELP-family keywords trigger the fixed help reply. Replies skip
/// the opt-out and throughput checks but still pass content and
/// time-window checks.
#[derive(Debug)]
pub struct InboundService {
    messages: Arc<MessageStore>,
    opt_outs: Arc<OptOutStore>,
    registry: Arc<dyn CampaignRegistry>,
    compliance: Arc<ComplianceService>,
    dispatcher: Arc<DispatchService>,
    replies: ReplyConfig,
    metrics: Metrics,
}

impl InboundService {
    #[must_use]
    pub fn new(
        messages: Arc<MessageStore>,
        opt_outs: Arc<OptOutStore>,
        registry: Arc<dyn CampaignRegistry>,
        compliance: Arc<ComplianceService>,
        dispatcher: Arc<DispatchService>,
        replies: ReplyConfig,
    ) -> Self {
        Self { messages, opt_outs, registry, compliance, dispatcher, replies, metrics: Metrics::new() }
    }

    /// Stores the inbound message and runs its keyword action.
    ///
    /// # Errors
    /// Returns an error if reply evaluation fails; ledger writes themselves
    /// are infallible.
    #[tracing::instrument(skip(self, message), fields(message_id = %message.id, from = %message.from))]
    pub async fn handle(&self, message: Message) -> anyhow::Result<()> {
        let action = classify(&message.body);
        self.messages.insert(message.clone());
        self.metrics.keywords_total.add(1, &[KeyValue::new("action", action.as_str())]);

        match action {
            KeywordAction::Stop => self.process_stop(&message).await,
            KeywordAction::Help => {
                self.send_reply(&message, &self.replies.help_text).await;
                Ok(())
            }
            KeywordAction::Start => {
                // The ledger is append-only; re-consent is recorded by the
                // manual-entry collaborator, not by deleting records here.
                tracing::info!("Start keyword received; ledger unchanged");
                Ok(())
            }
            KeywordAction::NoMatch => Ok(()),
        }
    }

    async fn process_stop(&self, message: &Message) -> anyhow::Result<()> {
        let campaign = self.registry.campaign_for_number(&message.to).await;
        let scope = campaign
            .as_ref()
            .map_or(OptOutScope::Global, |c| OptOutScope::Campaign(c.id));

        let record = OptOutRecord::from_keyword(message.from.clone(), scope, message.id);
        if self.opt_outs.insert_if_absent(record) {
            self.metrics.opt_outs_total.add(1, &[]);
            tracing::info!(scope = scope.as_str(), "Opt-out recorded from reply keyword");
            self.send_reply(message, &self.replies.stop_text).await;
        } else {
            tracing::debug!("Opt-out already on record; no confirmation resent");
        }
        Ok(())
    }

    /// Evaluates and dispatches a system reply. The dispatch itself runs on
    /// its own task so webhook processing acknowledges promptly.
    async fn send_reply(&self, inbound: &Message, text: &str) {
        let campaign = self.registry.campaign_for_number(&inbound.to).await;
        let candidate = SendCandidate {
            campaign_id: campaign.map(|c| c.id),
            from: inbound.to.clone(),
            to: inbound.from.clone(),
            body: text.to_string(),
            send_at: Utc::now(),
        };

        let decision = self
            .compliance
            .evaluate_with(&candidate, GateOverrides { skip_opt_out: true, skip_throughput: true })
            .await;
        if !decision.allowed {
            tracing::warn!(reasons = ?decision.reasons(), "System reply suppressed by compliance gate");
            return;
        }

        let reply = Message::outbound(
            candidate.campaign_id,
            candidate.from,
            candidate.to,
            candidate.body,
            Vec::new(),
        );
        let dispatcher = Arc::clone(&self.dispatcher);
        tokio::spawn(
            async move {
                if let Err(e) = dispatcher.dispatch(reply).await {
                    tracing::error!(error = %e, "Failed to dispatch system reply");
                }
            }
            .instrument(tracing::debug_span!("dispatch_reply")),
        );
    }
}
