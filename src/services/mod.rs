use crate::config::Config;
use crate::domain::campaign::BrandTier;
use crate::gateway::CarrierGateway;
use crate::registry::CampaignRegistry;
use crate::registry::timezone::NumberLookup;
use crate::storage::{MessageStore, OptOutStore, WebhookEventStore};
use std::sync::Arc;

pub mod compliance;
pub mod dispatch_service;
pub mod health_service;
pub mod inbound_service;
pub mod rate_limit_service;
pub mod webhook_service;

pub use compliance::ComplianceService;
pub use dispatch_service::DispatchService;
pub use health_service::HealthService;
pub use inbound_service::InboundService;
pub use rate_limit_service::RateGovernor;
pub use webhook_service::WebhookService;

/// Fully wired stores and services, shared by the binary and the test
/// harness so both run the same object graph.
#[derive(Debug)]
pub struct ServiceContainer {
    pub messages: Arc<MessageStore>,
    pub opt_outs: Arc<OptOutStore>,
    pub events: Arc<WebhookEventStore>,
    pub governor: Arc<RateGovernor>,
    pub compliance: Arc<ComplianceService>,
    pub dispatcher: Arc<DispatchService>,
    pub inbound: Arc<InboundService>,
    pub webhooks: Arc<WebhookService>,
    pub health: Arc<HealthService>,
}

impl ServiceContainer {
    /// Wires the component graph from configuration and the external
    /// collaborator implementations.
    ///
    /// # Errors
    /// Returns an error if the content-rule table or webhook public key is
    /// invalid.
    pub fn build(
        config: &Config,
        gateway: Arc<dyn CarrierGateway>,
        registry: Arc<dyn CampaignRegistry>,
        lookup: Arc<dyn NumberLookup>,
    ) -> anyhow::Result<Self> {
        let messages = Arc::new(MessageStore::new());
        let opt_outs = Arc::new(OptOutStore::new());
        let events = Arc::new(WebhookEventStore::new());
        let governor = Arc::new(RateGovernor::new());

        let content = match &config.compliance.content_rules_path {
            Some(path) => compliance::ContentPolicy::from_file(path)?,
            None => compliance::ContentPolicy::from_rules(compliance::ContentRuleSet::default())?,
        };
        let window = compliance::TimeWindowPolicy::from_config(&config.compliance);
        let default_tier = BrandTier {
            capacity: config.rate_limit.default_capacity,
            refill_per_sec: config.rate_limit.default_refill_per_sec,
        };

        let compliance_service = Arc::new(ComplianceService::new(
            Arc::clone(&registry),
            lookup,
            Arc::clone(&opt_outs),
            Arc::clone(&governor),
            content,
            window,
            default_tier,
        ));

        let dispatcher = Arc::new(DispatchService::new(
            Arc::clone(&messages),
            Arc::clone(&gateway),
            config.gateway.clone(),
        ));

        let inbound = Arc::new(InboundService::new(
            Arc::clone(&messages),
            Arc::clone(&opt_outs),
            Arc::clone(&registry),
            Arc::clone(&compliance_service),
            Arc::clone(&dispatcher),
            config.replies.clone(),
        ));

        let webhooks = Arc::new(WebhookService::new(
            Arc::clone(&events),
            Arc::clone(&messages),
            Arc::clone(&inbound),
            config.webhook.clone(),
        )?);

        let health = Arc::new(HealthService::new(gateway, config.gateway.timeout_ms));

        Ok(Self {
            messages,
            opt_outs,
            events,
            governor,
            compliance: compliance_service,
            dispatcher,
            inbound,
            webhooks,
            health,
        })
    }
}
