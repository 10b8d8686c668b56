use crate::domain::campaign::{BrandTier, Campaign, CampaignStatus};
use crate::domain::decision::{CheckName, CheckResult, Decision};
use crate::registry::CampaignRegistry;
use crate::registry::timezone::NumberLookup;
use crate::services::rate_limit_service::RateGovernor;
use crate::storage::OptOutStore;
use chrono::{DateTime, Utc};
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::sync::Arc;
use uuid::Uuid;

pub mod content;
pub mod time_window;

pub use content::{ContentPolicy, ContentRuleSet};
pub use time_window::TimeWindowPolicy;

#[derive(Clone, Debug)]
struct Metrics {
    decisions_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("mercury-server");
        Self {
            decisions_total: meter
                .u64_counter("mercury_compliance_decisions_total")
                .with_description("Compliance gate decisions (allowed/denied)")
                .build(),
        }
    }
}

/// Candidate outbound message presented to the gate.
#[derive(Debug, Clone)]
pub struct SendCandidate {
    pub campaign_id: Option<Uuid>,
    pub from: String,
    pub to: String,
    pub body: String,
    /// Evaluation timestamp: the scheduled send time, or now.
    pub send_at: DateTime<Utc>,
}

/// Check relaxations for system-generated replies. An opt-out confirmation
/// is itself the opt-out interaction, so the opt-out check must not block
/// it; neither reply kind draws on the campaign's throughput budget.
#[derive(Debug, Clone, Copy, Default)]
pub struct GateOverrides {
    pub skip_opt_out: bool,
    pub skip_throughput: bool,
}

#[derive(Debug)]
pub struct ComplianceService {
    registry: Arc<dyn CampaignRegistry>,
    lookup: Arc<dyn NumberLookup>,
    opt_outs: Arc<OptOutStore>,
    governor: Arc<RateGovernor>,
    content: ContentPolicy,
    window: TimeWindowPolicy,
    default_tier: BrandTier,
    metrics: Metrics,
}

impl ComplianceService {
    #[must_use]
    pub fn new(
        registry: Arc<dyn CampaignRegistry>,
        lookup: Arc<dyn NumberLookup>,
        opt_outs: Arc<OptOutStore>,
        governor: Arc<RateGovernor>,
        content: ContentPolicy,
        window: TimeWindowPolicy,
        default_tier: BrandTier,
    ) -> Self {
        Self {
            registry,
            lookup,
            opt_outs,
            governor,
            content,
            window,
            default_tier,
            metrics: Metrics::new(),
        }
    }

    /// Evaluates a candidate with the standard check set.
    pub async fn evaluate(&self, candidate: &SendCandidate) -> Decision {
        self.evaluate_with(candidate, GateOverrides::default()).await
    }

    /// Runs every check and reports all failing reasons. A campaign that is
    /// not approved denies immediately without running the other checks.
    /// The throughput token is consumed only when every other check passed;
    /// a denied decision has no side effects.
    #[tracing::instrument(skip(self, candidate), fields(recipient = %candidate.to))]
    pub async fn evaluate_with(&self, candidate: &SendCandidate, overrides: GateOverrides) -> Decision {
        let campaign = match self.load_campaign(candidate).await {
            Ok(campaign) => campaign,
            Err(decision) => {
                self.record(&decision);
                return decision;
            }
        };

        let mut checks = vec![
            self.check_opt_out(candidate, campaign.as_ref(), overrides),
            self.check_content(candidate, campaign.as_ref()),
            self.check_time_window(candidate, campaign.as_ref()).await,
        ];
        let others_passed = checks.iter().all(|c| c.passed);
        checks.push(self.check_throughput(campaign.as_ref(), overrides, others_passed).await);

        let decision = Decision::from_checks(checks);
        self.record(&decision);
        decision
    }

    async fn load_campaign(&self, candidate: &SendCandidate) -> Result<Option<Campaign>, Decision> {
        let Some(campaign_id) = candidate.campaign_id else {
            return Ok(None);
        };
        match self.registry.get_campaign(campaign_id).await {
            Some(campaign) if campaign.status == CampaignStatus::Approved => Ok(Some(campaign)),
            Some(_) => Err(Decision::deny(CheckResult::fail(
                CheckName::CampaignStatus,
                format!("campaign {campaign_id} is not approved"),
            ))),
            None => Err(Decision::deny(CheckResult::fail(
                CheckName::CampaignStatus,
                format!("campaign {campaign_id} is not registered"),
            ))),
        }
    }

    fn check_opt_out(
        &self,
        candidate: &SendCandidate,
        campaign: Option<&Campaign>,
        overrides: GateOverrides,
    ) -> CheckResult {
        if overrides.skip_opt_out {
            return CheckResult::pass_with(CheckName::OptOut, "skipped for system reply");
        }
        let matched = self.opt_outs.find_match(
            &candidate.to,
            campaign.map(|c| c.id),
            campaign.map(|c| c.brand_id),
        );
        matched.map_or_else(
            || CheckResult::pass(CheckName::OptOut),
            |record| {
                CheckResult::fail(
                    CheckName::OptOut,
                    format!("recipient opted out at {} scope", record.scope.as_str()),
                )
            },
        )
    }

    fn check_content(&self, candidate: &SendCandidate, campaign: Option<&Campaign>) -> CheckResult {
        let violations = self.content.check(&candidate.body, campaign.map(|c| c.use_case));
        if violations.is_empty() {
            CheckResult::pass(CheckName::Content)
        } else {
            CheckResult::fail(CheckName::Content, violations.join(", "))
        }
    }

    async fn check_time_window(
        &self,
        candidate: &SendCandidate,
        campaign: Option<&Campaign>,
    ) -> CheckResult {
        if campaign.is_some_and(|c| c.quiet_hours_exempt) {
            return CheckResult::pass_with(CheckName::TimeWindow, "campaign declares exemption");
        }
        let Some(tz) = self.lookup.resolve(&candidate.to).await else {
            return CheckResult::fail(CheckName::TimeWindow, "timezone_unresolved");
        };
        match self.window.evaluate(tz, candidate.send_at) {
            Ok(()) => CheckResult::pass(CheckName::TimeWindow),
            Err(detail) => CheckResult::fail(CheckName::TimeWindow, detail),
        }
    }

    async fn check_throughput(
        &self,
        campaign: Option<&Campaign>,
        overrides: GateOverrides,
        others_passed: bool,
    ) -> CheckResult {
        if overrides.skip_throughput {
            return CheckResult::pass_with(CheckName::Throughput, "skipped for system reply");
        }
        let Some(campaign) = campaign else {
            return CheckResult::pass_with(CheckName::Throughput, "no campaign scope");
        };
        let tier =
            self.registry.get_brand_tier(campaign.brand_id).await.unwrap_or(self.default_tier);
        let decision = if others_passed {
            self.governor.try_acquire(campaign.id, tier)
        } else {
            self.governor.peek(campaign.id, tier)
        };
        if decision.granted {
            CheckResult::pass(CheckName::Throughput)
        } else {
            let wait = decision.retry_after.map_or(0, |d| d.as_millis() as u64);
            CheckResult::fail(CheckName::Throughput, format!("retry after {wait}ms"))
        }
    }

    fn record(&self, decision: &Decision) {
        let outcome = if decision.allowed { "allowed" } else { "denied" };
        self.metrics.decisions_total.add(1, &[KeyValue::new("outcome", outcome)]);
        if decision.allowed {
            tracing::debug!("Compliance gate allowed candidate");
        } else {
            tracing::info!(reasons = ?decision.reasons(), "Compliance gate denied candidate");
        }
    }
}
