use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckName {
    CampaignStatus,
    OptOut,
    Content,
    TimeWindow,
    Throughput,
}

impl CheckName {
    /// Canonical reason string reported when this check fails.
    #[must_use]
    pub const fn failure_reason(self) -> &'static str {
        match self {
            Self::CampaignStatus => "campaign_not_approved",
            Self::OptOut => "opted_out",
            Self::Content => "content_violation",
            Self::TimeWindow => "time_window",
            Self::Throughput => "throughput_exceeded",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub name: CheckName,
    pub passed: bool,
    pub detail: Option<String>,
}

impl CheckResult {
    #[must_use]
    pub const fn pass(name: CheckName) -> Self {
        Self { name, passed: true, detail: None }
    }

    #[must_use]
    pub fn pass_with(name: CheckName, detail: impl Into<String>) -> Self {
        Self { name, passed: true, detail: Some(detail.into()) }
    }

    #[must_use]
    pub fn fail(name: CheckName, detail: impl Into<String>) -> Self {
        Self { name, passed: false, detail: Some(detail.into()) }
    }
}

/// Outcome of one compliance evaluation. Ephemeral: logged but not stored.
/// A deny always carries every failing check, not just the first.
#[derive(Debug, Clone, Serialize)]
pub struct Decision {
    pub allowed: bool,
    pub checks: Vec<CheckResult>,
}

impl Decision {
    #[must_use]
    pub fn from_checks(checks: Vec<CheckResult>) -> Self {
        let allowed = checks.iter().all(|c| c.passed);
        Self { allowed, checks }
    }

    #[must_use]
    pub fn deny(check: CheckResult) -> Self {
        Self { allowed: false, checks: vec![check] }
    }

    /// Reason strings of every failing check.
    #[must_use]
    pub fn reasons(&self) -> Vec<&'static str> {
        self.checks.iter().filter(|c| !c.passed).map(|c| c.name.failure_reason()).collect()
    }
}
