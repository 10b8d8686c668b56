use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Registration state of a campaign in the external registry. Anything
/// other than `Approved` denies sends outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Pending,
    Approved,
    Rejected,
    Suspended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UseCase {
    Promotional,
    Authentication,
    CustomerCare,
    AccountNotification,
}

impl UseCase {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Promotional => "promotional",
            Self::Authentication => "authentication",
            Self::CustomerCare => "customer_care",
            Self::AccountNotification => "account_notification",
        }
    }
}

/// Read-only surface of the external campaign registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: Uuid,
    pub brand_id: Uuid,
    pub status: CampaignStatus,
    pub use_case: UseCase,
    /// Campaigns may declare an exemption from the quiet-hours window
    /// (e.g. time-critical authentication codes).
    #[serde(default)]
    pub quiet_hours_exempt: bool,
}

/// Throughput tier assigned to a brand by its trust/verification level.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BrandTier {
    pub capacity: u32,
    pub refill_per_sec: f64,
}
