use crate::domain::campaign::{BrandTier, Campaign};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::Deserialize;
use std::path::Path;
use uuid::Uuid;

pub mod timezone;

/// Read-only surface of the external campaign/brand registry. The real
/// registry lives in the registration subsystem; this crate only consumes
/// campaign status, use case and brand throughput tiers.
#[async_trait]
pub trait CampaignRegistry: Send + Sync + std::fmt::Debug {
    async fn get_campaign(&self, id: Uuid) -> Option<Campaign>;
    async fn get_brand_tier(&self, brand_id: Uuid) -> Option<BrandTier>;
    /// Campaign that owns a sending number, used to scope inbound keyword
    /// handling.
    async fn campaign_for_number(&self, number: &str) -> Option<Campaign>;
}

/// In-process registry, seedable from a JSON file at boot.
#[derive(Debug, Default)]
pub struct StaticCampaignRegistry {
    campaigns: DashMap<Uuid, Campaign>,
    tiers: DashMap<Uuid, BrandTier>,
    numbers: DashMap<String, Uuid>,
}

impl StaticCampaignRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_campaign(&self, campaign: Campaign) {
        self.campaigns.insert(campaign.id, campaign);
    }

    pub fn insert_brand_tier(&self, brand_id: Uuid, tier: BrandTier) {
        self.tiers.insert(brand_id, tier);
    }

    pub fn assign_number(&self, number: impl Into<String>, campaign_id: Uuid) {
        self.numbers.insert(number.into(), campaign_id);
    }

    pub fn apply_seed(&self, seed: RegistrySeed) {
        for campaign in seed.campaigns {
            self.insert_campaign(campaign);
        }
        for brand in seed.brands {
            self.insert_brand_tier(brand.id, brand.tier);
        }
        for assignment in seed.numbers {
            self.assign_number(assignment.number, assignment.campaign_id);
        }
    }
}

#[async_trait]
impl CampaignRegistry for StaticCampaignRegistry {
    async fn get_campaign(&self, id: Uuid) -> Option<Campaign> {
        self.campaigns.get(&id).map(|c| c.clone())
    }

    async fn get_brand_tier(&self, brand_id: Uuid) -> Option<BrandTier> {
        self.tiers.get(&brand_id).map(|t| *t)
    }

    async fn campaign_for_number(&self, number: &str) -> Option<Campaign> {
        let campaign_id = *self.numbers.get(number)?;
        self.campaigns.get(&campaign_id).map(|c| c.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistrySeed {
    #[serde(default)]
    pub campaigns: Vec<Campaign>,
    #[serde(default)]
    pub brands: Vec<BrandSeed>,
    #[serde(default)]
    pub numbers: Vec<NumberAssignment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrandSeed {
    pub id: Uuid,
    #[serde(flatten)]
    pub tier: BrandTier,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NumberAssignment {
    pub number: String,
    pub campaign_id: Uuid,
}

impl RegistrySeed {
    /// Loads a seed file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}
