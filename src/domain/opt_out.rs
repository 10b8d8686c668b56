use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Scope of a consent withdrawal, from narrowest to widest. Lookups widen:
/// a candidate is blocked by a record at its campaign, its brand, or the
/// global scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "scope", content = "id", rename_all = "lowercase")]
pub enum OptOutScope {
    Campaign(Uuid),
    Brand(Uuid),
    Global,
}

impl OptOutScope {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Campaign(_) => "campaign",
            Self::Brand(_) => "brand",
            Self::Global => "global",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OptOutMethod {
    ReplyKeyword,
    Manual,
    Programmatic,
}

/// One withdrawal of consent. Records are append-only: a later global
/// opt-out supersedes a campaign-scoped one logically but never overwrites
/// it, and nothing here deletes a record.
#[derive(Debug, Clone, Serialize)]
pub struct OptOutRecord {
    pub phone: String,
    #[serde(flatten)]
    pub scope: OptOutScope,
    pub method: OptOutMethod,
    pub origin_message_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl OptOutRecord {
    #[must_use]
    pub fn from_keyword(phone: String, scope: OptOutScope, origin_message_id: Uuid) -> Self {
        Self {
            phone,
            scope,
            method: OptOutMethod::ReplyKeyword,
            origin_message_id: Some(origin_message_id),
            created_at: Utc::now(),
        }
    }
}
