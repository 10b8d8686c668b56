use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Outbound,
    Inbound,
}

/// Delivery lifecycle of a tracked message.
///
/// States form a total order `queued < dispatched < sent < delivered`;
/// `failed` is terminal and reachable from any non-terminal state. Carrier
/// events may arrive out of order, so transitions are accepted only when
/// they advance past the most advanced point already reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryState {
    Queued,
    Dispatched,
    Sent,
    Delivered,
    Failed,
}

impl DeliveryState {
    const fn rank(self) -> u8 {
        match self {
            Self::Queued => 0,
            Self::Dispatched => 1,
            Self::Sent => 2,
            Self::Delivered => 3,
            Self::Failed => 4,
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Failed)
    }

    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            Self::Failed => true,
            Self::Queued => false,
            _ => next.rank() > self.rank(),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Dispatched => "dispatched",
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub id: Uuid,
    /// Gateway-assigned id; set exactly once when the dispatch call succeeds.
    pub external_id: Option<String>,
    pub direction: Direction,
    pub from: String,
    pub to: String,
    pub body: String,
    pub media_urls: Vec<String>,
    pub campaign_id: Option<Uuid>,
    pub segments: u32,
    pub cost: Option<f64>,
    pub state: DeliveryState,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Message {
    #[must_use]
    pub fn outbound(
        campaign_id: Option<Uuid>,
        from: String,
        to: String,
        body: String,
        media_urls: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        let segments = segment_count(&body);
        Self {
            id: Uuid::new_v4(),
            external_id: None,
            direction: Direction::Outbound,
            from,
            to,
            body,
            media_urls,
            campaign_id,
            segments,
            cost: None,
            state: DeliveryState::Queued,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Materializes an inbound message reported by the carrier. Inbound
    /// records have completed their lifecycle on arrival and are stored as
    /// `delivered`.
    #[must_use]
    pub fn inbound(external_id: Option<String>, from: String, to: String, body: String) -> Self {
        let now = Utc::now();
        let segments = segment_count(&body);
        Self {
            id: Uuid::new_v4(),
            external_id,
            direction: Direction::Inbound,
            from,
            to,
            body,
            media_urls: Vec::new(),
            campaign_id: None,
            segments,
            cost: None,
            state: DeliveryState::Delivered,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

const GSM7_BASIC: &str = "@£$¥èéùìòÇ\nØø\rÅåΔ_ΦΓΛΩΠΨΣΘΞÆæßÉ !\"#¤%&'()*+,-./0123456789:;<=>?¡ABCDEFGHIJKLMNOPQRSTUVWXYZÄÖÑܧ¿abcdefghijklmnopqrstuvwxyzäöñüà";
const GSM7_EXTENDED: &str = "^{}\\[~]|€";

/// Number of SMS segments the body occupies on the wire: GSM-7 bodies split
/// at 160/153 septets, anything else is UCS-2 and splits at 70/67 code units.
#[must_use]
pub fn segment_count(body: &str) -> u32 {
    let mut septets: u32 = 0;
    let mut gsm7 = true;
    for c in body.chars() {
        if GSM7_BASIC.contains(c) {
            septets += 1;
        } else if GSM7_EXTENDED.contains(c) {
            septets += 2;
        } else {
            gsm7 = false;
            break;
        }
    }

    if gsm7 {
        if septets <= 160 {
            1
        } else {
            septets.div_ceil(153)
        }
    } else {
        let units: u32 = body.chars().map(|c| c.len_utf16() as u32).sum();
        if units <= 70 { 1 } else { units.div_ceil(67) }
    }
}
