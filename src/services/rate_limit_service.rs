use crate::domain::campaign::BrandTier;
use dashmap::DashMap;
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct Metrics {
    pub decisions_total: Counter<u64>,
}

impl Metrics {
    #[must_use]
    fn new() -> Self {
        let meter = global::meter("mercury-server");
        Self {
            decisions_total: meter
                .u64_counter("mercury_rate_decisions_total")
                .with_description("Throughput decisions (granted/throttled)")
                .build(),
        }
    }
}

/// Outcome of one acquisition attempt.
#[derive(Debug, Clone, Copy)]
pub struct RateDecision {
    pub granted: bool,
    /// How long until one token will be available; set only on denial.
    pub retry_after: Option<Duration>,
}

#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    capacity: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(tier: BrandTier, now: Instant) -> Self {
        Self {
            tokens: f64::from(tier.capacity),
            capacity: f64::from(tier.capacity),
            refill_per_sec: tier.refill_per_sec,
            last_refill: now,
        }
    }

    /// Refill is computed lazily from elapsed time; no background timer.
    fn refill(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;
    }

    /// Tier changes from the external registry reset the bucket.
    fn apply_tier(&mut self, tier: BrandTier, now: Instant) {
        let capacity = f64::from(tier.capacity);
        if (self.capacity - capacity).abs() > f64::EPSILON
            || (self.refill_per_sec - tier.refill_per_sec).abs() > f64::EPSILON
        {
            *self = Self::new(tier, now);
        }
    }

    fn retry_after(&self) -> Duration {
        if self.refill_per_sec <= 0.0 {
            return Duration::MAX;
        }
        Duration::from_secs_f64((1.0 - self.tokens).max(0.0) / self.refill_per_sec)
    }

    fn take(&mut self, now: Instant) -> RateDecision {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            RateDecision { granted: true, retry_after: None }
        } else {
            RateDecision { granted: false, retry_after: Some(self.retry_after()) }
        }
    }

    fn peek(&mut self, now: Instant) -> RateDecision {
        self.refill(now);
        if self.tokens >= 1.0 {
            RateDecision { granted: true, retry_after: None }
        } else {
            RateDecision { granted: false, retry_after: Some(self.retry_after()) }
        }
    }
}

/// Per-scope token-bucket throughput limiter.
///
/// Buckets live in a keyed map guarded per entry; unrelated campaigns never
/// contend on a shared lock, and no lock is held across I/O.
#[derive(Debug)]
pub struct RateGovernor {
    buckets: DashMap<Uuid, Mutex<TokenBucket>>,
    metrics: Metrics,
}

impl RateGovernor {
    #[must_use]
    pub fn new() -> Self {
        Self { buckets: DashMap::new(), metrics: Metrics::new() }
    }

    /// Atomically takes one token for the scope, creating the bucket from
    /// the tier on first use. The successful acquire IS the reservation:
    /// callers that are granted a token are expected to dispatch.
    pub fn try_acquire(&self, scope_id: Uuid, tier: BrandTier) -> RateDecision {
        let decision = self.with_bucket(scope_id, tier, TokenBucket::take);
        self.record(decision);
        decision
    }

    /// Non-consuming variant used for reporting when another compliance
    /// check already failed the candidate.
    pub fn peek(&self, scope_id: Uuid, tier: BrandTier) -> RateDecision {
        self.with_bucket(scope_id, tier, TokenBucket::peek)
    }

    fn with_bucket(
        &self,
        scope_id: Uuid,
        tier: BrandTier,
        op: impl FnOnce(&mut TokenBucket, Instant) -> RateDecision,
    ) -> RateDecision {
        let now = Instant::now();
        let entry = self
            .buckets
            .entry(scope_id)
            .or_insert_with(|| Mutex::new(TokenBucket::new(tier, now)));
        let mut bucket = entry.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        bucket.apply_tier(tier, now);
        op(&mut bucket, now)
    }

    fn record(&self, decision: RateDecision) {
        let status = if decision.granted { "granted" } else { "throttled" };
        if let Some(after) = decision.retry_after {
            tracing::debug!(retry_after_ms = after.as_millis() as u64, "Throughput exceeded");
        }
        self.metrics.decisions_total.add(1, &[KeyValue::new("status", status)]);
    }
}

impl Default for RateGovernor {
    fn default() -> Self {
        Self::new()
    }
}
