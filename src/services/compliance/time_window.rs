use crate::config::ComplianceConfig;
use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;

/// Quiet-hours policy: sends are allowed only while the recipient's local
/// hour is inside `[open_hour, close_hour)`. Weekends and holidays get no
/// special treatment; campaigns opt out via their registry flag instead.
#[derive(Debug, Clone, Copy)]
pub struct TimeWindowPolicy {
    open_hour: u32,
    close_hour: u32,
}

impl TimeWindowPolicy {
    #[must_use]
    pub const fn new(open_hour: u32, close_hour: u32) -> Self {
        Self { open_hour, close_hour }
    }

    #[must_use]
    pub const fn from_config(config: &ComplianceConfig) -> Self {
        Self::new(config.quiet_open_hour, config.quiet_close_hour)
    }

    /// Evaluates the window in the recipient's timezone.
    ///
    /// # Errors
    /// Returns a human-readable detail string when the send is blocked.
    pub fn evaluate(&self, tz: Tz, at: DateTime<Utc>) -> Result<(), String> {
        let local = at.with_timezone(&tz);
        let hour = local.hour();
        if hour >= self.open_hour && hour < self.close_hour {
            Ok(())
        } else {
            Err(format!(
                "local time {} in {tz} is outside {:02}:00-{:02}:00",
                local.format("%H:%M"),
                self.open_hour,
                self.close_hour,
            ))
        }
    }
}

impl Default for TimeWindowPolicy {
    fn default() -> Self {
        Self::new(8, 21)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at_utc(hour: u32) -> DateTime<Utc> {
        // Mid-January: US Eastern is UTC-5, no DST ambiguity.
        Utc.with_ymd_and_hms(2024, 1, 15, hour, 0, 0).single().expect("valid timestamp")
    }

    #[test]
    fn afternoon_local_time_is_allowed() {
        let policy = TimeWindowPolicy::default();
        // 19:00 UTC == 14:00 America/New_York.
        assert!(policy.evaluate(Tz::America__New_York, at_utc(19)).is_ok());
    }

    #[test]
    fn early_morning_local_time_is_blocked() {
        let policy = TimeWindowPolicy::default();
        // 10:00 UTC == 05:00 America/New_York.
        let detail = policy.evaluate(Tz::America__New_York, at_utc(10)).expect_err("blocked");
        assert!(detail.contains("05:00"), "{detail}");
    }

    #[test]
    fn window_boundaries_are_half_open() {
        let policy = TimeWindowPolicy::default();
        // 13:00 UTC == 08:00 New York: first allowed hour.
        assert!(policy.evaluate(Tz::America__New_York, at_utc(13)).is_ok());
        // 02:00 UTC == 21:00 New York (previous day): first blocked hour.
        assert!(policy.evaluate(Tz::America__New_York, at_utc(2)).is_err());
    }

    #[test]
    fn same_instant_differs_by_timezone() {
        let policy = TimeWindowPolicy::default();
        let at = at_utc(19);
        assert!(policy.evaluate(Tz::America__New_York, at).is_ok());
        // 19:00 UTC == 09:00 in Honolulu, still inside the window.
        assert!(policy.evaluate(Tz::Pacific__Honolulu, at).is_ok());
        // 19:00 UTC == 04:00 next day in Tokyo.
        assert!(policy.evaluate(Tz::Asia__Tokyo, at).is_err());
    }
}
