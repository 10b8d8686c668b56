use async_trait::async_trait;
use chrono_tz::Tz;
use dashmap::DashMap;

/// External number-metadata collaborator: maps a phone number to the IANA
/// timezone its region observes.
#[async_trait]
pub trait NumberLookup: Send + Sync + std::fmt::Debug {
    async fn resolve(&self, number: &str) -> Option<Tz>;
}

/// NANP area-code prefix table. Good enough for U.S. long codes; numbers
/// whose area code is absent resolve to `None` and are treated as blocked
/// by the time-window check.
#[derive(Debug, Default)]
pub struct PrefixNumberLookup {
    area_codes: DashMap<String, Tz>,
}

impl PrefixNumberLookup {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_default_table() -> Self {
        let lookup = Self::new();
        for (code, tz) in [
            ("212", Tz::America__New_York),
            ("315", Tz::America__New_York),
            ("617", Tz::America__New_York),
            ("404", Tz::America__New_York),
            ("305", Tz::America__New_York),
            ("312", Tz::America__Chicago),
            ("214", Tz::America__Chicago),
            ("504", Tz::America__Chicago),
            ("612", Tz::America__Chicago),
            ("303", Tz::America__Denver),
            ("505", Tz::America__Denver),
            ("602", Tz::America__Phoenix),
            ("213", Tz::America__Los_Angeles),
            ("415", Tz::America__Los_Angeles),
            ("206", Tz::America__Los_Angeles),
            ("503", Tz::America__Los_Angeles),
            ("808", Tz::Pacific__Honolulu),
            ("907", Tz::America__Anchorage),
        ] {
            lookup.area_codes.insert(code.to_string(), tz);
        }
        lookup
    }

    pub fn insert(&self, area_code: impl Into<String>, tz: Tz) {
        self.area_codes.insert(area_code.into(), tz);
    }

    fn area_code_of(number: &str) -> Option<&str> {
        let digits = number.strip_prefix("+1").or_else(|| number.strip_prefix('1')).unwrap_or(number);
        let digits = digits.strip_prefix('+').unwrap_or(digits);
        (digits.len() >= 10).then(|| &digits[..3])
    }
}

#[async_trait]
impl NumberLookup for PrefixNumberLookup {
    async fn resolve(&self, number: &str) -> Option<Tz> {
        let code = Self::area_code_of(number)?;
        self.area_codes.get(code).map(|tz| *tz)
    }
}
