//! `rate(N unit)` schedules: pure, stateless, "N units after the last
//! reference point".

use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateUnit {
    Minute,
    Hour,
    Day,
}

impl RateUnit {
    fn parse(word: &str) -> Option<Self> {
        match word {
            "minute" | "minutes" => Some(RateUnit::Minute),
            "hour" | "hours" => Some(RateUnit::Hour),
            "day" | "days" => Some(RateUnit::Day),
            _ => None,
        }
    }

    fn duration(self, n: i64) -> Duration {
        match self {
            RateUnit::Minute => Duration::minutes(n),
            RateUnit::Hour => Duration::hours(n),
            RateUnit::Day => Duration::days(n),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Rate {
    pub n: i64,
    pub unit: RateUnit,
}

impl Rate {
    /// Parse `"N unit"` (the content between `rate(` and `)`, already
    /// trimmed). AWS requires the unit be singular iff `N == 1`, but we
    /// accept either form — the wire contract is generous here and a
    /// strict parser would reject payloads real control planes emit.
    pub fn parse(body: &str) -> Option<Self> {
        let mut parts = body.split_whitespace();
        let n: i64 = parts.next()?.parse().ok()?;
        let unit = RateUnit::parse(parts.next()?)?;
        if parts.next().is_some() || n <= 0 {
            return None;
        }
        Some(Rate { n, unit })
    }

    /// The only `next` consistent with purity and "never fires at `after`
    /// itself": `after + n * unit`.
    pub fn next(&self, after: DateTime<Utc>) -> DateTime<Utc> {
        after + self.unit.duration(self.n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_plural_and_singular() {
        assert!(Rate::parse("5 minutes").is_some());
        assert!(Rate::parse("1 minute").is_some());
        assert!(Rate::parse("1 minutes").is_some());
    }

    #[test]
    fn rejects_zero_and_negative() {
        assert!(Rate::parse("0 minutes").is_none());
        assert!(Rate::parse("-1 minutes").is_none());
    }

    #[test]
    fn rejects_unknown_unit() {
        assert!(Rate::parse("5 fortnights").is_none());
    }

    #[test]
    fn rejects_trailing_garbage() {
        assert!(Rate::parse("5 minutes now").is_none());
    }

    #[test]
    fn next_is_after_plus_n_units() {
        let rate = Rate::parse("30 minutes").unwrap();
        let after = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let got = rate.next(after);
        assert_eq!(got, after + Duration::minutes(30));
        assert!(got > after);
    }

    #[test]
    fn round_trip_law_bounds() {
        // next(t) must land in [t + N*unit, t + N*unit], i.e. exactly one
        // step — never double-fires, never skips.
        let rate = Rate::parse("1 hours").unwrap();
        let after = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let got = rate.next(after);
        assert!(got >= after + Duration::hours(1));
        assert!(got < after + Duration::hours(2));
    }
}
