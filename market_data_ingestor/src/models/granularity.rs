//! Request granularity: how far back to look ([`Period`]) and how wide each
//! bar is ([`Interval`]).
//!
//! Both are closed enumerations with the provider's string spelling (`"1d"`,
//! `"1mo"`, `"1wk"`). A [`Granularity`] pairs them after checking that the
//! combination is one the upstream will actually serve: minute bars only go
//! back a few days, hourly bars about two years.
//!
//! ```
//! use market_data_ingestor::models::granularity::{Granularity, Interval, Period};
//!
//! let g: Granularity = Granularity::parse("1mo", "1h").unwrap();
//! assert_eq!(g.period(), Period::OneMonth);
//! assert_eq!(g.interval(), Interval::OneHour);
//! assert!(Granularity::parse("1y", "1m").is_err());
//! ```

use std::{fmt, str::FromStr};

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GranularityError {
    #[error("unknown period: {0:?}")]
    UnknownPeriod(String),

    #[error("unknown interval: {0:?}")]
    UnknownInterval(String),

    #[error("interval {interval} is not available for period {period}: {reason}")]
    Unsupported {
        period: Period,
        interval: Interval,
        reason: &'static str,
    },
}

/// How far back a request reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "5d")]
    FiveDays,
    #[serde(rename = "1wk")]
    OneWeek,
    #[serde(rename = "1mo")]
    OneMonth,
    #[serde(rename = "3mo")]
    ThreeMonths,
    #[serde(rename = "6mo")]
    SixMonths,
    #[serde(rename = "1y")]
    OneYear,
    #[serde(rename = "2y")]
    TwoYears,
    #[serde(rename = "5y")]
    FiveYears,
    #[serde(rename = "10y")]
    TenYears,
    #[serde(rename = "max")]
    Max,
}

impl Period {
    pub const ALL: [Period; 11] = [
        Period::OneDay,
        Period::FiveDays,
        Period::OneWeek,
        Period::OneMonth,
        Period::ThreeMonths,
        Period::SixMonths,
        Period::OneYear,
        Period::TwoYears,
        Period::FiveYears,
        Period::TenYears,
        Period::Max,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Period::OneDay => "1d",
            Period::FiveDays => "5d",
            Period::OneWeek => "1wk",
            Period::OneMonth => "1mo",
            Period::ThreeMonths => "3mo",
            Period::SixMonths => "6mo",
            Period::OneYear => "1y",
            Period::TwoYears => "2y",
            Period::FiveYears => "5y",
            Period::TenYears => "10y",
            Period::Max => "max",
        }
    }

    /// Calendar span the period covers, counted back from "now".
    ///
    /// Months are 30 days and years 365 days; `max` is capped at ten years.
    pub fn lookback(self) -> Duration {
        match self {
            Period::OneDay => Duration::days(1),
            Period::FiveDays => Duration::days(5),
            Period::OneWeek => Duration::days(7),
            Period::OneMonth => Duration::days(30),
            Period::ThreeMonths => Duration::days(90),
            Period::SixMonths => Duration::days(180),
            Period::OneYear => Duration::days(365),
            Period::TwoYears => Duration::days(2 * 365),
            Period::FiveYears => Duration::days(5 * 365),
            Period::TenYears | Period::Max => Duration::days(10 * 365),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = GranularityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Period::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(needle))
            .ok_or_else(|| GranularityError::UnknownPeriod(s.to_string()))
    }
}

/// Width of one bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "2m")]
    TwoMinutes,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "60m")]
    SixtyMinutes,
    #[serde(rename = "90m")]
    NinetyMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "5d")]
    FiveDays,
    #[serde(rename = "1wk")]
    OneWeek,
    #[serde(rename = "1mo")]
    OneMonth,
    #[serde(rename = "3mo")]
    ThreeMonths,
}

impl Interval {
    pub const ALL: [Interval; 13] = [
        Interval::OneMinute,
        Interval::TwoMinutes,
        Interval::FiveMinutes,
        Interval::FifteenMinutes,
        Interval::ThirtyMinutes,
        Interval::SixtyMinutes,
        Interval::NinetyMinutes,
        Interval::OneHour,
        Interval::OneDay,
        Interval::FiveDays,
        Interval::OneWeek,
        Interval::OneMonth,
        Interval::ThreeMonths,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Interval::OneMinute => "1m",
            Interval::TwoMinutes => "2m",
            Interval::FiveMinutes => "5m",
            Interval::FifteenMinutes => "15m",
            Interval::ThirtyMinutes => "30m",
            Interval::SixtyMinutes => "60m",
            Interval::NinetyMinutes => "90m",
            Interval::OneHour => "1h",
            Interval::OneDay => "1d",
            Interval::FiveDays => "5d",
            Interval::OneWeek => "1wk",
            Interval::OneMonth => "1mo",
            Interval::ThreeMonths => "3mo",
        }
    }

    /// Nominal width of one bar (months are 30 days).
    pub fn duration(self) -> Duration {
        match self {
            Interval::OneMinute => Duration::minutes(1),
            Interval::TwoMinutes => Duration::minutes(2),
            Interval::FiveMinutes => Duration::minutes(5),
            Interval::FifteenMinutes => Duration::minutes(15),
            Interval::ThirtyMinutes => Duration::minutes(30),
            Interval::SixtyMinutes | Interval::OneHour => Duration::hours(1),
            Interval::NinetyMinutes => Duration::minutes(90),
            Interval::OneDay => Duration::days(1),
            Interval::FiveDays => Duration::days(5),
            Interval::OneWeek => Duration::weeks(1),
            Interval::OneMonth => Duration::days(30),
            Interval::ThreeMonths => Duration::days(90),
        }
    }

    /// Bars narrower than a trading day.
    pub fn is_intraday(self) -> bool {
        self.duration() < Duration::days(1)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = GranularityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Interval::ALL
            .into_iter()
            .find(|i| i.as_str().eq_ignore_ascii_case(needle))
            .ok_or_else(|| GranularityError::UnknownInterval(s.to_string()))
    }
}

/// A validated (period, interval) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawGranularity", into = "RawGranularity")]
pub struct Granularity {
    period: Period,
    interval: Interval,
}

#[derive(Serialize, Deserialize)]
struct RawGranularity {
    period: Period,
    interval: Interval,
}

impl TryFrom<RawGranularity> for Granularity {
    type Error = GranularityError;

    fn try_from(raw: RawGranularity) -> Result<Self, Self::Error> {
        Granularity::new(raw.period, raw.interval)
    }
}

impl From<Granularity> for RawGranularity {
    fn from(g: Granularity) -> Self {
        RawGranularity {
            period: g.period,
            interval: g.interval,
        }
    }
}

impl Granularity {
    /// Validate a combination.
    ///
    /// Rules:
    /// - `1m` bars need a period of at most 7 days
    /// - other sub-hour bars need a period of at most 60 days
    /// - hourly bars need a period of at most 730 days
    /// - a bar may not be wider than the period (except for `max`)
    pub fn new(period: Period, interval: Interval) -> Result<Self, GranularityError> {
        let span = period.lookback();
        let unsupported = |reason| GranularityError::Unsupported {
            period,
            interval,
            reason,
        };

        match interval {
            Interval::OneMinute if span > Duration::days(7) => {
                return Err(unsupported("1-minute bars only cover the last 7 days"));
            }
            Interval::TwoMinutes
            | Interval::FiveMinutes
            | Interval::FifteenMinutes
            | Interval::ThirtyMinutes
            | Interval::NinetyMinutes
                if span > Duration::days(60) =>
            {
                return Err(unsupported("sub-hour bars only cover the last 60 days"));
            }
            Interval::SixtyMinutes | Interval::OneHour if span > Duration::days(730) => {
                return Err(unsupported("hourly bars only cover the last 730 days"));
            }
            _ => {}
        }

        if period != Period::Max && interval.duration() > span {
            return Err(unsupported("interval is wider than the period"));
        }

        Ok(Self { period, interval })
    }

    /// Parse and validate from the provider spelling, e.g. `("6mo", "1d")`.
    pub fn parse(period: &str, interval: &str) -> Result<Self, GranularityError> {
        Self::new(period.parse()?, interval.parse()?)
    }

    pub const fn period(&self) -> Period {
        self.period
    }

    pub const fn interval(&self) -> Interval {
        self.interval
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.period, self.interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_period_and_interval_round_trips_through_its_string() {
        for p in Period::ALL {
            assert_eq!(p.as_str().parse::<Period>().unwrap(), p);
        }
        for i in Interval::ALL {
            assert_eq!(i.as_str().parse::<Interval>().unwrap(), i);
        }
    }

    #[test]
    fn parsing_is_case_insensitive_and_trims() {
        assert_eq!(" 1MO ".parse::<Period>().unwrap(), Period::OneMonth);
        assert_eq!("1WK".parse::<Interval>().unwrap(), Interval::OneWeek);
    }

    #[test]
    fn unknown_strings_are_named_in_the_error() {
        assert_eq!(
            "7d".parse::<Period>().unwrap_err(),
            GranularityError::UnknownPeriod("7d".into())
        );
        assert_eq!(
            "3h".parse::<Interval>().unwrap_err(),
            GranularityError::UnknownInterval("3h".into())
        );
    }

    #[test]
    fn dashboard_default_pairs_are_valid() {
        for (p, i) in [
            ("1d", "1m"),
            ("5d", "5m"),
            ("1mo", "1h"),
            ("3mo", "1d"),
            ("6mo", "1d"),
            ("1y", "1wk"),
            ("5y", "1mo"),
            ("max", "1mo"),
        ] {
            assert!(Granularity::parse(p, i).is_ok(), "{p}/{i} should be valid");
        }
    }

    #[test]
    fn provider_history_limits_are_enforced() {
        assert!(Granularity::parse("1mo", "1m").is_err());
        assert!(Granularity::parse("1wk", "1m").is_ok());
        assert!(Granularity::parse("3mo", "5m").is_err());
        assert!(Granularity::parse("1mo", "90m").is_ok());
        assert!(Granularity::parse("2y", "1h").is_ok());
        assert!(Granularity::parse("5y", "60m").is_err());
    }

    #[test]
    fn interval_wider_than_period_is_rejected() {
        let err = Granularity::parse("1d", "1wk").unwrap_err();
        assert!(matches!(
            err,
            GranularityError::Unsupported {
                period: Period::OneDay,
                interval: Interval::OneWeek,
                ..
            }
        ));
        assert!(Granularity::parse("max", "3mo").is_ok());
    }

    #[test]
    fn granularity_deserialization_validates() {
        let ok: Granularity =
            serde_json::from_str(r#"{"period":"6mo","interval":"1d"}"#).unwrap();
        assert_eq!(ok.to_string(), "6mo/1d");

        let bad = serde_json::from_str::<Granularity>(r#"{"period":"10y","interval":"1m"}"#);
        assert!(bad.is_err());
    }
}
