//! Calendar handling: request windows, the reference "today", and the
//! normalizer that turns provider timestamps into dates.

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::AnalysisError;

/// Inclusive `[start, end]` date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, AnalysisError> {
        if start > end {
            return Err(AnalysisError::InvalidInput(format!(
                "window start {} is after end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// Window of `days` days ending at `end`.
    pub fn trailing(end: NaiveDate, days: u32) -> Self {
        let start = end
            .checked_sub_days(Days::new(days as u64))
            .unwrap_or(NaiveDate::MIN);
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Number of days between start and end (0 for a single-day window).
    pub fn span_days(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}

/// Source of "today" for relative timestamps. Always UTC.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReferenceClock {
    #[default]
    SystemUtc,
    Fixed(NaiveDate),
}

impl ReferenceClock {
    pub fn today(&self) -> NaiveDate {
        match self {
            ReferenceClock::SystemUtc => Utc::now().date_naive(),
            ReferenceClock::Fixed(date) => *date,
        }
    }
}

const RECENCY_TOKENS: &[&str] = &[
    "hour", "hours", "minute", "minutes", "min", "mins", "second", "seconds",
];

/// Resolves heterogeneous timestamp strings to calendar dates relative to a
/// pinned `today`.
#[derive(Debug, Clone, Copy)]
pub struct DateNormalizer {
    today: NaiveDate,
}

impl DateNormalizer {
    pub fn new(today: NaiveDate) -> Self {
        Self { today }
    }

    pub fn from_clock(clock: &ReferenceClock) -> Self {
        Self::new(clock.today())
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// Parse `raw` into a date. Returns `None` for anything unrecognized.
    ///
    /// Precedence: ISO prefix, "N day(s) ago", recency words, "yesterday",
    /// "Mon D, YYYY" / "Month D, YYYY", "Mon D" in the current year, and
    /// finally RFC 2822 feed timestamps.
    pub fn parse(&self, raw: &str) -> Option<NaiveDate> {
        let text = raw.trim();
        if text.is_empty() {
            return None;
        }

        if let Some(date) = parse_iso_prefix(text) {
            return Some(date);
        }

        let lower = text.to_lowercase();
        let tokens: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();

        // Checked before the recency words so "1 day, 3 hours ago" is not today.
        if let Some(days) = days_ago(&tokens) {
            return self.today.checked_sub_days(Days::new(days));
        }

        let just_now = tokens.windows(2).any(|w| w[0] == "just" && w[1] == "now");
        if just_now || tokens.iter().any(|t| RECENCY_TOKENS.contains(t)) {
            return Some(self.today);
        }

        if tokens.contains(&"yesterday") {
            return self.today.pred_opt();
        }

        parse_month_day_year(text)
            .or_else(|| parse_month_day(text, self.today.year()))
            .or_else(|| {
                DateTime::parse_from_rfc2822(text)
                    .ok()
                    .map(|dt| dt.with_timezone(&Utc).date_naive())
            })
    }
}

fn parse_iso_prefix(text: &str) -> Option<NaiveDate> {
    let prefix = text.get(..10)?;
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
}

/// `<N> day(s) ... ago`. A non-numeric N yields `None`.
fn days_ago(tokens: &[&str]) -> Option<u64> {
    tokens.windows(2).enumerate().find_map(|(i, pair)| {
        let is_day_unit = pair[1] == "day" || pair[1] == "days";
        let followed_by_ago = tokens[i + 2..].contains(&"ago");
        if is_day_unit && followed_by_ago {
            pair[0].parse::<u64>().ok()
        } else {
            None
        }
    })
}

fn parse_with_month_formats(candidate: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(candidate, "%b %d %Y")
        .or_else(|_| NaiveDate::parse_from_str(candidate, "%B %d %Y"))
        .ok()
}

/// "Jan 5, 2025" or "January 5, 2025 10:00 a.m. ET"; anything after the year
/// is ignored.
fn parse_month_day_year(text: &str) -> Option<NaiveDate> {
    let (month_day, rest) = text.split_once(',')?;
    let year = rest.split_whitespace().next()?;
    if year.len() != 4 || !year.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    parse_with_month_formats(&format!("{} {}", month_day.trim(), year))
}

fn parse_month_day(text: &str, year: i32) -> Option<NaiveDate> {
    parse_with_month_formats(&format!("{} {}", text, year))
}
