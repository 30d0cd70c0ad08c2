use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Seconds of focus to add to `(date, hour, app_name)`; repeated deltas sum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppUsageDelta {
    pub date: NaiveDate,
    pub hour: u8,
    pub app_name: String,
    pub seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppUsageTotal {
    pub app_name: String,
    pub total_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageRange {
    Today,
    Week,
    Month,
    Lifetime,
}

impl UsageRange {
    /// Earliest date (inclusive) the range covers, `None` meaning unbounded.
    pub fn start_date(&self, today: NaiveDate) -> Option<NaiveDate> {
        match self {
            UsageRange::Today => Some(today),
            UsageRange::Week => today.checked_sub_signed(Duration::days(7)),
            UsageRange::Month => today.checked_sub_signed(Duration::days(30)),
            UsageRange::Lifetime => None,
        }
    }

    pub fn contains(&self, date: NaiveDate, today: NaiveDate) -> bool {
        match self {
            UsageRange::Today => date == today,
            _ => self.start_date(today).map_or(true, |start| date >= start),
        }
    }
}

/// Sorts totals most-used first, ties broken by name for stable output.
pub fn sort_usage(totals: &mut [AppUsageTotal]) {
    totals.sort_by(|a, b| {
        b.total_seconds
            .cmp(&a.total_seconds)
            .then_with(|| a.app_name.cmp(&b.app_name))
    });
}
