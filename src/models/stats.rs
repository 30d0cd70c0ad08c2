use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// Counter shape shared by daily and hourly buckets.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Counters {
    #[serde(default)]
    pub key_count: u64,
    #[serde(default)]
    pub mouse_distance_m: f64,
    #[serde(default)]
    pub left_clicks: u64,
    #[serde(default)]
    pub right_clicks: u64,
    #[serde(default)]
    pub middle_clicks: u64,
    #[serde(default)]
    pub scroll_distance_m: f64,
}

impl Counters {
    pub fn is_empty(&self) -> bool {
        self.key_count == 0
            && self.left_clicks == 0
            && self.right_clicks == 0
            && self.middle_clicks == 0
            && self.mouse_distance_m <= 0.0
            && self.scroll_distance_m <= 0.0
    }

    pub fn total_clicks(&self) -> u64 {
        self.left_clicks
            .saturating_add(self.right_clicks)
            .saturating_add(self.middle_clicks)
    }

    pub fn add_key(&mut self) {
        self.key_count = self.key_count.saturating_add(1);
    }

    pub fn add_click(&mut self, button: MouseButton) -> bool {
        let slot = match button {
            MouseButton::Left => &mut self.left_clicks,
            MouseButton::Right => &mut self.right_clicks,
            MouseButton::Middle => &mut self.middle_clicks,
            MouseButton::Other(_) => return false,
        };
        *slot = slot.saturating_add(1);
        true
    }

    pub fn add_mouse_distance(&mut self, meters: f64) {
        if meters.is_finite() && meters > 0.0 {
            self.mouse_distance_m += meters;
        }
    }

    pub fn add_scroll_distance(&mut self, meters: f64) {
        if meters.is_finite() && meters > 0.0 {
            self.scroll_distance_m += meters;
        }
    }

    pub fn merge(&mut self, other: &Counters) {
        self.key_count = self.key_count.saturating_add(other.key_count);
        self.left_clicks = self.left_clicks.saturating_add(other.left_clicks);
        self.right_clicks = self.right_clicks.saturating_add(other.right_clicks);
        self.middle_clicks = self.middle_clicks.saturating_add(other.middle_clicks);
        self.add_mouse_distance(other.mouse_distance_m);
        self.add_scroll_distance(other.scroll_distance_m);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyStats {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub counters: Counters,
}

impl DailyStats {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            counters: Counters::default(),
        }
    }

    pub fn date_key(&self) -> String {
        date_key(self.date)
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyStats {
    pub date: NaiveDate,
    pub hour: u8,
    #[serde(flatten)]
    pub counters: Counters,
}

impl HourlyStats {
    pub fn new(date: NaiveDate, hour: u8) -> Self {
        Self {
            date,
            hour: hour.min(23),
            counters: Counters::default(),
        }
    }

    pub fn starting_at(at: NaiveDateTime) -> Self {
        Self::new(at.date(), hour_of(at))
    }

    pub fn covers(&self, at: NaiveDateTime) -> bool {
        self.date == at.date() && self.hour == hour_of(at)
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

/// One flushed row of the per-hour key frequency map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyStat {
    pub date: NaiveDate,
    pub hour: u8,
    pub key: String,
    pub count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Other(u8),
}

impl MouseButton {
    /// Column value for stored raw events; extra buttons keep their index as
    /// `other:<n>`.
    pub fn storage_key(&self) -> String {
        match self {
            MouseButton::Left => "left".to_string(),
            MouseButton::Right => "right".to_string(),
            MouseButton::Middle => "middle".to_string(),
            MouseButton::Other(n) => format!("other:{n}"),
        }
    }

    pub fn from_storage_key(raw: &str) -> Option<Self> {
        match raw {
            "left" => Some(MouseButton::Left),
            "right" => Some(MouseButton::Right),
            "middle" => Some(MouseButton::Middle),
            _ => raw
                .strip_prefix("other:")
                .and_then(|n| n.parse().ok())
                .map(MouseButton::Other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawEventKind {
    KeyPress,
    MouseMove,
    MouseClick,
    MouseScroll,
}

impl RawEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RawEventKind::KeyPress => "key_press",
            RawEventKind::MouseMove => "mouse_move",
            RawEventKind::MouseClick => "mouse_click",
            RawEventKind::MouseScroll => "mouse_scroll",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "key_press" => Some(RawEventKind::KeyPress),
            "mouse_move" => Some(RawEventKind::MouseMove),
            "mouse_click" => Some(RawEventKind::MouseClick),
            "mouse_scroll" => Some(RawEventKind::MouseScroll),
            _ => None,
        }
    }
}

/// Detailed event record, only collected when raw event logging is enabled.
///
/// `key` is left empty unless keystroke content logging is enabled as well.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    pub timestamp: NaiveDateTime,
    pub kind: RawEventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button: Option<MouseButton>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

impl RawEvent {
    pub fn new(timestamp: NaiveDateTime, kind: RawEventKind) -> Self {
        Self {
            timestamp,
            kind,
            key: None,
            button: None,
            value: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifetimeStats {
    pub total_keys: u64,
    pub total_mouse_distance_m: f64,
    pub total_left_clicks: u64,
    pub total_right_clicks: u64,
    pub total_middle_clicks: u64,
    pub total_scroll_distance_m: f64,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub active_day_count: u32,
}

impl Default for LifetimeStats {
    fn default() -> Self {
        Self {
            total_keys: 0,
            total_mouse_distance_m: 0.0,
            total_left_clicks: 0,
            total_right_clicks: 0,
            total_middle_clicks: 0,
            total_scroll_distance_m: 0.0,
            first_date: None,
            last_date: None,
            active_day_count: 0,
        }
    }
}

impl LifetimeStats {
    /// Folds stored daily rows; days without any activity are skipped entirely.
    pub fn from_days<'a>(days: impl IntoIterator<Item = &'a DailyStats>) -> Self {
        let mut out = Self::default();
        for day in days {
            if day.is_empty() {
                continue;
            }
            let c = &day.counters;
            out.total_keys = out.total_keys.saturating_add(c.key_count);
            out.total_left_clicks = out.total_left_clicks.saturating_add(c.left_clicks);
            out.total_right_clicks = out.total_right_clicks.saturating_add(c.right_clicks);
            out.total_middle_clicks = out.total_middle_clicks.saturating_add(c.middle_clicks);
            out.total_mouse_distance_m += c.mouse_distance_m.max(0.0);
            out.total_scroll_distance_m += c.scroll_distance_m.max(0.0);
            out.first_date = Some(match out.first_date {
                Some(existing) => existing.min(day.date),
                None => day.date,
            });
            out.last_date = Some(match out.last_date {
                Some(existing) => existing.max(day.date),
                None => day.date,
            });
            out.active_day_count = out.active_day_count.saturating_add(1);
        }
        out
    }

    pub fn total_clicks(&self) -> u64 {
        self.total_left_clicks
            .saturating_add(self.total_right_clicks)
            .saturating_add(self.total_middle_clicks)
    }

    pub fn tracking_period_description(&self) -> String {
        match (self.first_date, self.last_date) {
            (Some(first), Some(last)) if first == last => {
                format!("1 active day ({})", date_key(first))
            }
            (Some(first), Some(last)) => format!(
                "{} active days ({} to {})",
                self.active_day_count,
                date_key(first),
                date_key(last)
            ),
            _ => "No activity recorded yet".to_string(),
        }
    }
}

pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn parse_date_key(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

pub fn hour_of(at: NaiveDateTime) -> u8 {
    // `hour()` is always 0..=23
    at.hour() as u8
}
