use crate::models::{
    sort_usage, AppUsageDelta, AppUsageTotal, DailyStats, HourlyStats, KeyStat, LifetimeStats,
    RawEvent, UsageRange,
};
use chrono::{Duration, NaiveDate};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence contract consumed by the aggregators.
///
/// Implementations must be safe to call from several threads at once and are
/// responsible for serializing conflicting writes themselves.
pub trait StatsStore: Send + Sync {
    /// Upserts the absolute counters for `day.date`.
    fn save_daily(&self, day: &DailyStats) -> StoreResult<()>;
    fn get_daily(&self, date: NaiveDate) -> StoreResult<Option<DailyStats>>;
    /// Inclusive on both ends, oldest first.
    fn get_daily_range(&self, start: NaiveDate, end: NaiveDate) -> StoreResult<Vec<DailyStats>>;

    /// Upserts the absolute counters for `(hour.date, hour.hour)`.
    fn save_hourly(&self, hour: &HourlyStats) -> StoreResult<()>;
    fn get_hourly(&self, date: NaiveDate, hour: u8) -> StoreResult<Option<HourlyStats>>;
    fn get_hourly_for_date(&self, date: NaiveDate) -> StoreResult<Vec<HourlyStats>>;

    /// Adds each row's count to whatever is stored for `(date, hour, key)`.
    fn save_key_stats_batch(&self, rows: &[KeyStat]) -> StoreResult<()>;
    /// Per-key totals for one day, most pressed first.
    fn get_key_stats(&self, date: NaiveDate) -> StoreResult<Vec<(String, u64)>>;

    fn save_raw_events_batch(&self, events: &[RawEvent]) -> StoreResult<()>;
    fn count_raw_events(&self) -> StoreResult<u64>;

    /// Additive: repeated saves for one `(date, hour, app)` sum.
    fn save_app_usage(
        &self,
        date: NaiveDate,
        hour: u8,
        app_name: &str,
        seconds: u64,
    ) -> StoreResult<()>;

    fn save_app_usage_batch(&self, rows: &[AppUsageDelta]) -> StoreResult<()> {
        for row in rows {
            self.save_app_usage(row.date, row.hour, &row.app_name, row.seconds)?;
        }
        Ok(())
    }

    fn get_app_usage(&self, range: UsageRange, today: NaiveDate) -> StoreResult<Vec<AppUsageTotal>>;

    /// Deletes rows dated strictly before `today - retention_days`.
    /// `retention_days <= 0` means keep forever and must not touch anything.
    fn cleanup_older_than(&self, retention_days: i32, today: NaiveDate) -> StoreResult<usize>;

    fn get_lifetime_stats(&self) -> StoreResult<LifetimeStats>;
}

/// `None` when nothing may be deleted.
pub fn retention_cutoff(retention_days: i32, today: NaiveDate) -> Option<NaiveDate> {
    if retention_days <= 0 {
        return None;
    }
    today.checked_sub_signed(Duration::days(i64::from(retention_days)))
}

#[derive(Debug, Default)]
struct MemoryTables {
    daily: BTreeMap<NaiveDate, DailyStats>,
    hourly: BTreeMap<(NaiveDate, u8), HourlyStats>,
    key_stats: BTreeMap<(NaiveDate, u8, String), u64>,
    raw_events: Vec<RawEvent>,
    app_usage: BTreeMap<(NaiveDate, u8, String), u64>,
}

/// In-process store with the same semantics as the SQLite one.
///
/// `set_failing(true)` makes every call return `StoreError::Unavailable`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<MemoryTables>,
    failing: AtomicBool,
    daily_saves: Mutex<Vec<DailyStats>>,
    hourly_saves: Mutex<Vec<HourlyStats>>,
    save_delay: Mutex<Option<std::time::Duration>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Makes every `save_daily` sleep first, to stand in for a slow disk.
    pub fn set_save_delay(&self, delay: Option<std::time::Duration>) {
        *self.save_delay.lock() = delay;
    }

    /// Every daily snapshot ever saved, in save order.
    pub fn daily_save_log(&self) -> Vec<DailyStats> {
        self.daily_saves.lock().clone()
    }

    pub fn hourly_save_log(&self) -> Vec<HourlyStats> {
        self.hourly_saves.lock().clone()
    }

    fn check(&self) -> StoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store switched off".to_string()));
        }
        Ok(())
    }
}

impl StatsStore for MemoryStore {
    fn save_daily(&self, day: &DailyStats) -> StoreResult<()> {
        self.check()?;
        let delay = *self.save_delay.lock();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        self.tables.lock().daily.insert(day.date, day.clone());
        self.daily_saves.lock().push(day.clone());
        Ok(())
    }

    fn get_daily(&self, date: NaiveDate) -> StoreResult<Option<DailyStats>> {
        self.check()?;
        Ok(self.tables.lock().daily.get(&date).cloned())
    }

    fn get_daily_range(&self, start: NaiveDate, end: NaiveDate) -> StoreResult<Vec<DailyStats>> {
        self.check()?;
        if start > end {
            return Ok(Vec::new());
        }
        Ok(self
            .tables
            .lock()
            .daily
            .range(start..=end)
            .map(|(_, d)| d.clone())
            .collect())
    }

    fn save_hourly(&self, hour: &HourlyStats) -> StoreResult<()> {
        self.check()?;
        self.tables
            .lock()
            .hourly
            .insert((hour.date, hour.hour), hour.clone());
        self.hourly_saves.lock().push(hour.clone());
        Ok(())
    }

    fn get_hourly(&self, date: NaiveDate, hour: u8) -> StoreResult<Option<HourlyStats>> {
        self.check()?;
        Ok(self.tables.lock().hourly.get(&(date, hour)).cloned())
    }

    fn get_hourly_for_date(&self, date: NaiveDate) -> StoreResult<Vec<HourlyStats>> {
        self.check()?;
        Ok(self
            .tables
            .lock()
            .hourly
            .range((date, 0)..=(date, 23))
            .map(|(_, h)| h.clone())
            .collect())
    }

    fn save_key_stats_batch(&self, rows: &[KeyStat]) -> StoreResult<()> {
        self.check()?;
        let mut tables = self.tables.lock();
        for row in rows {
            if row.count == 0 || row.key.trim().is_empty() {
                continue;
            }
            tables
                .key_stats
                .entry((row.date, row.hour, row.key.clone()))
                .and_modify(|v| *v = v.saturating_add(row.count))
                .or_insert(row.count);
        }
        Ok(())
    }

    fn get_key_stats(&self, date: NaiveDate) -> StoreResult<Vec<(String, u64)>> {
        self.check()?;
        let tables = self.tables.lock();
        let mut by_key: HashMap<String, u64> = HashMap::new();
        for ((d, _, key), count) in tables.key_stats.iter() {
            if *d != date {
                continue;
            }
            by_key
                .entry(key.clone())
                .and_modify(|v| *v = v.saturating_add(*count))
                .or_insert(*count);
        }
        let mut out: Vec<(String, u64)> = by_key.into_iter().collect();
        out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(out)
    }

    fn save_raw_events_batch(&self, events: &[RawEvent]) -> StoreResult<()> {
        self.check()?;
        self.tables.lock().raw_events.extend_from_slice(events);
        Ok(())
    }

    fn count_raw_events(&self) -> StoreResult<u64> {
        self.check()?;
        Ok(self.tables.lock().raw_events.len() as u64)
    }

    fn save_app_usage(
        &self,
        date: NaiveDate,
        hour: u8,
        app_name: &str,
        seconds: u64,
    ) -> StoreResult<()> {
        self.check()?;
        let name = app_name.trim();
        if name.is_empty() || seconds == 0 {
            return Ok(());
        }
        self.tables
            .lock()
            .app_usage
            .entry((date, hour, name.to_string()))
            .and_modify(|v| *v = v.saturating_add(seconds))
            .or_insert(seconds);
        Ok(())
    }

    fn get_app_usage(&self, range: UsageRange, today: NaiveDate) -> StoreResult<Vec<AppUsageTotal>> {
        self.check()?;
        let tables = self.tables.lock();
        let mut by_app: HashMap<String, u64> = HashMap::new();
        for ((date, _, app), seconds) in tables.app_usage.iter() {
            if !range.contains(*date, today) {
                continue;
            }
            by_app
                .entry(app.clone())
                .and_modify(|v| *v = v.saturating_add(*seconds))
                .or_insert(*seconds);
        }
        let mut out: Vec<AppUsageTotal> = by_app
            .into_iter()
            .map(|(app_name, total_seconds)| AppUsageTotal {
                app_name,
                total_seconds,
            })
            .collect();
        sort_usage(&mut out);
        Ok(out)
    }

    fn cleanup_older_than(&self, retention_days: i32, today: NaiveDate) -> StoreResult<usize> {
        let Some(cutoff) = retention_cutoff(retention_days, today) else {
            return Ok(0);
        };
        self.check()?;

        let mut tables = self.tables.lock();
        let before = tables.daily.len()
            + tables.hourly.len()
            + tables.key_stats.len()
            + tables.raw_events.len()
            + tables.app_usage.len();

        tables.daily.retain(|date, _| *date >= cutoff);
        tables.hourly.retain(|(date, _), _| *date >= cutoff);
        tables.key_stats.retain(|(date, _, _), _| *date >= cutoff);
        tables.raw_events.retain(|e| e.timestamp.date() >= cutoff);
        tables.app_usage.retain(|(date, _, _), _| *date >= cutoff);

        let after = tables.daily.len()
            + tables.hourly.len()
            + tables.key_stats.len()
            + tables.raw_events.len()
            + tables.app_usage.len();
        Ok(before - after)
    }

    fn get_lifetime_stats(&self) -> StoreResult<LifetimeStats> {
        self.check()?;
        let tables = self.tables.lock();
        Ok(LifetimeStats::from_days(tables.daily.values()))
    }
}
