use crate::core::store::{retention_cutoff, StatsStore, StoreResult};
use crate::models::stats::{date_key, parse_date_key};
use crate::models::{
    AppUsageDelta, AppUsageTotal, Counters, DailyStats, HourlyStats, KeyStat, LifetimeStats,
    MouseButton, RawEvent, RawEventKind, UsageRange,
};
use chrono::{NaiveDate, NaiveDateTime};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const SCHEMA_VERSION: i64 = 4;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

const MIGRATIONS: &[(i64, &str)] = &[
    (
        1,
        r#"
CREATE TABLE IF NOT EXISTS daily_stats (
  date TEXT PRIMARY KEY,
  key_count INTEGER NOT NULL DEFAULT 0,
  mouse_distance REAL NOT NULL DEFAULT 0,
  left_clicks INTEGER NOT NULL DEFAULT 0,
  right_clicks INTEGER NOT NULL DEFAULT 0,
  middle_clicks INTEGER NOT NULL DEFAULT 0,
  scroll_distance REAL NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS hourly_stats (
  date TEXT NOT NULL,
  hour INTEGER NOT NULL,
  key_count INTEGER NOT NULL DEFAULT 0,
  mouse_distance REAL NOT NULL DEFAULT 0,
  left_clicks INTEGER NOT NULL DEFAULT 0,
  right_clicks INTEGER NOT NULL DEFAULT 0,
  middle_clicks INTEGER NOT NULL DEFAULT 0,
  scroll_distance REAL NOT NULL DEFAULT 0,
  PRIMARY KEY (date, hour)
);
CREATE INDEX IF NOT EXISTS idx_hourly_stats_date ON hourly_stats(date);
"#,
    ),
    (
        2,
        r#"
CREATE TABLE IF NOT EXISTS key_stats (
  date TEXT NOT NULL,
  hour INTEGER NOT NULL,
  key_code TEXT NOT NULL,
  count INTEGER NOT NULL DEFAULT 0,
  PRIMARY KEY (date, hour, key_code)
);
CREATE INDEX IF NOT EXISTS idx_key_stats_date ON key_stats(date);
"#,
    ),
    (
        3,
        r#"
CREATE TABLE IF NOT EXISTS raw_events (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  date TEXT NOT NULL,
  timestamp TEXT NOT NULL,
  event_type TEXT NOT NULL,
  key_code TEXT,
  button TEXT,
  value REAL
);
CREATE INDEX IF NOT EXISTS idx_raw_events_date ON raw_events(date);
"#,
    ),
    (
        4,
        r#"
CREATE TABLE IF NOT EXISTS app_usage_stats (
  date TEXT NOT NULL,
  hour INTEGER NOT NULL,
  app_name TEXT NOT NULL,
  seconds_used INTEGER NOT NULL DEFAULT 0,
  PRIMARY KEY (date, hour, app_name)
);
CREATE INDEX IF NOT EXISTS idx_app_usage_date ON app_usage_stats(date);
CREATE INDEX IF NOT EXISTS idx_app_usage_app ON app_usage_stats(app_name);
CREATE INDEX IF NOT EXISTS idx_app_usage_date_app ON app_usage_stats(date, app_name);
"#,
    ),
];

/// SQLite-backed [`StatsStore`]. One connection, serialized behind a mutex.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

fn to_i64(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

fn to_u64(v: i64) -> u64 {
    u64::try_from(v).unwrap_or(0)
}

fn open_write_conn(path: &Path) -> StoreResult<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(Duration::from_secs(2))?;
    // journal_mode returns a row, so pragma_update would reject it
    let _: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;
    Ok(conn)
}

fn current_version(conn: &Connection) -> StoreResult<i64> {
    conn.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS schema_version (
  version INTEGER PRIMARY KEY,
  applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    )?;
    let version: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(version.unwrap_or(0))
}

fn migrate(conn: &mut Connection) -> StoreResult<()> {
    let from = current_version(conn)?;
    if from >= SCHEMA_VERSION {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for (version, sql) in MIGRATIONS {
        if *version <= from {
            continue;
        }
        tx.execute_batch(sql)?;
        tx.execute(
            "INSERT OR REPLACE INTO schema_version(version) VALUES (?1)",
            params![version],
        )?;
    }
    tx.commit()?;
    tracing::debug!(from, to = SCHEMA_VERSION, "history db schema migrated");
    Ok(())
}

fn counters_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Counters> {
    Ok(Counters {
        key_count: to_u64(row.get(offset)?),
        mouse_distance_m: row.get(offset + 1)?,
        left_clicks: to_u64(row.get(offset + 2)?),
        right_clicks: to_u64(row.get(offset + 3)?),
        middle_clicks: to_u64(row.get(offset + 4)?),
        scroll_distance_m: row.get(offset + 5)?,
    })
}

fn daily_from_row(row: &Row<'_>) -> rusqlite::Result<Option<DailyStats>> {
    let raw: String = row.get(0)?;
    let Some(date) = parse_date_key(&raw) else {
        return Ok(None);
    };
    Ok(Some(DailyStats {
        date,
        counters: counters_from_row(row, 1)?,
    }))
}

fn hourly_from_row(row: &Row<'_>) -> rusqlite::Result<Option<HourlyStats>> {
    let raw: String = row.get(0)?;
    let hour: i64 = row.get(1)?;
    let (Some(date), Ok(hour)) = (parse_date_key(&raw), u8::try_from(hour)) else {
        return Ok(None);
    };
    Ok(Some(HourlyStats {
        date,
        hour,
        counters: counters_from_row(row, 2)?,
    }))
}

impl SqliteStore {
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut conn = open_write_conn(&path)?;
        migrate(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path),
        })
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        let mut conn = Connection::open_in_memory()?;
        migrate(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn schema_version(&self) -> StoreResult<i64> {
        current_version(&self.conn.lock())
    }

    /// Raw events recorded on `date`, oldest first.
    pub fn get_raw_events(&self, date: NaiveDate) -> StoreResult<Vec<RawEvent>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT timestamp, event_type, key_code, button, value FROM raw_events WHERE date=?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![date_key(date)], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, Option<f64>>(4)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (ts, kind, key, button, value) = row?;
            let Ok(timestamp) = NaiveDateTime::parse_from_str(&ts, TIMESTAMP_FORMAT) else {
                continue;
            };
            let Some(kind) = RawEventKind::parse(&kind) else {
                continue;
            };
            out.push(RawEvent {
                timestamp,
                kind,
                key,
                button: button.as_deref().and_then(MouseButton::from_storage_key),
                value,
            });
        }
        Ok(out)
    }
}

impl StatsStore for SqliteStore {
    fn save_daily(&self, day: &DailyStats) -> StoreResult<()> {
        let c = &day.counters;
        self.conn.lock().execute(
            r#"
INSERT INTO daily_stats(date, key_count, mouse_distance, left_clicks, right_clicks, middle_clicks, scroll_distance)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
ON CONFLICT(date) DO UPDATE SET
  key_count=excluded.key_count,
  mouse_distance=excluded.mouse_distance,
  left_clicks=excluded.left_clicks,
  right_clicks=excluded.right_clicks,
  middle_clicks=excluded.middle_clicks,
  scroll_distance=excluded.scroll_distance
"#,
            params![
                day.date_key(),
                to_i64(c.key_count),
                c.mouse_distance_m,
                to_i64(c.left_clicks),
                to_i64(c.right_clicks),
                to_i64(c.middle_clicks),
                c.scroll_distance_m
            ],
        )?;
        Ok(())
    }

    fn get_daily(&self, date: NaiveDate) -> StoreResult<Option<DailyStats>> {
        let conn = self.conn.lock();
        let day = conn
            .query_row(
                "SELECT date, key_count, mouse_distance, left_clicks, right_clicks, middle_clicks, scroll_distance FROM daily_stats WHERE date=?1",
                params![date_key(date)],
                daily_from_row,
            )
            .optional()?;
        Ok(day.flatten())
    }

    fn get_daily_range(&self, start: NaiveDate, end: NaiveDate) -> StoreResult<Vec<DailyStats>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT date, key_count, mouse_distance, left_clicks, right_clicks, middle_clicks, scroll_distance FROM daily_stats WHERE date >= ?1 AND date <= ?2 ORDER BY date",
        )?;
        let rows = stmt.query_map(params![date_key(start), date_key(end)], daily_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            if let Some(day) = row? {
                out.push(day);
            }
        }
        Ok(out)
    }

    fn save_hourly(&self, hour: &HourlyStats) -> StoreResult<()> {
        let c = &hour.counters;
        self.conn.lock().execute(
            r#"
INSERT INTO hourly_stats(date, hour, key_count, mouse_distance, left_clicks, right_clicks, middle_clicks, scroll_distance)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
ON CONFLICT(date, hour) DO UPDATE SET
  key_count=excluded.key_count,
  mouse_distance=excluded.mouse_distance,
  left_clicks=excluded.left_clicks,
  right_clicks=excluded.right_clicks,
  middle_clicks=excluded.middle_clicks,
  scroll_distance=excluded.scroll_distance
"#,
            params![
                date_key(hour.date),
                i64::from(hour.hour),
                to_i64(c.key_count),
                c.mouse_distance_m,
                to_i64(c.left_clicks),
                to_i64(c.right_clicks),
                to_i64(c.middle_clicks),
                c.scroll_distance_m
            ],
        )?;
        Ok(())
    }

    fn get_hourly(&self, date: NaiveDate, hour: u8) -> StoreResult<Option<HourlyStats>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT date, hour, key_count, mouse_distance, left_clicks, right_clicks, middle_clicks, scroll_distance FROM hourly_stats WHERE date=?1 AND hour=?2",
                params![date_key(date), i64::from(hour)],
                hourly_from_row,
            )
            .optional()?;
        Ok(row.flatten())
    }

    fn get_hourly_for_date(&self, date: NaiveDate) -> StoreResult<Vec<HourlyStats>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT date, hour, key_count, mouse_distance, left_clicks, right_clicks, middle_clicks, scroll_distance FROM hourly_stats WHERE date=?1 ORDER BY hour",
        )?;
        let rows = stmt.query_map(params![date_key(date)], hourly_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            if let Some(hour) = row? {
                out.push(hour);
            }
        }
        Ok(out)
    }

    fn save_key_stats_batch(&self, rows: &[KeyStat]) -> StoreResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
INSERT INTO key_stats(date, hour, key_code, count)
VALUES (?1, ?2, ?3, ?4)
ON CONFLICT(date, hour, key_code) DO UPDATE SET count = count + excluded.count
"#,
            )?;
            for row in rows {
                let key = row.key.trim();
                if row.count == 0 || key.is_empty() {
                    continue;
                }
                stmt.execute(params![
                    date_key(row.date),
                    i64::from(row.hour),
                    key,
                    to_i64(row.count)
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn get_key_stats(&self, date: NaiveDate) -> StoreResult<Vec<(String, u64)>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT key_code, SUM(count) AS total FROM key_stats WHERE date=?1 GROUP BY key_code ORDER BY total DESC, key_code",
        )?;
        let rows = stmt.query_map(params![date_key(date)], |row| {
            Ok((row.get::<_, String>(0)?, to_u64(row.get(1)?)))
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn save_raw_events_batch(&self, events: &[RawEvent]) -> StoreResult<()> {
        if events.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO raw_events(date, timestamp, event_type, key_code, button, value) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for event in events {
                stmt.execute(params![
                    date_key(event.timestamp.date()),
                    event.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                    event.kind.as_str(),
                    event.key.as_deref(),
                    event.button.map(|b| b.storage_key()),
                    event.value
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn count_raw_events(&self) -> StoreResult<u64> {
        let count: i64 = self
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM raw_events", [], |row| row.get(0))?;
        Ok(to_u64(count))
    }

    fn save_app_usage(
        &self,
        date: NaiveDate,
        hour: u8,
        app_name: &str,
        seconds: u64,
    ) -> StoreResult<()> {
        self.save_app_usage_batch(&[AppUsageDelta {
            date,
            hour,
            app_name: app_name.to_string(),
            seconds,
        }])
    }

    fn save_app_usage_batch(&self, rows: &[AppUsageDelta]) -> StoreResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
INSERT INTO app_usage_stats(date, hour, app_name, seconds_used)
VALUES (?1, ?2, ?3, ?4)
ON CONFLICT(date, hour, app_name) DO UPDATE SET seconds_used = seconds_used + excluded.seconds_used
"#,
            )?;
            for row in rows {
                let name = row.app_name.trim();
                if name.is_empty() || row.seconds == 0 {
                    continue;
                }
                stmt.execute(params![
                    date_key(row.date),
                    i64::from(row.hour),
                    name,
                    to_i64(row.seconds)
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn get_app_usage(&self, range: UsageRange, today: NaiveDate) -> StoreResult<Vec<AppUsageTotal>> {
        let conn = self.conn.lock();
        let map_row = |row: &Row<'_>| -> rusqlite::Result<AppUsageTotal> {
            Ok(AppUsageTotal {
                app_name: row.get(0)?,
                total_seconds: to_u64(row.get(1)?),
            })
        };

        let mut out = Vec::new();
        match (range, range.start_date(today)) {
            (UsageRange::Today, _) => {
                let mut stmt = conn.prepare(
                    "SELECT app_name, SUM(seconds_used) AS total FROM app_usage_stats WHERE date=?1 GROUP BY app_name ORDER BY total DESC, app_name",
                )?;
                for row in stmt.query_map(params![date_key(today)], map_row)? {
                    out.push(row?);
                }
            }
            (_, Some(start)) => {
                let mut stmt = conn.prepare(
                    "SELECT app_name, SUM(seconds_used) AS total FROM app_usage_stats WHERE date >= ?1 GROUP BY app_name ORDER BY total DESC, app_name",
                )?;
                for row in stmt.query_map(params![date_key(start)], map_row)? {
                    out.push(row?);
                }
            }
            (_, None) => {
                let mut stmt = conn.prepare(
                    "SELECT app_name, SUM(seconds_used) AS total FROM app_usage_stats GROUP BY app_name ORDER BY total DESC, app_name",
                )?;
                for row in stmt.query_map([], map_row)? {
                    out.push(row?);
                }
            }
        }
        Ok(out)
    }

    fn cleanup_older_than(&self, retention_days: i32, today: NaiveDate) -> StoreResult<usize> {
        let Some(cutoff) = retention_cutoff(retention_days, today) else {
            return Ok(0);
        };
        let cutoff = date_key(cutoff);

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut deleted = 0usize;
        for table in [
            "daily_stats",
            "hourly_stats",
            "key_stats",
            "raw_events",
            "app_usage_stats",
        ] {
            deleted += tx.execute(&format!("DELETE FROM {table} WHERE date < ?1"), params![cutoff])?;
        }
        tx.commit()?;
        Ok(deleted)
    }

    fn get_lifetime_stats(&self) -> StoreResult<LifetimeStats> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT date, key_count, mouse_distance, left_clicks, right_clicks, middle_clicks, scroll_distance FROM daily_stats ORDER BY date",
        )?;
        let rows = stmt.query_map([], daily_from_row)?;
        let mut days = Vec::new();
        for row in rows {
            if let Some(day) = row? {
                days.push(day);
            }
        }
        Ok(LifetimeStats::from_days(days.iter()))
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").field("path", &self.path).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, 9).expect("valid date")
    }

    fn days_back(n: i64) -> NaiveDate {
        today() - ChronoDuration::days(n)
    }

    fn seeded_day(date: NaiveDate) -> DailyStats {
        let mut day = DailyStats::new(date);
        day.counters.key_count = 1_000;
        day.counters.left_clicks = 12;
        day.counters.mouse_distance_m = 3.5;
        day.counters.scroll_distance_m = 0.024;
        day
    }

    #[test]
    fn fresh_database_is_at_current_schema_version() {
        let store = SqliteStore::open_in_memory().expect("open");
        assert_eq!(store.schema_version().expect("version"), SCHEMA_VERSION);
    }

    #[test]
    fn daily_upsert_replaces_counters() {
        let store = SqliteStore::open_in_memory().expect("open");
        let mut day = seeded_day(today());
        store.save_daily(&day).expect("save");
        day.counters.key_count = 1_001;
        store.save_daily(&day).expect("save again");

        let loaded = store.get_daily(today()).expect("get").expect("row");
        assert_eq!(loaded, day);
        assert!(store.get_daily(days_back(1)).expect("get").is_none());
    }

    #[test]
    fn hourly_rows_round_trip_per_hour() {
        let store = SqliteStore::open_in_memory().expect("open");
        let mut h9 = HourlyStats::new(today(), 9);
        h9.counters.right_clicks = 4;
        let mut h10 = HourlyStats::new(today(), 10);
        h10.counters.key_count = 2;
        store.save_hourly(&h10).expect("save");
        store.save_hourly(&h9).expect("save");

        let rows = store.get_hourly_for_date(today()).expect("rows");
        assert_eq!(rows, vec![h9.clone(), h10]);
        assert_eq!(store.get_hourly(today(), 9).expect("get"), Some(h9));
    }

    #[test]
    fn retention_zero_keeps_year_old_rows() {
        let store = SqliteStore::open_in_memory().expect("open");
        for back in [0, 1, 90, 365, 500] {
            store.save_daily(&seeded_day(days_back(back))).expect("save");
        }
        assert_eq!(store.cleanup_older_than(0, today()).expect("cleanup"), 0);
        assert_eq!(store.cleanup_older_than(-30, today()).expect("cleanup"), 0);
        assert_eq!(store.get_daily_range(days_back(600), today()).expect("range").len(), 5);
    }

    #[test]
    fn retention_deletes_strictly_older_rows_in_every_table() {
        let store = SqliteStore::open_in_memory().expect("open");
        for back in [0, 30, 31] {
            let date = days_back(back);
            store.save_daily(&seeded_day(date)).expect("save");
            store.save_hourly(&HourlyStats::new(date, 3)).expect("save");
            store
                .save_key_stats_batch(&[KeyStat { date, hour: 3, key: "KeyA".into(), count: 1 }])
                .expect("save");
            store.save_app_usage(date, 3, "Terminal", 60).expect("save");
        }

        let deleted = store.cleanup_older_than(30, today()).expect("cleanup");
        assert_eq!(deleted, 4);
        assert!(store.get_daily(days_back(30)).expect("get").is_some());
        assert!(store.get_daily(days_back(31)).expect("get").is_none());
        assert!(store.get_hourly(days_back(31), 3).expect("get").is_none());
        assert!(store.get_key_stats(days_back(31)).expect("get").is_empty());
    }

    #[test]
    fn app_usage_is_additive_and_ranged() {
        let store = SqliteStore::open_in_memory().expect("open");
        store.save_app_usage(today(), 9, "Visual Studio Code", 1_800).expect("save");
        store.save_app_usage(today(), 9, "Visual Studio Code", 1_800).expect("save");
        store.save_app_usage(today(), 10, "Chrome", 600).expect("save");
        store.save_app_usage(days_back(10), 10, "Chrome", 6_000).expect("save");

        let today_usage = store.get_app_usage(UsageRange::Today, today()).expect("today");
        assert_eq!(today_usage[0].app_name, "Visual Studio Code");
        assert_eq!(today_usage[0].total_seconds, 3_600);

        let week = store.get_app_usage(UsageRange::Week, today()).expect("week");
        let chrome_week = week.iter().find(|t| t.app_name == "Chrome").expect("chrome");
        assert_eq!(chrome_week.total_seconds, 600);

        let month = store.get_app_usage(UsageRange::Month, today()).expect("month");
        assert_eq!(month[0].app_name, "Chrome");
        assert_eq!(month[0].total_seconds, 6_600);
    }

    #[test]
    fn lifetime_counts_only_active_days() {
        let store = SqliteStore::open_in_memory().expect("open");
        let mut active = DailyStats::new(days_back(1));
        active.counters.key_count = 1_000;
        store.save_daily(&active).expect("save");
        store.save_daily(&DailyStats::new(today())).expect("save");

        let lifetime = store.get_lifetime_stats().expect("lifetime");
        assert_eq!(lifetime.active_day_count, 1);
        assert_eq!(lifetime.total_keys, 1_000);
        assert!(lifetime.tracking_period_description().contains("2025-08-08"));
        assert!(!lifetime.tracking_period_description().contains("2025-08-09"));
    }

    #[test]
    fn raw_events_keep_optional_payload() {
        let store = SqliteStore::open_in_memory().expect("open");
        let at = today().and_hms_milli_opt(9, 15, 0, 250).expect("valid time");
        let mut click = RawEvent::new(at, RawEventKind::MouseClick);
        click.button = Some(MouseButton::Right);
        let mut side = RawEvent::new(at, RawEventKind::MouseClick);
        side.button = Some(MouseButton::Other(4));
        let key = RawEvent::new(at, RawEventKind::KeyPress);
        store
            .save_raw_events_batch(&[click.clone(), side.clone(), key.clone()])
            .expect("save");

        assert_eq!(store.count_raw_events().expect("count"), 3);
        assert_eq!(
            store.get_raw_events(today()).expect("events"),
            vec![click, side, key]
        );
    }

    #[test]
    fn file_database_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("data").join("odometer.db");
        {
            let store = SqliteStore::open(&path).expect("open");
            store.save_daily(&seeded_day(today())).expect("save");
        }
        let store = SqliteStore::open(&path).expect("reopen");
        assert_eq!(store.schema_version().expect("version"), SCHEMA_VERSION);
        assert_eq!(store.get_daily(today()).expect("get"), Some(seeded_day(today())));
    }
}
