use chrono::{Duration, NaiveDateTime};
use parking_lot::Mutex;

/// Source of "now" in local wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalClock;

impl Clock for LocalClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

/// Hand-driven clock for tests and replays.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<NaiveDateTime>,
}

impl ManualClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, at: NaiveDateTime) {
        *self.now.lock() = at;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }

    pub fn advance_ms(&self, ms: i64) {
        self.advance(Duration::milliseconds(ms));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock()
    }
}

/// Time left until the next top of the hour after `now`.
pub fn until_next_hour(now: NaiveDateTime) -> std::time::Duration {
    let truncated = now
        .date()
        .and_hms_opt(crate::models::stats::hour_of(now).into(), 0, 0)
        .unwrap_or(now);
    let next = truncated + Duration::hours(1);
    (next - now).to_std().unwrap_or_default()
}
