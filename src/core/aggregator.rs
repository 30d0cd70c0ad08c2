use crate::core::clock::Clock;
use crate::core::distance::DistanceCalculator;
use crate::core::notify::{Notifier, StatsEvent};
use crate::core::persist_queue::{PersistOp, PersistQueue};
use crate::core::store::{StatsStore, StoreResult};
use crate::models::{
    DailyStats, HourlyStats, KeyStat, LifetimeStats, MouseButton, RawEvent, RawEventKind,
    Settings,
};
use chrono::{NaiveDate, NaiveDateTime};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    RollingOver,
}

struct EngineState {
    phase: Phase,
    daily: DailyStats,
    hourly: HourlyStats,
    key_counts: HashMap<String, u64>,
    raw_events: Vec<RawEvent>,
    last_move_at: Option<NaiveDateTime>,
    last_key: Option<String>,
    dirty: bool,
}

/// Post-lock work left over from a rollover. Buckets are already replaced and
/// their snapshots already queued by the time this exists.
struct Handoff {
    outgoing_day: Option<NaiveDate>,
    outgoing_hour: (NaiveDate, u8),
    fresh_daily: DailyStats,
    today: NaiveDate,
}

struct RolloverGuard<'a> {
    state: &'a Mutex<EngineState>,
}

impl Drop for RolloverGuard<'_> {
    fn drop(&mut self) {
        self.state.lock().phase = Phase::Idle;
    }
}

/// Thread-safe accumulator for keyboard and mouse counters.
///
/// Every ingestion call takes the bucket lock once, rolls the buckets over if
/// the clock has left the live hour or day, then mutates. Snapshots for the
/// store are queued while the lock is still held, so queue order always matches
/// snapshot order and an older snapshot can never overwrite a newer one.
pub struct StatsAggregator {
    state: Mutex<EngineState>,
    settings: Settings,
    calc: DistanceCalculator,
    throttle: chrono::Duration,
    clock: Arc<dyn Clock>,
    store: Arc<dyn StatsStore>,
    queue: PersistQueue,
    notifier: Arc<Notifier>,
}

impl StatsAggregator {
    /// Seeds the live buckets from whatever the store already has for now, so
    /// a restart mid-day keeps counting from the stored totals.
    pub fn new(
        settings: Settings,
        clock: Arc<dyn Clock>,
        store: Arc<dyn StatsStore>,
        queue: PersistQueue,
        notifier: Arc<Notifier>,
    ) -> Self {
        let now = clock.now();
        let daily = match store.get_daily(now.date()) {
            Ok(Some(day)) => day,
            Ok(None) => DailyStats::new(now.date()),
            Err(e) => {
                tracing::warn!(error = %e, "failed to load today's stats; starting from zero");
                DailyStats::new(now.date())
            }
        };
        let hourly = match store.get_hourly(now.date(), crate::models::stats::hour_of(now)) {
            Ok(Some(hour)) => hour,
            Ok(None) => HourlyStats::starting_at(now),
            Err(e) => {
                tracing::warn!(error = %e, "failed to load this hour's stats; starting from zero");
                HourlyStats::starting_at(now)
            }
        };

        let throttle = chrono::Duration::from_std(settings.mouse_move_throttle())
            .unwrap_or_else(|_| chrono::Duration::milliseconds(100));

        Self {
            state: Mutex::new(EngineState {
                phase: Phase::Idle,
                daily,
                hourly,
                key_counts: HashMap::new(),
                raw_events: Vec::new(),
                last_move_at: None,
                last_key: None,
                dirty: false,
            }),
            calc: DistanceCalculator::from_settings(&settings),
            settings,
            throttle,
            clock,
            store,
            queue,
            notifier,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn record_key_press(&self, key: &str) {
        let key = key.trim();
        if key.is_empty() {
            return;
        }
        crate::core::perf::inc_input_key();

        let log_raw = self.settings.raw_event_logging;
        let log_content = self.settings.log_keystroke_content;
        let changed = self.ingest(|state, now| {
            state.daily.counters.add_key();
            state.hourly.counters.add_key();
            state
                .key_counts
                .entry(key.to_string())
                .and_modify(|v| *v = v.saturating_add(1))
                .or_insert(1);
            if log_raw {
                let mut event = RawEvent::new(now, RawEventKind::KeyPress);
                if log_content {
                    event.key = Some(key.to_string());
                }
                state.raw_events.push(event);
            }
            state.dirty = true;

            if state.last_key.as_deref() == Some(key) {
                return false;
            }
            state.last_key = Some(key.to_string());
            true
        });

        if changed {
            self.notifier
                .publish(StatsEvent::LastKeyChanged(key.to_string()));
        }
    }

    /// `pixels` is the cursor travel since the previous sample.
    pub fn record_mouse_move(&self, pixels: f64) {
        if !(pixels.is_finite() && pixels > 0.0) {
            return;
        }

        let meters = self.calc.mouse_meters(pixels);
        let log_raw = self.settings.raw_event_logging;
        let throttle = self.throttle;
        let accepted = self.ingest(|state, now| {
            if let Some(last) = state.last_move_at {
                let elapsed = now - last;
                // A clock that went backwards counts as elapsed.
                if elapsed >= chrono::Duration::zero() && elapsed < throttle {
                    return false;
                }
            }
            state.last_move_at = Some(now);
            state.daily.counters.add_mouse_distance(meters);
            state.hourly.counters.add_mouse_distance(meters);
            if log_raw {
                let mut event = RawEvent::new(now, RawEventKind::MouseMove);
                event.value = Some(pixels);
                state.raw_events.push(event);
            }
            state.dirty = true;
            true
        });

        if accepted {
            crate::core::perf::inc_input_mouse_move();
        } else {
            crate::core::perf::inc_input_mouse_move_throttled();
        }
    }

    pub fn record_mouse_click(&self, button: MouseButton) {
        crate::core::perf::inc_input_mouse_click();
        let log_raw = self.settings.raw_event_logging;
        self.ingest(|state, now| {
            let counted = state.daily.counters.add_click(button);
            state.hourly.counters.add_click(button);
            if log_raw {
                let mut event = RawEvent::new(now, RawEventKind::MouseClick);
                event.button = Some(button);
                state.raw_events.push(event);
            }
            if counted {
                state.dirty = true;
            }
        });
    }

    /// Wheel delta as reported by the OS; 120 units per notch, sign ignored.
    pub fn record_mouse_scroll(&self, delta: i32) {
        if delta == 0 {
            return;
        }
        crate::core::perf::inc_input_mouse_scroll();

        let meters = self.calc.scroll_meters(delta);
        let log_raw = self.settings.raw_event_logging;
        self.ingest(|state, now| {
            state.daily.counters.add_scroll_distance(meters);
            state.hourly.counters.add_scroll_distance(meters);
            if log_raw {
                let mut event = RawEvent::new(now, RawEventKind::MouseScroll);
                event.value = Some(f64::from(delta));
                state.raw_events.push(event);
            }
            state.dirty = true;
        });
    }

    /// Queues the live daily bucket, the hourly bucket when it has anything,
    /// pending key counts and raw events.
    pub fn flush(&self) {
        crate::core::perf::time(crate::core::perf::TimerKind::Flush, || {
            let now = self.clock.now();
            let handoff = {
                let mut state = self.state.lock();
                let handoff = self.begin_rollover(&mut state, now);

                self.queue.enqueue(PersistOp::SaveDaily(state.daily.clone()));
                if !state.hourly.is_empty() {
                    self.queue
                        .enqueue(PersistOp::SaveHourly(state.hourly.clone()));
                }
                let hour = (state.hourly.date, state.hourly.hour);
                let key_stats = drain_key_stats(&mut state.key_counts, hour);
                if !key_stats.is_empty() {
                    self.queue.enqueue(PersistOp::SaveKeyStats(key_stats));
                }
                if !state.raw_events.is_empty() {
                    let events = std::mem::take(&mut state.raw_events);
                    self.queue.enqueue(PersistOp::SaveRawEvents(events));
                }
                handoff
            };
            self.finish_rollover(handoff);
            tracing::debug!("stats flushed");
        })
    }

    /// Rolls over if the clock has left the live hour or day. Returns whether
    /// this call performed the rollover.
    pub fn ensure_current_period(&self) -> bool {
        let now = self.clock.now();
        let handoff = {
            let mut state = self.state.lock();
            self.begin_rollover(&mut state, now)
        };
        let rolled = handoff.is_some();
        self.finish_rollover(handoff);
        rolled
    }

    pub fn current_stats(&self) -> DailyStats {
        let now = self.clock.now();
        let (handoff, daily) = {
            let mut state = self.state.lock();
            let handoff = self.begin_rollover(&mut state, now);
            (handoff, state.daily.clone())
        };
        self.finish_rollover(handoff);
        daily
    }

    pub fn current_hour(&self) -> HourlyStats {
        self.state.lock().hourly.clone()
    }

    pub fn last_key_pressed(&self) -> Option<String> {
        self.state.lock().last_key.clone()
    }

    pub fn pending_raw_events(&self) -> usize {
        self.state.lock().raw_events.len()
    }

    /// Zeroes today's counters, in memory and in the store. Older days are kept.
    pub fn reset(&self) {
        let now = self.clock.now();
        let (handoff, fresh) = {
            let mut state = self.state.lock();
            // Close any finished period first; a clock behind the live period
            // resets the live buckets, not the earlier ones.
            let handoff = self.begin_rollover(&mut state, now);
            let (date, hour) = (state.hourly.date, state.hourly.hour);
            state.daily = DailyStats::new(state.daily.date);
            state.hourly = HourlyStats::new(date, hour);
            state.key_counts.clear();
            state.raw_events.clear();
            state.last_move_at = None;
            state.dirty = false;

            self.queue.enqueue(PersistOp::SaveDaily(state.daily.clone()));
            self.queue
                .enqueue(PersistOp::SaveHourly(state.hourly.clone()));
            (handoff, state.daily.clone())
        };
        self.finish_rollover(handoff);
        tracing::info!(date = %fresh.date, "today's stats reset");
        self.notifier.publish(StatsEvent::StatsUpdated(fresh));
    }

    /// Publishes the live daily bucket if anything changed since the last call.
    pub fn publish_if_dirty(&self) -> bool {
        let snapshot = {
            let mut state = self.state.lock();
            if !state.dirty {
                return false;
            }
            state.dirty = false;
            state.daily.clone()
        };
        self.notifier.publish(StatsEvent::StatsUpdated(snapshot));
        true
    }

    /// Totals across stored days. Today only counts up to the last flush.
    pub fn lifetime_stats(&self) -> StoreResult<LifetimeStats> {
        self.store.get_lifetime_stats()
    }

    fn ingest<T>(&self, f: impl FnOnce(&mut EngineState, NaiveDateTime) -> T) -> T {
        let now = self.clock.now();
        let (handoff, out) = {
            let mut state = self.state.lock();
            let handoff = self.begin_rollover(&mut state, now);
            let out = f(&mut *state, now);
            (handoff, out)
        };
        self.finish_rollover(handoff);
        out
    }

    /// Must run under the state lock. Replaces closed buckets and queues their
    /// snapshots; the rest happens in `finish_rollover` once the lock is gone.
    fn begin_rollover(&self, state: &mut EngineState, now: NaiveDateTime) -> Option<Handoff> {
        if state.phase == Phase::RollingOver {
            tracing::trace!("rollover already in flight; skipping boundary check");
            return None;
        }

        let period = (now.date(), crate::models::stats::hour_of(now));
        let live = (state.hourly.date, state.hourly.hour);
        if period <= live {
            if period < live {
                // Clock stepped back: keep counting into the live buckets so
                // the earlier period's stored rows are never overwritten.
                tracing::debug!(%now, live_date = %live.0, live_hour = live.1, "clock behind live period; not rolling back");
            }
            return None;
        }
        let day_changed = state.daily.date != now.date();
        state.phase = Phase::RollingOver;

        let outgoing_hourly = std::mem::replace(&mut state.hourly, HourlyStats::starting_at(now));
        let outgoing_hour = (outgoing_hourly.date, outgoing_hourly.hour);
        let key_stats = drain_key_stats(&mut state.key_counts, outgoing_hour);

        let outgoing_day = if day_changed {
            let outgoing = std::mem::replace(&mut state.daily, DailyStats::new(now.date()));
            let date = outgoing.date;
            self.queue.enqueue(PersistOp::SaveDaily(outgoing));
            Some(date)
        } else {
            None
        };
        if !outgoing_hourly.is_empty() {
            self.queue.enqueue(PersistOp::SaveHourly(outgoing_hourly));
        }
        if !key_stats.is_empty() {
            self.queue.enqueue(PersistOp::SaveKeyStats(key_stats));
        }

        Some(Handoff {
            outgoing_day,
            outgoing_hour,
            fresh_daily: state.daily.clone(),
            today: now.date(),
        })
    }

    fn finish_rollover(&self, handoff: Option<Handoff>) {
        let Some(handoff) = handoff else {
            return;
        };
        let _guard = RolloverGuard { state: &self.state };

        let (hour_date, hour) = handoff.outgoing_hour;
        let Some(day) = handoff.outgoing_day else {
            crate::core::perf::inc_hour_rollover();
            tracing::debug!(date = %hour_date, hour, "hour rolled over");
            return;
        };

        crate::core::perf::inc_day_rollover();
        tracing::debug!(from = %day, to = %handoff.today, "day rolled over");
        if self.settings.retention_enabled() {
            self.queue.enqueue(PersistOp::Cleanup {
                retention_days: self.settings.retention_days,
                today: handoff.today,
            });
        }
        self.notifier
            .publish(StatsEvent::StatsUpdated(handoff.fresh_daily));
    }
}

fn drain_key_stats(key_counts: &mut HashMap<String, u64>, hour: (NaiveDate, u8)) -> Vec<KeyStat> {
    key_counts
        .drain()
        .filter(|(_, count)| *count > 0)
        .map(|(key, count)| KeyStat {
            date: hour.0,
            hour: hour.1,
            key,
            count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use crate::core::store::MemoryStore;
    use std::time::Duration;

    const SYNC: Duration = Duration::from_secs(5);

    struct Harness {
        clock: Arc<ManualClock>,
        store: Arc<MemoryStore>,
        queue: PersistQueue,
        notifier: Arc<Notifier>,
        agg: Arc<StatsAggregator>,
    }

    fn at(d: u32, h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 8, d)
            .and_then(|date| date.and_hms_opt(h, m, s))
            .expect("valid time")
    }

    fn harness_with(settings: Settings, start: NaiveDateTime, store: Arc<MemoryStore>) -> Harness {
        let clock = Arc::new(ManualClock::new(start));
        let queue = PersistQueue::start(store.clone());
        let notifier = Arc::new(Notifier::new());
        let agg = Arc::new(StatsAggregator::new(
            settings,
            clock.clone(),
            store.clone(),
            queue.clone(),
            notifier.clone(),
        ));
        Harness {
            clock,
            store,
            queue,
            notifier,
            agg,
        }
    }

    fn harness(start: NaiveDateTime) -> Harness {
        harness_with(Settings::default(), start, Arc::new(MemoryStore::new()))
    }

    #[test]
    fn key_presses_count_without_rollover() {
        let h = harness(at(9, 10, 0, 0));
        for _ in 0..250 {
            h.agg.record_key_press("KeyA");
        }
        assert_eq!(h.agg.current_stats().counters.key_count, 250);
        assert_eq!(h.agg.current_hour().counters.key_count, 250);
        assert_eq!(h.agg.last_key_pressed().as_deref(), Some("KeyA"));
    }

    #[test]
    fn blank_key_is_ignored() {
        let h = harness(at(9, 10, 0, 0));
        h.agg.record_key_press("");
        h.agg.record_key_press("   ");
        assert_eq!(h.agg.current_stats().counters.key_count, 0);
        assert_eq!(h.agg.last_key_pressed(), None);
    }

    #[test]
    fn last_key_change_is_published_once_per_change() {
        let h = harness(at(9, 10, 0, 0));
        let rx = h.notifier.subscribe();
        h.agg.record_key_press("KeyA");
        h.agg.record_key_press("KeyA");
        h.agg.record_key_press("Space");

        let events: Vec<StatsEvent> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                StatsEvent::LastKeyChanged("KeyA".into()),
                StatsEvent::LastKeyChanged("Space".into()),
            ]
        );
    }

    #[test]
    fn mouse_moves_inside_throttle_window_are_dropped() {
        let h = harness(at(9, 10, 0, 0));
        let per_sample = DistanceCalculator::default().mouse_meters(1000.0);

        h.agg.record_mouse_move(1000.0);
        h.clock.advance_ms(50);
        h.agg.record_mouse_move(1000.0);
        h.clock.advance_ms(100);
        h.agg.record_mouse_move(1000.0);

        let distance = h.agg.current_stats().counters.mouse_distance_m;
        assert!((distance - 2.0 * per_sample).abs() < 1e-9);
    }

    #[test]
    fn invalid_mouse_input_is_a_no_op() {
        let h = harness(at(9, 10, 0, 0));
        h.agg.record_mouse_move(0.0);
        h.agg.record_mouse_move(-3.0);
        h.agg.record_mouse_move(f64::NAN);
        h.agg.record_mouse_scroll(0);
        assert!(h.agg.current_stats().is_empty());
    }

    #[test]
    fn one_notch_scroll_adds_two_point_four_centimeters() {
        let h = harness(at(9, 10, 0, 0));
        h.agg.record_mouse_scroll(-120);
        let scroll = h.agg.current_stats().counters.scroll_distance_m;
        assert!((scroll - 0.024).abs() < 1e-9);
    }

    #[test]
    fn extra_buttons_are_not_counted() {
        let h = harness(at(9, 10, 0, 0));
        h.agg.record_mouse_click(MouseButton::Left);
        h.agg.record_mouse_click(MouseButton::Right);
        h.agg.record_mouse_click(MouseButton::Other(4));
        let c = h.agg.current_stats().counters;
        assert_eq!((c.left_clicks, c.right_clicks, c.middle_clicks), (1, 1, 0));
    }

    #[test]
    fn hour_rollover_persists_the_closed_hour_and_its_keys() {
        let h = harness(at(9, 9, 59, 0));
        h.agg.record_key_press("KeyA");
        h.agg.record_key_press("KeyA");
        h.agg.record_key_press("Enter");

        h.clock.set(at(9, 10, 0, 1));
        h.agg.record_key_press("KeyB");
        assert!(h.queue.sync(SYNC));

        let closed = h
            .store
            .get_hourly(at(9, 0, 0, 0).date(), 9)
            .expect("get")
            .expect("hour 9 saved");
        assert_eq!(closed.counters.key_count, 3);
        assert_eq!(
            h.store.get_key_stats(at(9, 0, 0, 0).date()).expect("keys")[0],
            ("KeyA".to_string(), 2)
        );

        // the day keeps counting across the hour
        assert_eq!(h.agg.current_stats().counters.key_count, 4);
        assert_eq!(h.agg.current_hour().hour, 10);
        assert_eq!(h.agg.current_hour().counters.key_count, 1);
        // hour-only rollovers never save the daily bucket
        assert!(h.store.daily_save_log().is_empty());
    }

    #[test]
    fn concurrent_rollover_triggers_hand_off_one_snapshot() {
        let h = harness(at(9, 23, 59, 50));
        for _ in 0..10 {
            h.agg.record_key_press("KeyA");
        }
        h.clock.set(at(10, 0, 0, 5));

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let agg = h.agg.clone();
                std::thread::spawn(move || agg.ensure_current_period())
            })
            .collect();
        let rolled = threads
            .into_iter()
            .map(|t| t.join().expect("thread"))
            .filter(|rolled| *rolled)
            .count();
        assert_eq!(rolled, 1);
        assert!(h.queue.sync(SYNC));

        let day9 = at(9, 0, 0, 0).date();
        let saves: Vec<_> = h
            .store
            .daily_save_log()
            .into_iter()
            .filter(|d| d.date == day9)
            .collect();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].counters.key_count, 10);

        let today = h.agg.current_stats();
        assert_eq!(today.date, at(10, 0, 0, 0).date());
        assert!(today.is_empty());
    }

    #[test]
    fn midnight_closes_hour_23_exactly_once_with_its_keys() {
        let h = harness(at(9, 23, 59, 30));
        for _ in 0..3 {
            h.agg.record_key_press("KeyA");
        }
        h.agg.record_key_press("Enter");

        h.clock.set(at(10, 0, 0, 1));
        h.agg.record_key_press("KeyB");
        h.agg.flush();
        assert!(h.queue.sync(SYNC));

        let day9 = at(9, 0, 0, 0).date();
        let hour23: Vec<_> = h
            .store
            .hourly_save_log()
            .into_iter()
            .filter(|s| s.date == day9 && s.hour == 23)
            .collect();
        assert_eq!(hour23.len(), 1);
        assert_eq!(hour23[0].counters.key_count, 4);

        let keys = h.store.get_key_stats(day9).expect("keys");
        assert_eq!(keys.iter().map(|(_, n)| n).sum::<u64>(), 4);
        assert_eq!(keys[0], ("KeyA".to_string(), 3));

        let day10 = at(10, 0, 0, 0).date();
        assert_eq!(
            h.store.get_key_stats(day10).expect("keys"),
            vec![("KeyB".to_string(), 1)]
        );
        let day9_saves = h
            .store
            .daily_save_log()
            .into_iter()
            .filter(|d| d.date == day9)
            .count();
        assert_eq!(day9_saves, 1);
    }

    #[test]
    fn clock_stepping_back_keeps_counting_into_the_live_day() {
        let h = harness(at(9, 23, 59, 50));
        for _ in 0..500 {
            h.agg.record_key_press("KeyA");
        }
        h.clock.set(at(10, 0, 0, 2));
        h.agg.record_key_press("KeyA");

        h.clock.set(at(9, 23, 59, 58));
        h.agg.record_key_press("KeyA");
        assert!(!h.agg.ensure_current_period());
        h.agg.flush();
        assert!(h.queue.sync(SYNC));

        let day9 = at(9, 0, 0, 0).date();
        let day10 = at(10, 0, 0, 0).date();
        let stored9 = h.store.get_daily(day9).expect("get").expect("day 9");
        assert_eq!(stored9.counters.key_count, 500);
        let hour23 = h.store.get_hourly(day9, 23).expect("get").expect("hour 23");
        assert_eq!(hour23.counters.key_count, 500);

        let live = h.agg.current_stats();
        assert_eq!(live.date, day10);
        assert_eq!(live.counters.key_count, 2);
        assert_eq!(
            h.store.get_daily(day10).expect("get").expect("day 10").counters.key_count,
            2
        );
        assert_eq!(h.agg.current_hour().hour, 0);
    }

    #[test]
    fn reset_with_the_clock_behind_zeroes_only_the_live_day() {
        let h = harness(at(9, 23, 59, 50));
        for _ in 0..5 {
            h.agg.record_key_press("KeyA");
        }
        h.clock.set(at(10, 0, 0, 2));
        h.agg.record_key_press("KeyA");

        h.clock.set(at(9, 23, 59, 59));
        h.agg.reset();
        assert!(h.queue.sync(SYNC));

        let day9 = at(9, 0, 0, 0).date();
        let day10 = at(10, 0, 0, 0).date();
        assert_eq!(
            h.store.get_daily(day9).expect("get").expect("day 9").counters.key_count,
            5
        );
        assert!(h.store.get_daily(day10).expect("get").expect("day 10").is_empty());
        assert_eq!(h.agg.current_stats().date, day10);
    }

    #[test]
    fn day_rollover_notifies_with_the_empty_day() {
        let h = harness(at(9, 23, 59, 59));
        h.agg.record_key_press("KeyA");
        let rx = h.notifier.subscribe();

        h.clock.advance_ms(2_000);
        h.agg.record_mouse_click(MouseButton::Left);

        let updated: Vec<DailyStats> = rx
            .try_iter()
            .filter_map(|e| match e {
                StatsEvent::StatsUpdated(d) => Some(d),
                StatsEvent::LastKeyChanged(_) => None,
            })
            .collect();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].date, at(10, 0, 0, 0).date());
        assert!(updated[0].is_empty());
        assert_eq!(h.agg.current_stats().counters.left_clicks, 1);
    }

    #[test]
    fn rollover_survives_a_failing_store() {
        let h = harness(at(9, 23, 59, 0));
        h.agg.record_key_press("KeyA");
        h.store.set_failing(true);

        h.clock.set(at(10, 0, 1, 0));
        h.agg.record_key_press("KeyB");
        h.agg.flush();
        assert!(h.queue.sync(SYNC));

        let today = h.agg.current_stats();
        assert_eq!(today.date, at(10, 0, 0, 0).date());
        assert_eq!(today.counters.key_count, 1);
    }

    #[test]
    fn retention_runs_on_day_rollover_only_when_enabled() {
        let old = at(1, 12, 0, 0).date() - chrono::Duration::days(60);
        let mut old_day = DailyStats::new(old);
        old_day.counters.key_count = 5;

        let keep_store = Arc::new(MemoryStore::new());
        keep_store.save_daily(&old_day).expect("seed");
        let keep = harness_with(Settings::default(), at(9, 23, 59, 0), keep_store);
        keep.clock.set(at(10, 0, 0, 1));
        keep.agg.ensure_current_period();
        assert!(keep.queue.sync(SYNC));
        assert!(keep.store.get_daily(old).expect("get").is_some());

        let prune_store = Arc::new(MemoryStore::new());
        prune_store.save_daily(&old_day).expect("seed");
        let settings = Settings {
            retention_days: 30,
            ..Settings::default()
        };
        let prune = harness_with(settings, at(9, 23, 59, 0), prune_store);
        prune.clock.set(at(10, 0, 0, 1));
        prune.agg.ensure_current_period();
        assert!(prune.queue.sync(SYNC));
        assert!(prune.store.get_daily(old).expect("get").is_none());
    }

    #[test]
    fn raw_events_respect_the_keystroke_privacy_gate() {
        let settings = Settings {
            raw_event_logging: true,
            ..Settings::default()
        };
        let h = harness_with(settings, at(9, 10, 0, 0), Arc::new(MemoryStore::new()));
        h.agg.record_key_press("KeyP");
        h.agg.record_mouse_click(MouseButton::Other(5));
        assert_eq!(h.agg.pending_raw_events(), 2);

        h.agg.flush();
        assert!(h.queue.sync(SYNC));
        assert_eq!(h.agg.pending_raw_events(), 0);
        assert_eq!(h.store.count_raw_events().expect("count"), 2);
    }

    #[test]
    fn raw_events_are_not_collected_when_disabled() {
        let h = harness(at(9, 10, 0, 0));
        h.agg.record_key_press("KeyP");
        h.agg.flush();
        assert!(h.queue.sync(SYNC));
        assert_eq!(h.store.count_raw_events().expect("count"), 0);
    }

    #[test]
    fn flush_then_reset_zeroes_today_in_the_store() {
        let h = harness(at(9, 10, 0, 0));
        for _ in 0..7 {
            h.agg.record_key_press("KeyA");
        }
        h.agg.flush();
        assert!(h.queue.sync(SYNC));
        let date = at(9, 0, 0, 0).date();
        assert_eq!(h.store.get_daily(date).expect("get").expect("row").counters.key_count, 7);

        let rx = h.notifier.subscribe();
        h.agg.reset();
        assert!(h.queue.sync(SYNC));
        assert!(h.store.get_daily(date).expect("get").expect("row").is_empty());
        assert!(h.store.get_hourly(date, 10).expect("get").expect("row").is_empty());
        assert!(matches!(rx.try_recv(), Ok(StatsEvent::StatsUpdated(d)) if d.is_empty()));
    }

    #[test]
    fn startup_resumes_from_stored_totals() {
        let store = Arc::new(MemoryStore::new());
        let mut seeded = DailyStats::new(at(9, 0, 0, 0).date());
        seeded.counters.key_count = 900;
        store.save_daily(&seeded).expect("seed");

        let h = harness_with(Settings::default(), at(9, 15, 0, 0), store);
        h.agg.record_key_press("KeyA");
        assert_eq!(h.agg.current_stats().counters.key_count, 901);
    }

    #[test]
    fn publish_if_dirty_only_fires_after_changes() {
        let h = harness(at(9, 10, 0, 0));
        let rx = h.notifier.subscribe();
        assert!(!h.agg.publish_if_dirty());
        h.agg.record_mouse_scroll(120);
        assert!(h.agg.publish_if_dirty());
        assert!(!h.agg.publish_if_dirty());
        assert_eq!(rx.try_iter().count(), 1);
    }
}
