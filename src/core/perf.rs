use serde::Serialize;

// Counters are compiled in for debug builds, and for release builds only with `--features perf`.
// Release builds otherwise get no-op stubs with the same call surface.

#[cfg(any(debug_assertions, feature = "perf"))]
mod imp {
    use super::Serialize;
    use once_cell::sync::Lazy;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{Duration, Instant};

    static STARTED_AT: Lazy<Instant> = Lazy::new(Instant::now);

    // Counters
    static INPUT_EVENTS_TOTAL: AtomicU64 = AtomicU64::new(0);
    static INPUT_EVENTS_KEY: AtomicU64 = AtomicU64::new(0);
    static INPUT_EVENTS_MOUSE_CLICK: AtomicU64 = AtomicU64::new(0);
    static INPUT_EVENTS_MOUSE_MOVE: AtomicU64 = AtomicU64::new(0);
    static INPUT_EVENTS_MOUSE_MOVE_THROTTLED: AtomicU64 = AtomicU64::new(0);
    static INPUT_EVENTS_MOUSE_SCROLL: AtomicU64 = AtomicU64::new(0);

    static HOUR_ROLLOVERS: AtomicU64 = AtomicU64::new(0);
    static DAY_ROLLOVERS: AtomicU64 = AtomicU64::new(0);
    static UI_EMITS: AtomicU64 = AtomicU64::new(0);

    static PERSIST_OPS: AtomicU64 = AtomicU64::new(0);
    static PERSIST_FAILURES: AtomicU64 = AtomicU64::new(0);

    // Timings (nanos + samples)
    static FLUSH_NS: AtomicU64 = AtomicU64::new(0);
    static FLUSH_SAMPLES: AtomicU64 = AtomicU64::new(0);

    static PERSIST_OP_NS: AtomicU64 = AtomicU64::new(0);
    static PERSIST_OP_SAMPLES: AtomicU64 = AtomicU64::new(0);

    static FOCUS_QUERY_NS: AtomicU64 = AtomicU64::new(0);
    static FOCUS_QUERY_SAMPLES: AtomicU64 = AtomicU64::new(0);

    #[derive(Debug, Clone, Copy)]
    pub enum TimerKind {
        Flush,
        PersistOp,
        FocusQuery,
    }

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct PerfSnapshot {
        pub supported: bool,
        pub uptime_ms: u64,
        pub counters: PerfCounters,
        pub timings: PerfTimings,
    }

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct PerfCounters {
        pub input_events_total: u64,
        pub input_events_key: u64,
        pub input_events_mouse_click: u64,
        pub input_events_mouse_move: u64,
        pub input_events_mouse_move_throttled: u64,
        pub input_events_mouse_scroll: u64,
        pub hour_rollovers: u64,
        pub day_rollovers: u64,
        pub ui_emits: u64,
        pub persist_ops: u64,
        pub persist_failures: u64,
    }

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct PerfTimings {
        pub flush: PerfTiming,
        pub persist_op: PerfTiming,
        pub focus_query: PerfTiming,
    }

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct PerfTiming {
        pub samples: u64,
        pub total_ns: u64,
        pub avg_ns: u64,
    }

    pub fn snapshot() -> PerfSnapshot {
        let counters = PerfCounters {
            input_events_total: INPUT_EVENTS_TOTAL.load(Ordering::Relaxed),
            input_events_key: INPUT_EVENTS_KEY.load(Ordering::Relaxed),
            input_events_mouse_click: INPUT_EVENTS_MOUSE_CLICK.load(Ordering::Relaxed),
            input_events_mouse_move: INPUT_EVENTS_MOUSE_MOVE.load(Ordering::Relaxed),
            input_events_mouse_move_throttled: INPUT_EVENTS_MOUSE_MOVE_THROTTLED
                .load(Ordering::Relaxed),
            input_events_mouse_scroll: INPUT_EVENTS_MOUSE_SCROLL.load(Ordering::Relaxed),
            hour_rollovers: HOUR_ROLLOVERS.load(Ordering::Relaxed),
            day_rollovers: DAY_ROLLOVERS.load(Ordering::Relaxed),
            ui_emits: UI_EMITS.load(Ordering::Relaxed),
            persist_ops: PERSIST_OPS.load(Ordering::Relaxed),
            persist_failures: PERSIST_FAILURES.load(Ordering::Relaxed),
        };

        PerfSnapshot {
            supported: true,
            uptime_ms: STARTED_AT.elapsed().as_millis() as u64,
            counters,
            timings: PerfTimings {
                flush: timing(&FLUSH_NS, &FLUSH_SAMPLES),
                persist_op: timing(&PERSIST_OP_NS, &PERSIST_OP_SAMPLES),
                focus_query: timing(&FOCUS_QUERY_NS, &FOCUS_QUERY_SAMPLES),
            },
        }
    }

    fn timing(total: &AtomicU64, samples: &AtomicU64) -> PerfTiming {
        let total_ns = total.load(Ordering::Relaxed);
        let samples = samples.load(Ordering::Relaxed);
        let avg_ns = if samples > 0 { total_ns / samples } else { 0 };
        PerfTiming {
            samples,
            total_ns,
            avg_ns,
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn bump_input(counter: &AtomicU64) {
        INPUT_EVENTS_TOTAL.fetch_add(1, Ordering::Relaxed);
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_input_key() {
        bump_input(&INPUT_EVENTS_KEY);
    }

    pub fn inc_input_mouse_click() {
        bump_input(&INPUT_EVENTS_MOUSE_CLICK);
    }

    pub fn inc_input_mouse_move() {
        bump_input(&INPUT_EVENTS_MOUSE_MOVE);
    }

    pub fn inc_input_mouse_move_throttled() {
        bump(&INPUT_EVENTS_MOUSE_MOVE_THROTTLED);
    }

    pub fn inc_input_mouse_scroll() {
        bump_input(&INPUT_EVENTS_MOUSE_SCROLL);
    }

    pub fn inc_hour_rollover() {
        bump(&HOUR_ROLLOVERS);
    }

    pub fn inc_day_rollover() {
        bump(&DAY_ROLLOVERS);
    }

    pub fn inc_ui_emit() {
        bump(&UI_EMITS);
    }

    pub fn inc_persist_ops() {
        bump(&PERSIST_OPS);
    }

    pub fn inc_persist_failures() {
        bump(&PERSIST_FAILURES);
    }

    pub fn record_duration(kind: TimerKind, duration: Duration) {
        let ns = duration.as_nanos() as u64;
        let (total, samples) = match kind {
            TimerKind::Flush => (&FLUSH_NS, &FLUSH_SAMPLES),
            TimerKind::PersistOp => (&PERSIST_OP_NS, &PERSIST_OP_SAMPLES),
            TimerKind::FocusQuery => (&FOCUS_QUERY_NS, &FOCUS_QUERY_SAMPLES),
        };
        total.fetch_add(ns, Ordering::Relaxed);
        samples.fetch_add(1, Ordering::Relaxed);
    }

    pub fn time<F, T>(kind: TimerKind, f: F) -> T
    where
        F: FnOnce() -> T,
    {
        let start = Instant::now();
        let out = f();
        record_duration(kind, start.elapsed());
        out
    }
}

#[cfg(not(any(debug_assertions, feature = "perf")))]
mod imp {
    use super::Serialize;
    use once_cell::sync::Lazy;
    use std::time::{Duration, Instant};

    static STARTED_AT: Lazy<Instant> = Lazy::new(Instant::now);

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct PerfSnapshot {
        pub supported: bool,
        pub uptime_ms: u64,
    }

    #[derive(Debug, Clone, Copy)]
    pub enum TimerKind {
        Flush,
        PersistOp,
        FocusQuery,
    }

    pub fn snapshot() -> PerfSnapshot {
        PerfSnapshot {
            supported: false,
            uptime_ms: STARTED_AT.elapsed().as_millis() as u64,
        }
    }

    pub fn inc_input_key() {}
    pub fn inc_input_mouse_click() {}
    pub fn inc_input_mouse_move() {}
    pub fn inc_input_mouse_move_throttled() {}
    pub fn inc_input_mouse_scroll() {}
    pub fn inc_hour_rollover() {}
    pub fn inc_day_rollover() {}
    pub fn inc_ui_emit() {}
    pub fn inc_persist_ops() {}
    pub fn inc_persist_failures() {}

    pub fn record_duration(_kind: TimerKind, _duration: Duration) {}

    pub fn time<F, T>(kind: TimerKind, f: F) -> T
    where
        F: FnOnce() -> T,
    {
        record_duration(kind, Duration::from_nanos(0));
        f()
    }
}

pub type PerfSnapshot = imp::PerfSnapshot;
pub type TimerKind = imp::TimerKind;

pub fn snapshot() -> PerfSnapshot {
    imp::snapshot()
}

pub fn inc_input_key() {
    imp::inc_input_key()
}

pub fn inc_input_mouse_click() {
    imp::inc_input_mouse_click()
}

pub fn inc_input_mouse_move() {
    imp::inc_input_mouse_move()
}

pub fn inc_input_mouse_move_throttled() {
    imp::inc_input_mouse_move_throttled()
}

pub fn inc_input_mouse_scroll() {
    imp::inc_input_mouse_scroll()
}

pub fn inc_hour_rollover() {
    imp::inc_hour_rollover()
}

pub fn inc_day_rollover() {
    imp::inc_day_rollover()
}

pub fn inc_ui_emit() {
    imp::inc_ui_emit()
}

pub fn inc_persist_ops() {
    imp::inc_persist_ops()
}

pub fn inc_persist_failures() {
    imp::inc_persist_failures()
}

pub fn record_duration(kind: TimerKind, duration: std::time::Duration) {
    imp::record_duration(kind, duration)
}

pub fn time<F, T>(kind: TimerKind, f: F) -> T
where
    F: FnOnce() -> T,
{
    imp::time(kind, f)
}

#[cfg(all(test, debug_assertions))]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reports_support_in_debug_builds() {
        let before = snapshot().counters.input_events_key;
        inc_input_key();
        let after = snapshot();
        assert!(after.supported);
        assert!(after.counters.input_events_key > before);
        assert!(after.counters.input_events_total >= after.counters.input_events_key);
    }
}
