use crate::core::clock::Clock;
use crate::core::persist_queue::{PersistOp, PersistQueue};
use crate::models::stats::hour_of;
use crate::models::AppUsageDelta;
use chrono::{NaiveDate, NaiveDateTime};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Longest interval between two samples that is still attributed to an app.
/// Anything longer is treated as sleep or a stalled timer.
pub const MAX_TICK_GAP: Duration = Duration::from_secs(60);

const MS_PER_SECOND: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppContext {
    pub id: Arc<str>,
    pub name: Option<Arc<str>>,
}

impl AppContext {
    pub fn new(id: &str, name: Option<&str>) -> Self {
        Self {
            id: Arc::from(id),
            name: name.map(Arc::from),
        }
    }

    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name.trim(),
            _ => self.id.trim(),
        }
    }
}

/// OS-specific query for the application that currently has input focus.
pub trait FocusProvider: Send + Sync {
    fn focused_app(&self) -> Option<AppContext>;
}

/// Stand-in when no focus source is available; nothing gets attributed.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFocus;

impl FocusProvider for NoFocus {
    fn focused_app(&self) -> Option<AppContext> {
        None
    }
}

struct TrackerState {
    period: (NaiveDate, u8),
    pending_ms: HashMap<String, u64>,
    current: Option<String>,
    last_tick: Option<NaiveDateTime>,
}

/// Per-application focus time, accumulated per hour.
pub struct AppUsageTracker {
    state: Mutex<TrackerState>,
    focus: Arc<dyn FocusProvider>,
    clock: Arc<dyn Clock>,
    queue: PersistQueue,
}

fn period_of(at: NaiveDateTime) -> (NaiveDate, u8) {
    (at.date(), hour_of(at))
}

impl AppUsageTracker {
    pub fn new(focus: Arc<dyn FocusProvider>, clock: Arc<dyn Clock>, queue: PersistQueue) -> Self {
        let now = clock.now();
        Self {
            state: Mutex::new(TrackerState {
                period: period_of(now),
                pending_ms: HashMap::new(),
                current: None,
                last_tick: None,
            }),
            focus,
            clock,
            queue,
        }
    }

    /// Samples focus and credits the time since the previous tick to the app
    /// that was focused at that previous tick.
    pub fn tick(&self) {
        let app = crate::core::perf::time(crate::core::perf::TimerKind::FocusQuery, || {
            self.focus.focused_app()
        })
        .map(|ctx| ctx.display_name().to_string())
        .filter(|name| !name.is_empty());
        let now = self.clock.now();

        let mut state = self.state.lock();
        if let (Some(last), Some(prev)) = (state.last_tick, state.current.clone()) {
            // negative elapsed (clock went backwards) fails to_std and is dropped
            if let Ok(elapsed) = (now - last).to_std() {
                let ms = elapsed.as_millis() as u64;
                if elapsed > MAX_TICK_GAP {
                    tracing::debug!(gap_s = elapsed.as_secs(), app = %prev, "focus gap too long; not attributed");
                } else if ms > 0 {
                    state
                        .pending_ms
                        .entry(prev)
                        .and_modify(|v| *v = v.saturating_add(ms))
                        .or_insert(ms);
                }
            }
        }

        self.roll_period(&mut state, now);
        state.current = app;
        state.last_tick = Some(now);
    }

    /// Queues whole seconds per app; sub-second remainders stay pending.
    pub fn save(&self) {
        let now = self.clock.now();
        let mut state = self.state.lock();
        self.roll_period(&mut state, now);

        let (date, hour) = state.period;
        let mut deltas = Vec::new();
        for (app, ms) in state.pending_ms.iter_mut() {
            let seconds = *ms / MS_PER_SECOND;
            if seconds == 0 {
                continue;
            }
            *ms %= MS_PER_SECOND;
            deltas.push(AppUsageDelta {
                date,
                hour,
                app_name: app.clone(),
                seconds,
            });
        }
        state.pending_ms.retain(|_, ms| *ms > 0);

        if !deltas.is_empty() {
            self.queue.enqueue(PersistOp::SaveAppUsage(deltas));
        }
    }

    /// Flushes the pending map if the clock has left its hour. Returns whether
    /// a boundary was crossed.
    pub fn ensure_current_period(&self) -> bool {
        let now = self.clock.now();
        let mut state = self.state.lock();
        self.roll_period(&mut state, now)
    }

    pub fn current_app(&self) -> Option<String> {
        self.state.lock().current.clone()
    }

    /// Pending milliseconds per app for the live hour.
    pub fn pending_snapshot(&self) -> HashMap<String, u64> {
        self.state.lock().pending_ms.clone()
    }

    fn roll_period(&self, state: &mut TrackerState, now: NaiveDateTime) -> bool {
        let period = period_of(now);
        // A clock behind the live hour keeps crediting the live hour.
        if period <= state.period {
            return false;
        }

        let (date, hour) = state.period;
        let deltas: Vec<AppUsageDelta> = state
            .pending_ms
            .drain()
            .filter_map(|(app_name, ms)| {
                let seconds = ms / MS_PER_SECOND;
                (seconds > 0).then_some(AppUsageDelta {
                    date,
                    hour,
                    app_name,
                    seconds,
                })
            })
            .collect();
        if !deltas.is_empty() {
            self.queue.enqueue(PersistOp::SaveAppUsage(deltas));
        }

        tracing::debug!(%date, hour, "app usage period closed");
        state.period = period;
        true
    }
}
