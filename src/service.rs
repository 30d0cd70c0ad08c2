//! Wires the aggregators, the persist queue and the timers into one handle.

use crate::core::aggregator::StatsAggregator;
use crate::core::app_usage::{AppUsageTracker, FocusProvider};
use crate::core::clock::Clock;
use crate::core::notify::{Notifier, StatsEvent};
use crate::core::persist_queue::PersistQueue;
use crate::core::scheduler::Scheduler;
use crate::core::store::{StatsStore, StoreResult};
use crate::models::{
    AppUsageTotal, DailyStats, HourlyStats, LifetimeStats, MouseButton, Settings, UsageRange,
};
use anyhow::Result;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::Instant;

const TIMER_THREADS: usize = 2;

pub struct TelemetryService {
    settings: Settings,
    stats: Arc<StatsAggregator>,
    apps: Arc<AppUsageTracker>,
    store: Arc<dyn StatsStore>,
    clock: Arc<dyn Clock>,
    queue: PersistQueue,
    notifier: Arc<Notifier>,
    scheduler: Scheduler,
    stopped: bool,
}

impl TelemetryService {
    /// Starts the writer thread, both aggregators and all five timers.
    pub fn start(
        settings: Settings,
        store: Arc<dyn StatsStore>,
        focus: Arc<dyn FocusProvider>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let settings = settings.normalized();
        let queue = PersistQueue::start(store.clone());
        let notifier = Arc::new(Notifier::new());

        let stats = Arc::new(StatsAggregator::new(
            settings.clone(),
            clock.clone(),
            store.clone(),
            queue.clone(),
            notifier.clone(),
        ));
        let apps = Arc::new(AppUsageTracker::new(focus, clock.clone(), queue.clone()));

        let mut scheduler = Scheduler::new(TIMER_THREADS)?;
        {
            let stats = stats.clone();
            scheduler.every("flush", settings.flush_interval(), move || stats.flush());
        }
        {
            let stats = stats.clone();
            let apps = apps.clone();
            scheduler.at_hour_boundaries("period-boundary", clock.clone(), move || {
                stats.ensure_current_period();
                apps.ensure_current_period();
            });
        }
        {
            let stats = stats.clone();
            scheduler.every("ui-update", settings.ui_update_interval(), move || {
                stats.publish_if_dirty();
            });
        }
        {
            let apps = apps.clone();
            scheduler.every("app-sample", settings.app_sample_interval(), move || apps.tick());
        }
        {
            let apps = apps.clone();
            scheduler.every("app-save", settings.app_save_interval(), move || apps.save());
        }

        tracing::info!(
            flush_ms = settings.flush_interval_ms,
            retention_days = settings.retention_days,
            raw_events = settings.raw_event_logging,
            "telemetry service started"
        );

        Ok(Self {
            settings,
            stats,
            apps,
            store,
            clock,
            queue,
            notifier,
            scheduler,
            stopped: false,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn subscribe(&self) -> Receiver<StatsEvent> {
        self.notifier.subscribe()
    }

    pub fn stats(&self) -> &Arc<StatsAggregator> {
        &self.stats
    }

    pub fn app_usage(&self) -> &Arc<AppUsageTracker> {
        &self.apps
    }

    pub fn record_key_press(&self, key: &str) {
        self.stats.record_key_press(key);
    }

    pub fn record_mouse_move(&self, pixels: f64) {
        self.stats.record_mouse_move(pixels);
    }

    pub fn record_mouse_click(&self, button: MouseButton) {
        self.stats.record_mouse_click(button);
    }

    pub fn record_mouse_scroll(&self, delta: i32) {
        self.stats.record_mouse_scroll(delta);
    }

    pub fn current_stats(&self) -> DailyStats {
        self.stats.current_stats()
    }

    pub fn current_hour(&self) -> HourlyStats {
        self.stats.current_hour()
    }

    pub fn last_key_pressed(&self) -> Option<String> {
        self.stats.last_key_pressed()
    }

    pub fn reset_today(&self) {
        self.stats.reset();
    }

    pub fn lifetime_stats(&self) -> StoreResult<LifetimeStats> {
        self.stats.lifetime_stats()
    }

    pub fn app_usage_totals(&self, range: UsageRange) -> StoreResult<Vec<AppUsageTotal>> {
        self.store.get_app_usage(range, self.clock.now().date())
    }

    pub fn get_daily_range(
        &self,
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    ) -> StoreResult<Vec<DailyStats>> {
        self.store.get_daily_range(start, end)
    }

    /// Flushes both aggregators and waits for the writer to catch up.
    pub fn flush_now(&self) -> bool {
        self.stats.flush();
        self.apps.save();
        self.queue.sync(self.settings.shutdown_timeout())
    }

    /// Stops the timers, flushes everything and waits for the writer, bounded
    /// by the configured shutdown timeout. Returns false if the wait timed out.
    pub fn shutdown(&mut self) -> bool {
        if self.stopped {
            return true;
        }
        self.stopped = true;

        // one deadline covers both the timers and the writer
        let timeout = self.settings.shutdown_timeout();
        let deadline = Instant::now() + timeout;
        if !self.scheduler.shutdown(timeout) {
            tracing::warn!("some timers did not stop cleanly");
        }

        self.stats.flush();
        self.apps.save();
        let synced = self
            .queue
            .sync(deadline.saturating_duration_since(Instant::now()));
        if synced {
            tracing::info!("telemetry service stopped");
        } else {
            tracing::warn!(
                timeout_ms = self.settings.shutdown_timeout_ms,
                "final flush did not finish before the shutdown timeout"
            );
        }
        synced
    }
}

impl Drop for TelemetryService {
    fn drop(&mut self) {
        self.shutdown();
    }
}
