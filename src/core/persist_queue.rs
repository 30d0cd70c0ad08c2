use crate::core::store::{StatsStore, StoreResult};
use crate::models::{AppUsageDelta, DailyStats, HourlyStats, KeyStat, RawEvent};
use chrono::NaiveDate;
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Write requested by the aggregators. Every op carries owned snapshots so the
/// caller never holds its state lock while the store works.
#[derive(Debug)]
pub enum PersistOp {
    SaveDaily(DailyStats),
    SaveHourly(HourlyStats),
    SaveKeyStats(Vec<KeyStat>),
    SaveRawEvents(Vec<RawEvent>),
    SaveAppUsage(Vec<AppUsageDelta>),
    Cleanup { retention_days: i32, today: NaiveDate },
    /// Replies once every op queued before it has been applied.
    Barrier(Sender<()>),
}

impl PersistOp {
    fn name(&self) -> &'static str {
        match self {
            PersistOp::SaveDaily(_) => "save_daily",
            PersistOp::SaveHourly(_) => "save_hourly",
            PersistOp::SaveKeyStats(_) => "save_key_stats",
            PersistOp::SaveRawEvents(_) => "save_raw_events",
            PersistOp::SaveAppUsage(_) => "save_app_usage",
            PersistOp::Cleanup { .. } => "cleanup",
            PersistOp::Barrier(_) => "barrier",
        }
    }
}

/// Fire-and-forget handle to the single writer thread. Clones share the thread.
#[derive(Clone)]
pub struct PersistQueue {
    tx: Sender<PersistOp>,
}

impl PersistQueue {
    pub fn start(store: Arc<dyn StatsStore>) -> Self {
        let (tx, rx) = mpsc::channel::<PersistOp>();

        let spawned = std::thread::Builder::new()
            .name("odometer-writer".to_string())
            .spawn(move || {
                while let Ok(op) = rx.recv() {
                    apply(store.as_ref(), op);
                }
                tracing::debug!("persist queue drained; writer exiting");
            });
        if let Err(e) = spawned {
            // The receiver went down with the closure, so every later send fails
            // and gets logged there.
            tracing::error!(error = %e, "failed to spawn persist writer");
        }

        Self { tx }
    }

    pub fn enqueue(&self, op: PersistOp) {
        let name = op.name();
        if self.tx.send(op).is_err() {
            crate::core::perf::inc_persist_failures();
            tracing::warn!(op = name, "persist queue closed; write dropped");
        }
    }

    /// Blocks until everything queued so far is applied, or `timeout` passes.
    pub fn sync(&self, timeout: Duration) -> bool {
        let (reply_tx, reply_rx) = mpsc::channel();
        if self.tx.send(PersistOp::Barrier(reply_tx)).is_err() {
            return false;
        }
        reply_rx.recv_timeout(timeout).is_ok()
    }
}

fn apply(store: &dyn StatsStore, op: PersistOp) {
    let name = op.name();
    let started = Instant::now();
    let result = match op {
        PersistOp::Barrier(reply) => {
            let _ = reply.send(());
            return;
        }
        PersistOp::SaveDaily(day) => store.save_daily(&day),
        PersistOp::SaveHourly(hour) => store.save_hourly(&hour),
        PersistOp::SaveKeyStats(rows) => store.save_key_stats_batch(&rows),
        PersistOp::SaveRawEvents(events) => store.save_raw_events_batch(&events),
        PersistOp::SaveAppUsage(rows) => store.save_app_usage_batch(&rows),
        PersistOp::Cleanup {
            retention_days,
            today,
        } => cleanup(store, retention_days, today),
    };
    crate::core::perf::record_duration(crate::core::perf::TimerKind::PersistOp, started.elapsed());

    match result {
        Ok(()) => {
            crate::core::perf::inc_persist_ops();
            tracing::trace!(op = name, elapsed_us = started.elapsed().as_micros() as u64, "persisted");
        }
        Err(e) => {
            crate::core::perf::inc_persist_failures();
            tracing::warn!(op = name, error = %e, "persist failed; in-memory counters unaffected");
        }
    }
}

fn cleanup(store: &dyn StatsStore, retention_days: i32, today: NaiveDate) -> StoreResult<()> {
    let deleted = store.cleanup_older_than(retention_days, today)?;
    if deleted > 0 {
        tracing::info!(deleted, retention_days, "retention cleanup removed old rows");
    }
    Ok(())
}
