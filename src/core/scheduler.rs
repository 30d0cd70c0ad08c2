use crate::core::clock::{until_next_hour, Clock};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

const MIN_PERIOD: Duration = Duration::from_millis(1);
// Lands boundary jobs just past the hour instead of racing it.
const BOUNDARY_SLACK: Duration = Duration::from_millis(50);

/// Owns the timer runtime and every periodic task spawned on it.
///
/// Must be created, shut down and dropped outside of any other tokio runtime.
pub struct Scheduler {
    runtime: Option<Runtime>,
    stop_tx: watch::Sender<bool>,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl Scheduler {
    pub fn new(worker_threads: usize) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(worker_threads.max(1))
            .thread_name("odometer-timer")
            .enable_time()
            .build()
            .context("Failed to build timer runtime")?;
        let (stop_tx, _) = watch::channel(false);
        Ok(Self {
            runtime: Some(runtime),
            stop_tx,
            tasks: Vec::new(),
        })
    }

    /// Runs `job` every `period`, first run one period from now. Late ticks
    /// are delayed rather than bunched.
    pub fn every<F>(&mut self, name: &'static str, period: Duration, job: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let Some(runtime) = self.runtime.as_ref() else {
            tracing::warn!(task = name, "scheduler already shut down; timer not started");
            return;
        };
        let period = period.max(MIN_PERIOD);
        let mut stop = self.stop_tx.subscribe();

        let handle = runtime.spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticker = tokio::time::interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => job(),
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!(task = name, "timer stopped");
        });
        self.tasks.push((name, handle));
    }

    /// Runs `job` just after every top of the hour on `clock`.
    pub fn at_hour_boundaries<F>(&mut self, name: &'static str, clock: Arc<dyn Clock>, job: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let Some(runtime) = self.runtime.as_ref() else {
            tracing::warn!(task = name, "scheduler already shut down; timer not started");
            return;
        };
        let mut stop = self.stop_tx.subscribe();

        let handle = runtime.spawn(async move {
            loop {
                let wait = until_next_hour(clock.now()) + BOUNDARY_SLACK;
                tokio::select! {
                    _ = tokio::time::sleep(wait) => job(),
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!(task = name, "boundary timer stopped");
        });
        self.tasks.push((name, handle));
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_running(&self) -> bool {
        self.runtime.is_some()
    }

    /// Stops every task and waits up to `timeout` for them. Returns false when
    /// something had to be abandoned. Idempotent.
    pub fn shutdown(&mut self, timeout: Duration) -> bool {
        let Some(runtime) = self.runtime.take() else {
            return true;
        };
        let _ = self.stop_tx.send(true);

        let deadline = Instant::now() + timeout;
        let mut clean = true;
        for (name, handle) in self.tasks.drain(..) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match runtime.block_on(tokio::time::timeout(remaining, handle)) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    clean = false;
                    tracing::warn!(task = name, error = %e, "timer task failed");
                }
                Err(_) => {
                    clean = false;
                    tracing::warn!(task = name, "timer task did not stop in time");
                }
            }
        }
        runtime.shutdown_timeout(deadline.saturating_duration_since(Instant::now()));
        clean
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown(Duration::from_secs(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[test]
    fn periodic_job_runs_until_shutdown() {
        let mut scheduler = Scheduler::new(1).expect("scheduler");
        let hits = Arc::new(AtomicU64::new(0));
        let counter = hits.clone();
        scheduler.every("test", Duration::from_millis(10), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(scheduler.task_count(), 1);

        std::thread::sleep(Duration::from_millis(200));
        assert!(scheduler.shutdown(Duration::from_secs(2)));
        let after_stop = hits.load(Ordering::SeqCst);
        assert!(after_stop >= 2);

        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(hits.load(Ordering::SeqCst), after_stop);
        assert!(!scheduler.is_running());
        assert!(scheduler.shutdown(Duration::from_secs(1)));
    }
}
