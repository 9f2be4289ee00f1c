//! Background Expiry Sweeper
//!
//! This module implements the recurring task that scans the entry registry
//! and flags entries whose time-to-live has elapsed. This is "active
//! detection", as opposed to the lazy check a read performs on its own key.
//!
//! ## What the sweeper does NOT do
//!
//! It does not remove values. An expired entry stays in the store until the
//! next read serves it one last time and evicts it (expire-after-serving).
//! The only exception is the optional reaper, enabled through
//! [`CacheConfig::reap_after`](crate::CacheConfig::reap_after), which removes
//! entries that stayed expired and unread for longer than a grace period.
//!
//! ## Scheduling
//!
//! One tokio task per cache instance. The scan runs inline in that task, so
//! two scans never overlap. When a scan overruns the interval, one late tick
//! fires as soon as it ends and the rest of the missed ticks are dropped;
//! the schedule then resumes from that late tick.
//!
//! ```text
//!   tick ──> sweep() ──> tick ──> sweep() ─────────────> late tick ──> sweep()
//!            │                     │  long scan          (fires at once)
//!            ▼                     ▼
//!       notify listeners      notify listeners
//! ```

use crate::error::{CacheError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, trace};

/// Something the sweeper can scan.
pub trait Sweep: Send + Sync + 'static {
    /// Performs one scan at `now`.
    fn sweep(&self, now: Instant) -> SweepReport;
}

/// Outcome of a single scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Entries flagged as expired by this scan
    pub expired: usize,
    /// Expired entries removed by the reaper
    pub reaped: usize,
    /// Listener invocations that failed
    pub listener_failures: usize,
}

/// A handle to the running expiry sweeper.
///
/// When this handle is dropped, the sweeper task will be stopped.
#[derive(Debug)]
pub struct ExpirySweeper {
    /// Sender to signal shutdown
    shutdown_tx: watch::Sender<bool>,
    /// The spawned task
    task: JoinHandle<()>,
}

impl ExpirySweeper {
    /// Starts the sweeper as a background task on the current tokio runtime.
    ///
    /// The first scan happens one `interval` after start.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::NoRuntime`] when called outside a runtime.
    pub fn start<S: Sweep>(target: Arc<S>, interval: Duration) -> Result<Self> {
        let handle = Handle::try_current().map_err(|_| CacheError::NoRuntime)?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = handle.spawn(sweeper_loop(target, interval, shutdown_rx));

        info!(
            interval_ms = interval.as_millis() as u64,
            "Background expiry sweeper started"
        );

        Ok(Self { shutdown_tx, task })
    }

    /// Stops the sweeper. No scan starts after this returns; a scan already
    /// in progress is allowed to finish.
    ///
    /// This is called automatically when the handle is dropped.
    pub fn stop(&self) {
        if self.shutdown_tx.send_replace(true) {
            return;
        }
        info!("Background expiry sweeper stopped");
    }

    /// Returns true once stop was requested.
    pub fn is_stopped(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Returns true once the task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The main sweeper loop.
async fn sweeper_loop<S: Sweep>(
    target: Arc<S>,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        // Wait for the next tick or the shutdown signal
        tokio::select! {
            biased;
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Expiry sweeper received shutdown signal");
                    return;
                }
                continue;
            }
            _ = ticker.tick() => {}
        }

        if *shutdown_rx.borrow() {
            debug!("Expiry sweeper received shutdown signal");
            return;
        }

        let started = Instant::now();
        let report = target.sweep(started);

        if report.expired > 0 || report.reaped > 0 {
            debug!(
                expired = report.expired,
                reaped = report.reaped,
                listener_failures = report.listener_failures,
                elapsed_us = started.elapsed().as_micros() as u64,
                "Expiry sweep flagged entries"
            );
        } else {
            trace!("Expiry sweep found nothing new");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counter {
        scans: AtomicUsize,
    }

    impl Sweep for Counter {
        fn sweep(&self, _now: Instant) -> SweepReport {
            self.scans.fetch_add(1, Ordering::SeqCst);
            SweepReport::default()
        }
    }

    #[test]
    fn test_start_outside_runtime_fails() {
        let result = ExpirySweeper::start(Arc::new(Counter::default()), Duration::from_secs(1));
        assert_eq!(result.unwrap_err(), CacheError::NoRuntime);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_ticks_on_interval() {
        let counter = Arc::new(Counter::default());
        let _sweeper = ExpirySweeper::start(Arc::clone(&counter), Duration::from_secs(1)).unwrap();

        // No scan at start
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(counter.scans.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(counter.scans.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(counter.scans.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_stops() {
        let counter = Arc::new(Counter::default());
        let sweeper = ExpirySweeper::start(Arc::clone(&counter), Duration::from_millis(100)).unwrap();

        tokio::time::sleep(Duration::from_millis(250)).await;
        let before = counter.scans.load(Ordering::SeqCst);
        assert_eq!(before, 2);

        sweeper.stop();
        assert!(sweeper.is_stopped());
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(counter.scans.load(Ordering::SeqCst), before);
        assert!(sweeper.is_finished());
    }

    /// Blocks for `scan_time` on every scan and tracks concurrent scans.
    struct SlowScan {
        scan_time: Duration,
        active: AtomicUsize,
        max_active: AtomicUsize,
        starts: std::sync::Mutex<Vec<std::time::Instant>>,
    }

    impl Sweep for SlowScan {
        fn sweep(&self, _now: Instant) -> SweepReport {
            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(active, Ordering::SeqCst);
            self.starts.lock().unwrap().push(std::time::Instant::now());
            std::thread::sleep(self.scan_time);
            self.active.fetch_sub(1, Ordering::SeqCst);
            SweepReport::default()
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_overrunning_scans_never_overlap() {
        let scan_time = Duration::from_millis(60);
        let target = Arc::new(SlowScan {
            scan_time,
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            starts: std::sync::Mutex::new(Vec::new()),
        });

        let run_for = Duration::from_millis(400);
        let sweeper = ExpirySweeper::start(Arc::clone(&target), Duration::from_millis(20)).unwrap();
        tokio::time::sleep(run_for).await;
        sweeper.stop();
        // Let a scan in progress finish
        tokio::time::sleep(scan_time * 2).await;

        let starts = target.starts.lock().unwrap().clone();
        assert!(starts.len() >= 2);
        assert_eq!(target.max_active.load(Ordering::SeqCst), 1);

        // Missed ticks are not replayed in a burst after an overrun
        let budget = (run_for + scan_time * 2).as_millis() / scan_time.as_millis();
        assert!(starts.len() as u128 <= budget, "scans = {}", starts.len());
        for pair in starts.windows(2) {
            assert!(pair[1].duration_since(pair[0]) >= scan_time);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_stops_on_drop() {
        let counter = Arc::new(Counter::default());

        {
            let _sweeper =
                ExpirySweeper::start(Arc::clone(&counter), Duration::from_millis(10)).unwrap();
            tokio::time::sleep(Duration::from_millis(35)).await;
            // Sweeper is dropped here
        }
        let after_drop = counter.scans.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(counter.scans.load(Ordering::SeqCst), after_drop);
        // The task released its reference to the target
        assert_eq!(Arc::strong_count(&counter), 1);
    }
}
