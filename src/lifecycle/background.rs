//! Periodic background maintenance.
//!
//! # Responsibilities
//! - Run a container's maintenance work on a fixed delay while it is running
//! - Keep maintenance off request threads (blocking pool of the runtime)
//! - Stop cleanly: once `cancel()` returns, the work never runs again
//!
//! # Design Decisions
//! - One task per subtree root; children without their own delay are
//!   visited by the root's run
//! - A failing (panicking) run is logged and counted; later runs still fire
//! - Once cancelled no new run starts, whatever runtime the caller is on
//! - `cancel()` waits for an in-flight run to finish when called off-runtime
//!   or on a multi-thread runtime; on a current-thread runtime it cannot
//!   block without stalling the loop it waits for, so it returns at once

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::broadcast;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::observability::DispatchMetrics;

/// Handle to a scheduled maintenance loop.
pub struct BackgroundTask {
    name: String,
    cancelled: Arc<AtomicBool>,
    stop_tx: broadcast::Sender<()>,
    done_rx: mpsc::Receiver<()>,
}

impl BackgroundTask {
    /// Schedule `work` every `delay` on the given runtime, first run after one delay.
    pub fn spawn<F>(handle: &Handle, name: impl Into<String>, delay: Duration, metrics: DispatchMetrics, work: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let name = name.into();
        let cancelled = Arc::new(AtomicBool::new(false));
        let loop_cancelled = cancelled.clone();
        let (stop_tx, mut stop_rx) = broadcast::channel::<()>(1);
        let (done_tx, done_rx) = mpsc::channel::<()>();
        let work = Arc::new(work);
        let task_name = name.clone();

        handle.spawn(async move {
            // Dropped when the loop exits; `cancel()` waits on it.
            let _done = done_tx;
            let mut ticker = time::interval_at(Instant::now() + delay, delay);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            tracing::debug!(container = %task_name, delay_ms = delay.as_millis() as u64, "Background processor starting");

            loop {
                tokio::select! {
                    biased;
                    _ = stop_rx.recv() => {
                        tracing::debug!(container = %task_name, "Background processor received stop signal, exiting loop");
                        break;
                    }
                    _ = ticker.tick() => {
                        if loop_cancelled.load(Ordering::Acquire) {
                            break;
                        }
                        let work = work.clone();
                        let run_cancelled = loop_cancelled.clone();
                        let run = tokio::task::spawn_blocking(move || {
                            if !run_cancelled.load(Ordering::Acquire) {
                                (*work)();
                            }
                        });
                        match run.await {
                            Ok(()) => metrics.record_background_run(),
                            Err(e) => {
                                tracing::error!(container = %task_name, error = %e, "Background processing failed");
                                metrics.record_background_failure();
                            }
                        }
                    }
                }
            }
        });

        Self {
            name,
            cancelled,
            stop_tx,
            done_rx,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Signal the loop to stop. No run starts after this returns.
    ///
    /// Waits for the loop to exit unless the caller is on a current-thread
    /// runtime. Must not be called from inside the task's own work closure.
    pub fn cancel(self) {
        self.cancelled.store(true, Ordering::Release);
        let _ = self.stop_tx.send(());

        // Err from recv means the sender was dropped: the loop is gone either way.
        match Handle::try_current() {
            Err(_) => {
                let _ = self.done_rx.recv();
            }
            Ok(current) if current.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| {
                    let _ = self.done_rx.recv();
                });
            }
            Ok(_) => {
                tracing::debug!(container = %self.name, "Current-thread runtime, not waiting for background loop to exit");
            }
        }
        tracing::debug!(container = %self.name, "Background processor stopped");
    }
}

impl std::fmt::Debug for BackgroundTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundTask").field("name", &self.name).finish()
    }
}
