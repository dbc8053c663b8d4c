//! Fixed-interval scheduler for pipeline cycles.
//!
//! The first tick fires immediately, then once per interval. Each cycle runs on its
//! own task so a slow cycle never delays the timer; what happens to a tick that lands
//! while a cycle is still running is decided by [`OverlapPolicy`]. A failed (or
//! panicking) cycle is logged and the timer keeps going.
//!
//! Cancelling stops the timer and drops queued ticks. Cycles already running are
//! awaited to completion; there is no per-cycle timeout.
use std::fmt::{Debug, Display};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlapPolicy {
    /// Drop the tick.
    #[default]
    Skip,
    /// Start the cycle once the running one finishes. At most one tick waits.
    Queue,
    /// No guard; cycles may run side by side.
    Concurrent,
}

pub struct Scheduler {
    interval: Duration,
    overlap: OverlapPolicy,
    cancel: CancellationToken,
}

impl Scheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            overlap: OverlapPolicy::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_overlap(mut self, overlap: OverlapPolicy) -> Self {
        self.overlap = overlap;
        self
    }

    /// Token that stops [`Scheduler::run`] when cancelled.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Drive `job` until cancelled. `job` is called once per accepted tick and the
    /// returned future is spawned.
    pub async fn run<F, Fut, R, E>(&self, mut job: F)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        R: Debug + Send + 'static,
        E: Display + Send + 'static,
    {
        // Running slot, plus one waiting slot for OverlapPolicy::Queue.
        let running = Arc::new(Semaphore::new(1));
        let waiting = Arc::new(Semaphore::new(1));
        let cycle_seq = Arc::new(AtomicU64::new(0));
        let mut inflight: JoinSet<()> = JoinSet::new();

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            interval_secs = self.interval.as_secs(),
            overlap = ?self.overlap,
            "scheduler.start"
        );

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            while let Some(res) = inflight.try_join_next() {
                log_join(res);
            }

            match self.overlap {
                OverlapPolicy::Skip => {
                    let Ok(permit) = running.clone().try_acquire_owned() else {
                        warn!("scheduler.tick.skipped_overlap");
                        continue;
                    };
                    let fut = job();
                    let seq = cycle_seq.clone();
                    inflight.spawn(async move {
                        let _permit = permit;
                        run_one(seq, fut).await;
                    });
                }
                OverlapPolicy::Queue => {
                    let Ok(wait_slot) = waiting.clone().try_acquire_owned() else {
                        warn!("scheduler.tick.skipped_queue_full");
                        continue;
                    };
                    let fut = job();
                    let seq = cycle_seq.clone();
                    let running = running.clone();
                    let cancel = self.cancel.clone();
                    inflight.spawn(async move {
                        let permit = tokio::select! {
                            permit = running.acquire_owned() => permit,
                            _ = cancel.cancelled() => {
                                info!("scheduler.tick.queued_dropped");
                                return;
                            }
                        };
                        let Ok(_permit) = permit else {
                            return;
                        };
                        drop(wait_slot);
                        run_one(seq, fut).await;
                    });
                }
                OverlapPolicy::Concurrent => {
                    let fut = job();
                    let seq = cycle_seq.clone();
                    inflight.spawn(run_one(seq, fut));
                }
            }
        }

        info!(in_flight = inflight.len(), "scheduler.stopping");
        while let Some(res) = inflight.join_next().await {
            log_join(res);
        }
        info!("scheduler.stopped");
    }
}

async fn run_one<Fut, R, E>(seq: Arc<AtomicU64>, fut: Fut)
where
    Fut: Future<Output = Result<R, E>>,
    R: Debug,
    E: Display,
{
    let cycle = seq.fetch_add(1, Ordering::Relaxed) + 1;
    info!(cycle, "scheduler.cycle.start");
    match fut.await {
        Ok(report) => info!(cycle, report = ?report, "scheduler.cycle.ok"),
        Err(err) => error!(cycle, error = %err, "scheduler.cycle.failed"),
    }
}

fn log_join(res: Result<(), tokio::task::JoinError>) {
    if let Err(err) = res {
        if err.is_panic() {
            error!(error = %err, "scheduler.cycle.panicked");
        }
    }
}
