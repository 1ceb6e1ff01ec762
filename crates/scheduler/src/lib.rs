//! Background completion sweep.
//!
//! [`SweepScheduler`] runs a [`Sweep`] on a fixed interval until its
//! [`SchedulerHandle`] is shut down. The first run happens one interval after
//! start. A sweep in flight always finishes before shutdown returns.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use domain::{OrderService, SweepReport};
use metrics::counter;
use store::OrderStore;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Default time between two sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(120);

/// A job that completes due orders.
#[async_trait]
pub trait Sweep: Send + Sync + 'static {
    async fn sweep(&self) -> domain::Result<SweepReport>;
}

#[async_trait]
impl<S: OrderStore + 'static> Sweep for OrderService<S> {
    async fn sweep(&self) -> domain::Result<SweepReport> {
        OrderService::sweep(self).await
    }
}

/// Starts periodic sweeps.
pub struct SweepScheduler;

impl SweepScheduler {
    /// Spawns the sweep loop on the current runtime.
    pub fn start<T: Sweep + ?Sized>(task: Arc<T>, interval: Duration) -> SchedulerHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!(interval_secs = interval.as_secs(), "Sweep scheduler started");

            loop {
                tokio::select! {
                    _ = stop_rx.changed() => break,
                    _ = ticker.tick() => {
                        match task.sweep().await {
                            Ok(report) => tracing::debug!(
                                completed = report.completed,
                                "Scheduled sweep finished"
                            ),
                            Err(e) => {
                                counter!("order_sweep_failures_total").increment(1);
                                tracing::error!(error = %e, "Scheduled sweep failed");
                            }
                        }
                    }
                }
            }

            tracing::info!("Sweep scheduler stopped");
        });

        SchedulerHandle {
            stop: stop_tx,
            join,
        }
    }
}

/// Handle to a running sweep loop.
pub struct SchedulerHandle {
    stop: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stops the loop, waiting for a sweep in flight to finish.
    pub async fn shutdown(self) {
        // The loop may already have exited; a closed channel is fine
        let _ = self.stop.send(true);
        if let Err(e) = self.join.await {
            tracing::error!(error = ?e, "Sweep scheduler task failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{DomainError, OrderError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingSweep {
        runs: AtomicUsize,
        work: Duration,
        fail: bool,
    }

    #[async_trait]
    impl Sweep for CountingSweep {
        async fn sweep(&self) -> domain::Result<SweepReport> {
            tokio::time::sleep(self.work).await;
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(DomainError::Order(OrderError::InvalidInput(
                    "boom".to_string(),
                )));
            }
            Ok(SweepReport::default())
        }
    }

    const INTERVAL: Duration = Duration::from_secs(120);

    #[tokio::test(start_paused = true)]
    async fn test_first_sweep_waits_one_interval() {
        let task = Arc::new(CountingSweep::default());
        let handle = SweepScheduler::start(task.clone(), INTERVAL);

        tokio::time::sleep(INTERVAL - Duration::from_secs(1)).await;
        assert_eq!(task.runs.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(task.runs.load(Ordering::SeqCst), 1);

        tokio::time::sleep(INTERVAL * 2).await;
        assert_eq!(task.runs.load(Ordering::SeqCst), 3);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_do_not_stop_the_loop() {
        let task = Arc::new(CountingSweep {
            fail: true,
            ..Default::default()
        });
        let handle = SweepScheduler::start(task.clone(), INTERVAL);

        tokio::time::sleep(INTERVAL * 3 + Duration::from_secs(1)).await;
        assert_eq!(task.runs.load(Ordering::SeqCst), 3);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_waits_for_sweep_in_flight() {
        let task = Arc::new(CountingSweep {
            work: Duration::from_secs(30),
            ..Default::default()
        });
        let handle = SweepScheduler::start(task.clone(), INTERVAL);

        tokio::time::sleep(INTERVAL + Duration::from_secs(1)).await;
        assert_eq!(task.runs.load(Ordering::SeqCst), 0);

        handle.shutdown().await;
        assert_eq!(task.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_sweep_after_shutdown() {
        let task = Arc::new(CountingSweep::default());
        let handle = SweepScheduler::start(task.clone(), INTERVAL);

        handle.shutdown().await;
        tokio::time::sleep(INTERVAL * 2).await;
        assert_eq!(task.runs.load(Ordering::SeqCst), 0);
    }
}
