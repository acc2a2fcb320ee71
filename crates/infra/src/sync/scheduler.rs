//! Periodic sync runs with a manual trigger and graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::{RunSummary, SyncError, SyncRunner};

type TriggerReply = oneshot::Sender<Result<RunSummary, SyncError>>;

/// Drives `SyncRunner::run_all` from a single task, so runs never overlap.
pub struct SyncScheduler {
    runner: Arc<SyncRunner>,
    interval: Duration,
}

/// Handle to control a running scheduler.
#[derive(Debug)]
pub struct SyncSchedulerHandle {
    shutdown: Arc<Notify>,
    trigger: mpsc::Sender<TriggerReply>,
    join: Option<JoinHandle<()>>,
}

impl SyncScheduler {
    pub fn new(runner: Arc<SyncRunner>, interval: Duration) -> Self {
        Self { runner, interval }
    }

    /// Start the loop. The first run happens immediately.
    pub fn spawn(self) -> SyncSchedulerHandle {
        let shutdown = Arc::new(Notify::new());
        let (trigger_tx, trigger_rx) = mpsc::channel::<TriggerReply>(8);

        let join = tokio::spawn(scheduler_loop(self.runner, self.interval, shutdown.clone(), trigger_rx));

        SyncSchedulerHandle {
            shutdown,
            trigger: trigger_tx,
            join: Some(join),
        }
    }
}

impl SyncSchedulerHandle {
    /// Run now and wait for the result.
    pub async fn trigger(&self) -> Result<RunSummary, SyncError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.trigger
            .send(reply_tx)
            .await
            .map_err(|_| SyncError::SchedulerStopped)?;
        reply_rx.await.map_err(|_| SyncError::SchedulerStopped)?
    }

    /// Stop after the current run (if any) and wait for the task to end.
    pub async fn shutdown(mut self) {
        self.shutdown.notify_one();
        if let Some(join) = self.join.take() {
            let _ = join.await;
        }
    }
}

async fn scheduler_loop(
    runner: Arc<SyncRunner>,
    interval: Duration,
    shutdown: Arc<Notify>,
    mut trigger_rx: mpsc::Receiver<TriggerReply>,
) {
    info!(interval_secs = interval.as_secs(), "order sync scheduler started");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.notified() => {
                info!("order sync scheduler received shutdown signal");
                break;
            }
            Some(reply) = trigger_rx.recv() => {
                debug!("manual order sync run requested");
                let result = runner.run_all().await;
                let _ = reply.send(result);
            }
            _ = ticker.tick() => {
                if let Err(e) = runner.run_all().await {
                    error!(error = %e, "scheduled order sync run failed");
                }
            }
        }
    }

    info!("order sync scheduler stopped");
}
