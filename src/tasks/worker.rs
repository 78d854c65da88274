use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::dispatch::CertificateDispatch;
use crate::config::WorkerConfig;

/// Fixed set of workers draining the dispatch queue until shutdown.
pub struct WorkerPool {
    dispatch: Arc<CertificateDispatch>,
    concurrency: usize,
    poll_interval: Duration,
}

impl WorkerPool {
    pub fn new(dispatch: Arc<CertificateDispatch>, config: &WorkerConfig) -> Self {
        Self {
            dispatch,
            concurrency: config.concurrency.max(1),
            poll_interval: config.poll_interval,
        }
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        info!(concurrency = self.concurrency, "Starting dispatch workers");
        (0..self.concurrency)
            .map(|worker| {
                let dispatch = self.dispatch.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(work(worker, dispatch, self.poll_interval, shutdown))
            })
            .collect()
    }

    /// Spawns the workers and waits for all of them to stop.
    pub async fn run(self, shutdown: watch::Receiver<bool>) {
        for handle in self.spawn(shutdown) {
            if let Err(e) = handle.await {
                error!(error = %e, "Dispatch worker panicked");
            }
        }
    }
}

async fn idle(poll_interval: Duration, shutdown: &mut watch::Receiver<bool>) {
    tokio::select! {
        _ = tokio::time::sleep(poll_interval) => {}
        _ = shutdown.changed() => {}
    }
}

async fn work(
    worker: usize,
    dispatch: Arc<CertificateDispatch>,
    poll_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let queue = dispatch.queue();
    while !*shutdown.borrow() {
        match queue.requeue_expired().await {
            Ok(0) => {}
            Ok(moved) => warn!(worker, moved, "Reclaimed dispatch jobs with expired leases"),
            Err(e) => error!(worker, error = %e, "Failed to reclaim expired dispatch jobs"),
        }

        match queue.pop_ready().await {
            Ok(Some(job)) => {
                debug!(worker, task_id = %job.task_id, attempt = job.attempt, "Claimed dispatch job");
                let task_id = job.task_id;
                if let Err(e) = dispatch.process(job).await {
                    error!(worker, %task_id, error = %e, "Dispatch bookkeeping failed, job returns when its lease expires");
                }
            }
            Ok(None) => idle(poll_interval, &mut shutdown).await,
            Err(e) => {
                error!(worker, error = %e, "Failed to poll dispatch queue");
                idle(poll_interval, &mut shutdown).await;
            }
        }
    }
    debug!(worker, "Dispatch worker stopped");
}
