// Dispatch loop: claims queued jobs and solves them on a bounded worker pool.

use super::service::OptimizationService;
use crate::domain::job::Job;
use crate::domain::solver_adapter::CancelToken;
use std::sync::Arc;
use tokio::sync::{watch, Notify, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub struct Dispatcher;

/// Handle for stopping the dispatch loop.
pub struct DispatcherHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Dispatcher {
    /// Spawn the dispatch loop with `workers` concurrent solver slots.
    pub fn start(service: Arc<OptimizationService>, workers: usize) -> DispatcherHandle {
        let workers = workers.max(1);
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run_loop(service, workers, shutdown_rx));
        DispatcherHandle { shutdown, task }
    }
}

impl DispatcherHandle {
    /// Stop claiming new jobs and wait for the loop to exit. Jobs already
    /// handed to a worker run to completion in their own tasks.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

async fn run_loop(
    service: Arc<OptimizationService>,
    workers: usize,
    mut shutdown: watch::Receiver<bool>,
) {
    let semaphore = Arc::new(Semaphore::new(workers));
    let wake = service.wake_signal();
    info!(workers, "dispatcher started");

    loop {
        // Hold a worker slot before claiming, so a claimed job never waits
        // behind other solves.
        let permit = tokio::select! {
            permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
            _ = shutdown.changed() => break,
        };

        let Some((job, token)) = next_job(&service, &wake, &mut shutdown).await else {
            break;
        };

        let service = Arc::clone(&service);
        tokio::spawn(async move {
            let _slot = permit;
            let adapter = service.adapter();
            let config = job.model.config();
            debug!(job_id = %job.id, backend = adapter.name(), "worker picked up job");
            let result = adapter.solve(&job.model, &config, &token).await;
            service.finish_job(job, result);
        });
    }

    info!("dispatcher stopped");
}

/// Claim the next queued job, sleeping on the wake signal while the queue
/// is empty. Returns `None` once shutdown is requested.
async fn next_job(
    service: &OptimizationService,
    wake: &Notify,
    shutdown: &mut watch::Receiver<bool>,
) -> Option<(Job, CancelToken)> {
    loop {
        if *shutdown.borrow() {
            return None;
        }
        if let Some(claimed) = service.claim_next() {
            return Some(claimed);
        }
        tokio::select! {
            _ = wake.notified() => {}
            _ = shutdown.changed() => {}
        }
    }
}
