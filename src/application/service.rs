// Job lifecycle orchestration: submission, claiming, completion, cancellation.

use super::queue::JobQueue;
use super::store::{JobFilter, JobStore};
use crate::domain::job::{CreateJobRequest, Job, JobId};
use crate::domain::models::{Solution, ValidationError};
use crate::domain::solver_adapter::{CancelToken, SolverAdapter, SolverError};
use crate::domain::value_objects::{JobStatus, SolutionStatus};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, Notify};
use tracing::{error, info};

/// Capacity of the event channel feeding WatchJob streams. Slow watchers
/// that fall further behind than this miss intermediate snapshots.
const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Invalid model: {0}")]
    InvalidModel(#[from] ValidationError),

    #[error("Job {0} not found")]
    NotFound(JobId),

    #[error("Job {0} has no solution attached")]
    SolutionNotReady(JobId),

    #[error("Job {id} is {status} and cannot be cancelled")]
    NotCancellable { id: JobId, status: JobStatus },
}

/// Counters reported by GetEngineInfo.
#[derive(Debug, Clone, Copy)]
pub struct EngineStats {
    pub queued: usize,
    pub processing: usize,
    pub stored: usize,
    pub backend: &'static str,
    pub degraded: bool,
}

struct EngineState {
    queue: JobQueue,
    store: JobStore,
    cancellations: HashMap<JobId, CancelToken>,
}

/// Shared engine facade; every lifecycle transition funnels through here.
///
/// The mutex guards short synchronous sections only and is never held
/// across an await point. Each transition publishes the job's new snapshot
/// on the event channel and, on submission, wakes the dispatcher.
pub struct OptimizationService {
    state: Mutex<EngineState>,
    adapter: Arc<dyn SolverAdapter>,
    events: broadcast::Sender<Job>,
    wake: Arc<Notify>,
}

impl OptimizationService {
    pub fn new(adapter: Arc<dyn SolverAdapter>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Mutex::new(EngineState {
                queue: JobQueue::new(),
                store: JobStore::new(),
                cancellations: HashMap::new(),
            }),
            adapter,
            events,
            wake: Arc::new(Notify::new()),
        }
    }

    /// The solver backend jobs from this service are dispatched to.
    pub fn adapter(&self) -> Arc<dyn SolverAdapter> {
        Arc::clone(&self.adapter)
    }

    pub(crate) fn wake_signal(&self) -> Arc<Notify> {
        Arc::clone(&self.wake)
    }

    /// Validate a submission, enqueue it and return the QUEUED snapshot.
    pub fn create_job(&self, request: CreateJobRequest) -> Result<Job, ServiceError> {
        self.adapter.validate(&request.model)?;

        let job = Job::new(request.model, request.metadata);
        info!(
            job_id = %job.id,
            user = %job.metadata.user_id,
            model = %job.model.name,
            priority = %job.priority(),
            "job submitted"
        );

        let job = {
            let mut state = self.state.lock();
            let job = state.queue.enqueue(job);
            state.store.insert(job.clone());
            job
        };

        self.publish(job.clone());
        self.wake.notify_one();
        Ok(job)
    }

    pub fn get_job(&self, id: JobId) -> Result<Job, ServiceError> {
        self.state
            .lock()
            .store
            .get(&id)
            .cloned()
            .ok_or(ServiceError::NotFound(id))
    }

    /// Fetch the solution attached to a job, for jobs that have one. Failed
    /// jobs keep the solver's report when the solver produced one.
    pub fn get_solution(&self, id: JobId) -> Result<Solution, ServiceError> {
        let job = self.get_job(id)?;
        job.solution.ok_or(ServiceError::SolutionNotReady(id))
    }

    /// List stored jobs newest first. Returns the page and the total match
    /// count before pagination.
    pub fn list_jobs(&self, filter: &JobFilter) -> (Vec<Job>, usize) {
        self.state.lock().store.list(filter)
    }

    /// Cancel a job.
    ///
    /// Waiting jobs leave the queue and become CANCELLED immediately. For a
    /// running job this only signals the cancel token; the worker observes
    /// it and drives the job to CANCELLED through `finish_job`, so the
    /// returned snapshot is still RUNNING. Terminal jobs are rejected.
    pub fn cancel_job(&self, id: JobId) -> Result<Job, ServiceError> {
        let mut state = self.state.lock();
        let job = state
            .store
            .get(&id)
            .cloned()
            .ok_or(ServiceError::NotFound(id))?;

        match job.status {
            JobStatus::Pending | JobStatus::Queued => {
                state.queue.remove(&id);
                let mut job = job;
                job.finish(JobStatus::Cancelled, false);
                state.store.insert(job.clone());
                drop(state);

                info!(job_id = %id, "queued job cancelled");
                self.publish(job.clone());
                Ok(job)
            }
            JobStatus::Running => {
                if let Some(token) = state.cancellations.get(&id) {
                    token.cancel();
                }
                drop(state);

                info!(job_id = %id, "cancellation signalled to running solver");
                Ok(job)
            }
            status => Err(ServiceError::NotCancellable { id, status }),
        }
    }

    /// Subscribe to job snapshots and fetch the current one. Subscribing
    /// before the snapshot read means no transition can fall in between.
    pub fn watch_job(&self, id: JobId) -> Result<(Job, broadcast::Receiver<Job>), ServiceError> {
        let receiver = self.events.subscribe();
        let job = self.get_job(id)?;
        Ok((job, receiver))
    }

    pub fn stats(&self) -> EngineStats {
        let state = self.state.lock();
        EngineStats {
            queued: state.queue.len(),
            processing: state.queue.processing_count(),
            stored: state.store.len(),
            backend: self.adapter.name(),
            degraded: self.adapter.is_degraded(),
        }
    }

    /// Claim the next queued job for a worker. Returns the RUNNING snapshot
    /// and the cancel token registered for it.
    pub fn claim_next(&self) -> Option<(Job, CancelToken)> {
        let (job, token) = {
            let mut state = self.state.lock();
            let mut job = state.queue.dequeue()?;
            job.mark_running();
            let token = CancelToken::new();
            state.cancellations.insert(job.id, token.clone());
            state.store.insert(job.clone());
            (job, token)
        };

        info!(job_id = %job.id, "job claimed by worker");
        self.publish(job.clone());
        Some((job, token))
    }

    /// Drive a claimed job to its terminal state from the solver's outcome.
    ///
    /// A solution whose status is ERROR fails the job while keeping the
    /// solver's report attached. A `Cancelled` error closes the job as
    /// CANCELLED; every other error fails it with the message recorded in
    /// the job metadata.
    pub fn finish_job(&self, mut job: Job, result: Result<Solution, SolverError>) {
        let (status, solution, error) = match result {
            Ok(solution) if solution.status == SolutionStatus::Error => {
                let message = solution
                    .message
                    .clone()
                    .unwrap_or_else(|| "solver reported an internal error".to_string());
                (JobStatus::Failed, Some(solution), Some(message))
            }
            Ok(solution) => (JobStatus::Completed, Some(solution), None),
            Err(SolverError::Cancelled) => (JobStatus::Cancelled, None, None),
            Err(err) => (JobStatus::Failed, None, Some(err.to_string())),
        };

        let degraded = solution.as_ref().is_some_and(|s| s.degraded);
        job.solution = solution;
        job.metadata.error = error.clone();
        job.finish(status, degraded);

        {
            let mut state = self.state.lock();
            match status {
                JobStatus::Failed => state.queue.fail(&job.id),
                _ => state.queue.complete(&job.id),
            }
            state.cancellations.remove(&job.id);
            state.store.insert(job.clone());
        }

        match status {
            JobStatus::Completed => {
                let solve_time_ms = job.stats.map(|s| s.solve_time_ms).unwrap_or_default();
                info!(job_id = %job.id, solve_time_ms, degraded, "job completed");
            }
            JobStatus::Cancelled => info!(job_id = %job.id, "job cancelled during solve"),
            _ => {
                let reason = error.unwrap_or_default();
                error!(job_id = %job.id, error = %reason, "job failed");
            }
        }
        self.publish(job);
    }

    fn publish(&self, job: Job) {
        // Send fails only when no watcher is subscribed, which is fine.
        let _ = self.events.send(job);
    }
}
