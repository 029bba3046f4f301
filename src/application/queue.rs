// In-memory priority queue of jobs waiting for a solver worker.

use crate::domain::job::{Job, JobId};
use std::collections::HashSet;
use tracing::debug;

/// FIFO queue with three priority classes.
///
/// Waiting jobs sit in `queue`, highest priority first and submission order
/// within a class. Claimed jobs move to `processing` until `complete` or
/// `fail` releases them, so waiting and running work stay distinguishable.
#[derive(Debug, Default)]
pub struct JobQueue {
    queue: Vec<Job>,
    processing: HashSet<JobId>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a job to the queue and return its QUEUED snapshot.
    ///
    /// Insertion happens before the first entry of strictly lower priority,
    /// which preserves submission order among equals.
    pub fn enqueue(&mut self, mut job: Job) -> Job {
        job.mark_queued();
        let rank = job.priority().rank();
        let position = self
            .queue
            .iter()
            .position(|waiting| waiting.priority().rank() < rank)
            .unwrap_or(self.queue.len());
        debug!(job_id = %job.id, priority = %job.priority(), position, "job enqueued");
        self.queue.insert(position, job.clone());
        job
    }

    /// Claim the frontmost job that is not already being processed.
    pub fn dequeue(&mut self) -> Option<Job> {
        let index = self
            .queue
            .iter()
            .position(|job| !self.processing.contains(&job.id))?;
        let job = self.queue.remove(index);
        self.processing.insert(job.id);
        Some(job)
    }

    /// Release a claimed job after a successful solve. Unknown ids are a no-op.
    pub fn complete(&mut self, id: &JobId) {
        self.processing.remove(id);
    }

    /// Release a claimed job after a failed solve. Unknown ids are a no-op.
    pub fn fail(&mut self, id: &JobId) {
        self.processing.remove(id);
    }

    /// Pull a waiting job out of the queue, for cancellation before a worker
    /// claims it. Jobs already claimed are not touched here; those are
    /// cancelled through their cancel token.
    pub fn remove(&mut self, id: &JobId) -> Option<Job> {
        let index = self.queue.iter().position(|job| job.id == *id)?;
        Some(self.queue.remove(index))
    }

    /// Number of jobs waiting to be claimed.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Number of jobs claimed but not yet released.
    pub fn processing_count(&self) -> usize {
        self.processing.len()
    }
}
