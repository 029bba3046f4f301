// Job aggregate: a submitted model plus its lifecycle bookkeeping

use super::models::{Model, Solution};
use super::value_objects::{JobStatus, Priority};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// Caller-supplied submission attributes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSubmission {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
}

impl JobSubmission {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}

/// A model submission paired with its metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobRequest {
    pub model: Model,
    pub metadata: JobSubmission,
}

/// Ownership, scheduling and timing attributes of a job
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobMetadata {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Timing summary recorded when a job reaches a terminal state
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStats {
    /// Milliseconds spent waiting before a worker claimed the job
    pub queue_time_ms: i64,
    /// Milliseconds between claim and completion
    pub solve_time_ms: i64,
    /// Milliseconds between submission and completion
    pub total_time_ms: i64,
    pub degraded: bool,
}

/// A submitted optimization job and everything known about it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    pub model: Model,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solution: Option<Solution>,
    pub metadata: JobMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<JobStats>,
}

impl Job {
    pub fn new(model: Model, submission: JobSubmission) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            status: JobStatus::Pending,
            model,
            solution: None,
            metadata: JobMetadata {
                user_id: submission.user_id,
                organization_id: submission.organization_id,
                tags: submission.tags,
                priority: submission.priority,
                created_at: now,
                updated_at: now,
                started_at: None,
                completed_at: None,
                error: None,
            },
            stats: None,
        }
    }

    /// Effective priority, defaulting to MEDIUM when none was supplied.
    pub fn priority(&self) -> Priority {
        self.metadata.priority.unwrap_or_default()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Stamp `updatedAt`; every state transition goes through this.
    pub fn touch(&mut self) {
        self.metadata.updated_at = Utc::now();
    }

    pub(crate) fn mark_queued(&mut self) {
        self.status = JobStatus::Queued;
        self.touch();
    }

    pub(crate) fn mark_running(&mut self) {
        let now = Utc::now();
        self.status = JobStatus::Running;
        self.metadata.started_at = Some(now);
        self.metadata.updated_at = now;
    }

    /// Close the job in a terminal state and record its timing stats.
    pub(crate) fn finish(&mut self, status: JobStatus, degraded: bool) {
        debug_assert!(status.is_terminal());
        let now = Utc::now();
        self.status = status;
        self.metadata.completed_at = Some(now);
        self.metadata.updated_at = now;

        let created = self.metadata.created_at;
        let started = self.metadata.started_at.unwrap_or(now);
        self.stats = Some(JobStats {
            queue_time_ms: (started - created).num_milliseconds(),
            solve_time_ms: (now - started).num_milliseconds(),
            total_time_ms: (now - created).num_milliseconds(),
            degraded,
        });
    }
}
