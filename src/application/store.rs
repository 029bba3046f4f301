// In-memory store of every job the engine has seen, terminal ones included.

use crate::domain::job::{Job, JobId};
use crate::domain::value_objects::JobStatus;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

const DEFAULT_PAGE_SIZE: usize = 100;
const MAX_PAGE_SIZE: usize = 100;

/// Criteria for listing jobs. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub user_id: Option<String>,
    pub organization_id: Option<String>,
    /// A job matches only if it carries every tag listed here.
    pub tags: Vec<String>,
    /// Inclusive submission-time window.
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl JobFilter {
    fn matches(&self, job: &Job) -> bool {
        if self.status.is_some_and(|status| job.status != status) {
            return false;
        }
        if self
            .user_id
            .as_ref()
            .is_some_and(|user| job.metadata.user_id != *user)
        {
            return false;
        }
        if self
            .organization_id
            .as_ref()
            .is_some_and(|org| job.metadata.organization_id.as_deref() != Some(org.as_str()))
        {
            return false;
        }
        if !self
            .tags
            .iter()
            .all(|tag| job.metadata.tags.contains(tag))
        {
            return false;
        }
        if self.from.is_some_and(|from| job.metadata.created_at < from) {
            return false;
        }
        if self.to.is_some_and(|to| job.metadata.created_at > to) {
            return false;
        }
        true
    }
}

/// Job snapshots keyed by id.
#[derive(Debug, Default)]
pub struct JobStore {
    jobs: HashMap<JobId, Job>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the stored snapshot of a job.
    pub fn insert(&mut self, job: Job) {
        self.jobs.insert(job.id, job);
    }

    pub fn get(&self, id: &JobId) -> Option<&Job> {
        self.jobs.get(id)
    }

    /// List matching jobs newest first, paginated. Returns the page and the
    /// total match count before pagination. Page sizes are clamped to
    /// 1..=100 and default to 100.
    pub fn list(&self, filter: &JobFilter) -> (Vec<Job>, usize) {
        let mut matched: Vec<&Job> = self
            .jobs
            .values()
            .filter(|job| filter.matches(job))
            .collect();
        matched.sort_by(|a, b| b.metadata.created_at.cmp(&a.metadata.created_at));

        let total = matched.len();
        let limit = filter
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        let page = matched
            .into_iter()
            .skip(filter.offset)
            .take(limit)
            .cloned()
            .collect();
        (page, total)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::job::JobSubmission;
    use crate::domain::models::{Model, Objective, Variable};
    use crate::domain::value_objects::ProblemType;
    use chrono::Duration;

    fn job_for(user: &str, tags: &[&str], age_seconds: i64) -> Job {
        let model = Model::new(
            "m",
            ProblemType::LinearProgramming,
            Objective::minimize("x"),
        )
        .add_variable(Variable::continuous("x"));
        let submission = JobSubmission::for_user(user)
            .with_tags(tags.iter().map(|t| t.to_string()).collect());
        let mut job = Job::new(model, submission);
        job.metadata.created_at = Utc::now() - Duration::seconds(age_seconds);
        job
    }

    #[test]
    fn insert_replaces_the_stored_snapshot() {
        let mut store = JobStore::new();
        let mut job = job_for("alice", &[], 0);
        store.insert(job.clone());

        job.mark_queued();
        store.insert(job.clone());

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&job.id).unwrap().status, JobStatus::Queued);
    }

    #[test]
    fn get_unknown_id_returns_none() {
        let store = JobStore::new();
        assert!(store.get(&JobId::new()).is_none());
    }

    #[test]
    fn list_filters_by_user_and_status() {
        let mut store = JobStore::new();
        let mut completed = job_for("alice", &[], 20);
        completed.finish(JobStatus::Completed, false);
        store.insert(completed.clone());
        store.insert(job_for("alice", &[], 10));
        store.insert(job_for("bob", &[], 5));

        let filter = JobFilter {
            user_id: Some("alice".into()),
            ..JobFilter::default()
        };
        let (page, total) = store.list(&filter);
        assert_eq!(total, 2);
        assert_eq!(page.len(), 2);

        let filter = JobFilter {
            user_id: Some("alice".into()),
            status: Some(JobStatus::Completed),
            ..JobFilter::default()
        };
        let (page, total) = store.list(&filter);
        assert_eq!(total, 1);
        assert_eq!(page[0].id, completed.id);
    }

    #[test]
    fn list_requires_every_filter_tag() {
        let mut store = JobStore::new();
        let tagged = job_for("alice", &["nightly", "fleet"], 0);
        store.insert(tagged.clone());
        store.insert(job_for("alice", &["nightly"], 0));

        let filter = JobFilter {
            tags: vec!["nightly".into(), "fleet".into()],
            ..JobFilter::default()
        };
        let (page, total) = store.list(&filter);
        assert_eq!(total, 1);
        assert_eq!(page[0].id, tagged.id);
    }

    #[test]
    fn list_honors_the_submission_window() {
        let mut store = JobStore::new();
        let old = job_for("alice", &[], 3600);
        let recent = job_for("alice", &[], 60);
        store.insert(old.clone());
        store.insert(recent.clone());

        let filter = JobFilter {
            from: Some(Utc::now() - Duration::seconds(600)),
            ..JobFilter::default()
        };
        let (page, _) = store.list(&filter);
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, recent.id);

        let filter = JobFilter {
            to: Some(Utc::now() - Duration::seconds(600)),
            ..JobFilter::default()
        };
        let (page, _) = store.list(&filter);
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, old.id);
    }

    #[test]
    fn list_returns_newest_first_with_pagination() {
        let mut store = JobStore::new();
        let oldest = job_for("alice", &[], 30);
        let middle = job_for("alice", &[], 20);
        let newest = job_for("alice", &[], 10);
        store.insert(oldest.clone());
        store.insert(middle.clone());
        store.insert(newest.clone());

        let (page, total) = store.list(&JobFilter::default());
        assert_eq!(total, 3);
        let ids: Vec<_> = page.iter().map(|j| j.id).collect();
        assert_eq!(ids, vec![newest.id, middle.id, oldest.id]);

        let filter = JobFilter {
            limit: Some(1),
            offset: 1,
            ..JobFilter::default()
        };
        let (page, total) = store.list(&filter);
        assert_eq!(total, 3);
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, middle.id);
    }

    #[test]
    fn list_clamps_degenerate_limits() {
        let mut store = JobStore::new();
        store.insert(job_for("alice", &[], 2));
        store.insert(job_for("alice", &[], 1));

        let filter = JobFilter {
            limit: Some(0),
            ..JobFilter::default()
        };
        let (page, _) = store.list(&filter);
        assert_eq!(page.len(), 1);
    }
}
