//! # Shared Engine State
//!
//! State shared between the orchestrator, workers and supervisor: the
//! job table, per-class render permits, per-job cancellation tokens
//! and running counters. All access goes through async-aware locks;
//! no lock is held across a render.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::domain::{ConcurrencyClass, CrawlJob, JobId};

/// Engine-wide counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlStats {
    pub jobs_submitted: u64,
    pub jobs_completed: u64,
    pub jobs_failed: u64,
    pub jobs_cancelled: u64,
    pub tasks_succeeded: u64,
    pub tasks_failed: u64,
    pub products_found: u64,
}

/// State shared across the crawling service.
pub struct SharedState {
    jobs: RwLock<HashMap<JobId, CrawlJob>>,
    job_tokens: RwLock<HashMap<JobId, CancellationToken>>,
    standard_permits: Arc<Semaphore>,
    trusted_permits: Arc<Semaphore>,
    stats: RwLock<CrawlStats>,
    shutdown: CancellationToken,
}

impl SharedState {
    #[must_use]
    pub fn new(standard_permits: usize, trusted_permits: usize) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            job_tokens: RwLock::new(HashMap::new()),
            standard_permits: Arc::new(Semaphore::new(standard_permits)),
            trusted_permits: Arc::new(Semaphore::new(trusted_permits)),
            stats: RwLock::new(CrawlStats::default()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Registers a new job and issues its cancellation token as a
    /// child of the engine shutdown token.
    pub async fn insert_job(&self, job: CrawlJob) -> CancellationToken {
        let token = self.shutdown.child_token();
        self.job_tokens.write().await.insert(job.id, token.clone());
        self.jobs.write().await.insert(job.id, job);
        self.stats.write().await.jobs_submitted += 1;
        token
    }

    pub async fn job(&self, id: JobId) -> Option<CrawlJob> {
        self.jobs.read().await.get(&id).cloned()
    }

    /// Applies a mutation to one job, returning the updated snapshot.
    pub async fn update_job<F>(&self, id: JobId, mutate: F) -> Option<CrawlJob>
    where
        F: FnOnce(&mut CrawlJob),
    {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id)?;
        mutate(job);
        Some(job.clone())
    }

    /// All jobs currently in a non-terminal state.
    pub async fn active_jobs(&self) -> Vec<CrawlJob> {
        self.jobs
            .read()
            .await
            .values()
            .filter(|j| !j.state.is_terminal())
            .cloned()
            .collect()
    }

    pub async fn token_for(&self, id: JobId) -> Option<CancellationToken> {
        self.job_tokens.read().await.get(&id).cloned()
    }

    /// Cancels one job's token. Returns false for unknown jobs.
    pub async fn cancel_job_token(&self, id: JobId) -> bool {
        match self.job_tokens.read().await.get(&id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Drops the token of a job that reached a terminal state.
    pub async fn forget_token(&self, id: JobId) {
        self.job_tokens.write().await.remove(&id);
    }

    /// Render permit pool for a concurrency class.
    #[must_use]
    pub fn permits(&self, class: ConcurrencyClass) -> Arc<Semaphore> {
        match class {
            ConcurrencyClass::Standard => self.standard_permits.clone(),
            ConcurrencyClass::Trusted => self.trusted_permits.clone(),
        }
    }

    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub async fn stats(&self) -> CrawlStats {
        self.stats.read().await.clone()
    }

    pub async fn record_task_success(&self, products: u64) {
        let mut stats = self.stats.write().await;
        stats.tasks_succeeded += 1;
        stats.products_found += products;
    }

    pub async fn record_task_failure(&self) {
        self.stats.write().await.tasks_failed += 1;
    }

    pub async fn record_job_terminal(&self, state: crate::domain::JobState) {
        use crate::domain::JobState;
        let mut stats = self.stats.write().await;
        match state {
            JobState::Completed | JobState::CompletedPartial => stats.jobs_completed += 1,
            JobState::Failed => stats.jobs_failed += 1,
            JobState::Cancelled => stats.jobs_cancelled += 1,
            JobState::Queued | JobState::Running => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{JobLimits, JobState};

    fn job() -> CrawlJob {
        CrawlJob::new(
            "https://shop.example.com".into(),
            "shop.example.com".into(),
            ConcurrencyClass::Standard,
            JobLimits::default(),
            false,
        )
    }

    #[tokio::test]
    async fn job_round_trip_and_update() {
        let state = SharedState::new(2, 8);
        let j = job();
        let id = j.id;
        state.insert_job(j).await;

        let updated = state
            .update_job(id, |j| {
                j.state = JobState::Running;
                j.pages_visited = 3;
            })
            .await
            .unwrap();
        assert_eq!(updated.pages_visited, 3);
        assert_eq!(state.job(id).await.unwrap().state, JobState::Running);
        assert_eq!(state.stats().await.jobs_submitted, 1);
    }

    #[tokio::test]
    async fn shutdown_cancels_job_tokens() {
        let state = SharedState::new(1, 1);
        let token = state.insert_job(job()).await;
        assert!(!token.is_cancelled());
        state.shutdown_token().cancel();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn cancel_targets_one_job() {
        let state = SharedState::new(1, 1);
        let a = job();
        let b = job();
        let (a_id, b_id) = (a.id, b.id);
        let a_token = state.insert_job(a).await;
        let b_token = state.insert_job(b).await;

        assert!(state.cancel_job_token(a_id).await);
        assert!(a_token.is_cancelled());
        assert!(!b_token.is_cancelled());
        assert!(state.token_for(b_id).await.is_some());
        assert!(!state.cancel_job_token(JobId::new()).await);
    }

    #[tokio::test]
    async fn permit_pools_differ_by_class() {
        let state = SharedState::new(2, 8);
        assert_eq!(state.permits(ConcurrencyClass::Standard).available_permits(), 2);
        assert_eq!(state.permits(ConcurrencyClass::Trusted).available_permits(), 8);
    }
}
