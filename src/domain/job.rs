//! # Crawl Job Definitions
//!
//! A [`CrawlJob`] is a request to crawl one or more pages under a
//! domain. The orchestrator creates it, the queue/worker service
//! mutates it, and it becomes terminal once all tasks resolve or the
//! job timeout fires.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::task::TaskId;
use crate::error::CrawlError;

/// Unique identifier for crawl jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Resource-allowance tier applied to a job's domain.
///
/// Standard domains share a conservative global render cap; trusted
/// (explicitly allow-listed) domains get a substantially larger pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrencyClass {
    #[default]
    Standard,
    Trusted,
}

/// Per-job limits set at submission time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobLimits {
    /// Maximum pages this job may visit.
    pub max_pages: u32,
    /// Hard timeout for a single fetch/render.
    pub fetch_timeout: Duration,
    /// Wall-clock budget for the whole job.
    pub job_timeout: Duration,
}

impl Default for JobLimits {
    fn default() -> Self {
        Self {
            max_pages: 100,
            fetch_timeout: Duration::from_secs(30),
            job_timeout: Duration::from_secs(600),
        }
    }
}

/// Job lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Completed,
    /// Terminal with a non-empty failure ledger below the error-ratio
    /// threshold.
    CompletedPartial,
    Failed,
    Cancelled,
}

impl JobState {
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Queued | Self::Running)
    }
}

/// One entry in a job's failure ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskFailure {
    pub task_id: TaskId,
    pub url: String,
    pub error: CrawlError,
    pub attempts: u32,
    pub failed_at: DateTime<Utc>,
}

/// A crawl request as submitted at the public boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlRequest {
    pub root_url: String,
    pub max_pages: u32,
    #[serde(default)]
    pub concurrency_class: ConcurrencyClass,
    #[serde(default)]
    pub follow_pagination: bool,
}

/// A unit of crawl work tracked by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlJob {
    pub id: JobId,
    pub root_url: String,
    pub domain: String,
    pub concurrency_class: ConcurrencyClass,
    pub limits: JobLimits,
    pub follow_pagination: bool,
    pub state: JobState,
    pub pages_visited: u32,
    pub products_found: u64,
    pub failures: Vec<TaskFailure>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl CrawlJob {
    /// Creates a queued job from a validated request.
    #[must_use]
    pub fn new(
        root_url: String,
        domain: String,
        concurrency_class: ConcurrencyClass,
        limits: JobLimits,
        follow_pagination: bool,
    ) -> Self {
        Self {
            id: JobId::new(),
            root_url,
            domain,
            concurrency_class,
            limits,
            follow_pagination,
            state: JobState::Queued,
            pages_visited: 0,
            products_found: 0,
            failures: Vec::new(),
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Ratio of failed tasks to all resolved tasks. A job fails only
    /// when this exceeds the configured threshold; otherwise it
    /// completes partial.
    #[must_use]
    pub fn error_ratio(&self) -> f64 {
        let resolved = u64::from(self.pages_visited) + self.failures.len() as u64;
        if resolved == 0 {
            return 0.0;
        }
        self.failures.len() as f64 / resolved as f64
    }
}
