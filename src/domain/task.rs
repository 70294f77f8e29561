//! # Fetch Task Definitions
//!
//! A [`FetchTask`] is a single URL fetch-and-extract unit within a
//! job. Tasks are deduplicated per (job, normalized URL), so URL
//! normalization lives here next to the task identity it backs.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::domain::job::JobId;
use crate::error::{CrawlError, CrawlResult};

/// Unique identifier for fetch tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Creates a new unique task ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID.
    #[must_use]
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Scheduling priority. Higher values are dequeued first; ties are
/// broken by enqueue time (older first).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TaskPriority(pub u8);

impl TaskPriority {
    pub const LOW: Self = Self(0);
    pub const NORMAL: Self = Self(10);
    pub const HIGH: Self = Self(20);
}

impl Default for TaskPriority {
    fn default() -> Self {
        Self::NORMAL
    }
}

/// Task lifecycle state machine:
/// pending → in-flight → {done | failed-retryable → pending | failed-terminal}.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    Pending,
    InFlight,
    Done,
    /// Transient failure; eligible for re-enqueue after backoff.
    FailedRetryable,
    FailedTerminal,
}

/// A single URL fetch-and-extract unit within a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchTask {
    pub id: TaskId,
    pub job_id: JobId,
    /// Normalized URL; also the task's dedup identity within the job.
    pub url: String,
    pub domain: String,
    pub attempt: u32,
    pub priority: TaskPriority,
    pub state: TaskState,
    pub enqueued_at: DateTime<Utc>,
}

impl FetchTask {
    /// Creates a pending task for an already-normalized URL.
    #[must_use]
    pub fn new(job_id: JobId, url: String, domain: String, priority: TaskPriority) -> Self {
        Self {
            id: TaskId::new(),
            job_id,
            url,
            domain,
            attempt: 0,
            priority,
            state: TaskState::Pending,
            enqueued_at: Utc::now(),
        }
    }

    /// Dedup key: identical submissions within the window collapse to
    /// the existing task.
    #[must_use]
    pub fn dedup_key(&self) -> (JobId, String) {
        (self.job_id, self.url.clone())
    }

    /// Marks the task retryable and bumps the attempt counter.
    pub fn mark_retry(&mut self) {
        self.attempt += 1;
        self.state = TaskState::FailedRetryable;
    }
}

/// Canonicalizes a URL so that trivially different spellings of the
/// same page share one fetch task.
///
/// Lowercases scheme and host, strips fragments, default ports and
/// common tracking parameters, and removes a trailing slash from
/// non-root paths.
pub fn normalize_url(raw: &str) -> CrawlResult<String> {
    let mut parsed = Url::parse(raw.trim())
        .map_err(|e| CrawlError::InvalidRequest(format!("malformed URL '{raw}': {e}")))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(CrawlError::InvalidRequest(format!(
            "unsupported scheme '{}'",
            parsed.scheme()
        )));
    }
    if parsed.host_str().is_none() {
        return Err(CrawlError::InvalidRequest(format!("URL '{raw}' has no host")));
    }

    parsed.set_fragment(None);

    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, _)| !k.starts_with("utm_") && k != "fbclid" && k != "gclid")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        parsed.set_query(None);
    } else {
        let query = kept
            .iter()
            .map(|(k, v)| {
                if v.is_empty() {
                    k.clone()
                } else {
                    format!("{k}={v}")
                }
            })
            .collect::<Vec<_>>()
            .join("&");
        parsed.set_query(Some(&query));
    }

    let mut out = parsed.to_string();
    if parsed.query().is_none() && out.ends_with('/') && parsed.path() != "/" {
        out.pop();
    }
    Ok(out)
}

/// Extracts the registrable host of a URL, used for domain policy and
/// the pattern cache key.
pub fn domain_of(url: &str) -> CrawlResult<String> {
    let parsed = Url::parse(url)
        .map_err(|e| CrawlError::InvalidRequest(format!("malformed URL '{url}': {e}")))?;
    parsed
        .host_str()
        .map(|h| h.to_ascii_lowercase())
        .ok_or_else(|| CrawlError::InvalidRequest(format!("URL '{url}' has no host")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_id_is_unique() {
        assert_ne!(TaskId::new(), TaskId::new());
    }

    #[test]
    fn url_normalization_strips_noise() {
        let a = normalize_url("HTTPS://Shop.Example.com:443/catalog/?utm_source=x#top").unwrap();
        let b = normalize_url("https://shop.example.com/catalog").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn url_normalization_keeps_meaningful_query() {
        let url = normalize_url("https://shop.example.com/catalog?page=2&utm_medium=email").unwrap();
        assert_eq!(url, "https://shop.example.com/catalog?page=2");
    }

    #[test]
    fn rejects_non_http_schemes() {
        assert!(matches!(
            normalize_url("ftp://example.com/file"),
            Err(CrawlError::InvalidRequest(_))
        ));
        assert!(matches!(
            normalize_url("not a url"),
            Err(CrawlError::InvalidRequest(_))
        ));
    }

    #[test]
    fn dedup_key_matches_for_same_url() {
        let job = JobId::new();
        let t1 = FetchTask::new(job, "https://e.com/p".into(), "e.com".into(), TaskPriority::NORMAL);
        let t2 = FetchTask::new(job, "https://e.com/p".into(), "e.com".into(), TaskPriority::HIGH);
        assert_eq!(t1.dedup_key(), t2.dedup_key());
        assert_ne!(t1.id, t2.id);
    }

    #[test]
    fn retry_transitions_state() {
        let mut task = FetchTask::new(
            JobId::new(),
            "https://e.com/p".into(),
            "e.com".into(),
            TaskPriority::NORMAL,
        );
        task.mark_retry();
        assert_eq!(task.attempt, 1);
        assert_eq!(task.state, TaskState::FailedRetryable);
    }
}
