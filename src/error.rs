//! # Error Taxonomy
//!
//! One error type covers the whole pipeline so that retry policy,
//! escalation and the failure ledger all speak the same language.
//! Transient fetch problems and resource exhaustion are retryable;
//! storage and queue failures are systemic and escalate to job-level
//! failure; everything else resolves the task terminally.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type CrawlResult<T> = Result<T, CrawlError>;

#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum CrawlError {
    /// Rejected at the submission boundary; never enters the queue.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Fetch failure worth retrying: timeout, connection reset,
    /// throttling, server-side 5xx.
    #[error("transient fetch failure: {0}")]
    TransientFetch(String),

    /// Fetch failure retrying cannot fix: 404, gone, unsupported
    /// content, redirect loop.
    #[error("terminal fetch failure: {0}")]
    TerminalFetch(String),

    /// Every extraction strategy ran and none produced a sufficient
    /// record.
    #[error("extraction below confidence floor: {0}")]
    ExtractionLowConfidence(String),

    /// Raw product data too ambiguous to normalize.
    #[error("normalization ambiguous: {0}")]
    NormalizationAmbiguous(String),

    /// Engine-side capacity problem; the work itself is fine.
    #[error("resource exhaustion: {0}")]
    ResourceExhaustion(String),

    /// The job's wall-clock budget expired.
    #[error("job timed out after {0:?}")]
    JobTimeout(Duration),

    /// Persistence collaborator failure; systemic.
    #[error("storage failure: {0}")]
    Storage(String),

    /// Queue infrastructure failure; systemic.
    #[error("queue failure: {0}")]
    Queue(String),

    /// The task's job was cancelled.
    #[error("cancelled")]
    Cancelled,
}

impl CrawlError {
    /// Whether the failed task may be re-enqueued after backoff.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientFetch(_) | Self::ResourceExhaustion(_))
    }

    /// Whether the failure indicts the engine rather than the task.
    /// Systemic failures escalate to job-level failure instead of
    /// filling the ledger one task at a time.
    #[must_use]
    pub const fn is_systemic(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Queue(_))
    }

    /// Resolves a retryable failure into its terminal form once the
    /// retry policy has given up on it. Everything else passes
    /// through unchanged.
    #[must_use]
    pub fn into_terminal(self) -> Self {
        match self {
            Self::TransientFetch(msg) | Self::ResourceExhaustion(msg) => {
                Self::TerminalFetch(format!("retries exhausted: {msg}"))
            }
            other => other,
        }
    }

    /// Classifies an HTTP status. `None` for success statuses.
    #[must_use]
    pub fn from_status(status: u16, url: &str) -> Option<Self> {
        match status {
            200..=299 => None,
            408 | 429 => Some(Self::TransientFetch(format!("HTTP {status} at {url}"))),
            500..=599 => Some(Self::TransientFetch(format!("HTTP {status} at {url}"))),
            _ => Some(Self::TerminalFetch(format!("HTTP {status} at {url}"))),
        }
    }
}
