//! Event/notification collaborator.
//!
//! The engine publishes exactly one event when a job reaches a
//! terminal state; delivery and downstream consumption are the
//! collaborator's responsibility.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::{JobId, JobState};

/// Terminal-state notification for one job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEvent {
    pub job_id: JobId,
    pub state: JobState,
    pub pages_visited: u32,
    pub products_found: u64,
    pub error_count: usize,
    pub finished_at: DateTime<Utc>,
}

/// Notification collaborator contract. Publishing must not fail the
/// job; implementations swallow their own delivery errors.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: JobEvent);
}

/// Default sink: structured log line per event.
#[derive(Debug, Default)]
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn publish(&self, event: JobEvent) {
        info!(
            job_id = %event.job_id,
            state = ?event.state,
            pages = event.pages_visited,
            products = event.products_found,
            errors = event.error_count,
            "job finished"
        );
    }
}

pub mod testing {
    //! Capturing sink used by the test suites.

    use std::sync::Arc;

    use tokio::sync::Mutex;

    use super::{EventSink, JobEvent};
    use async_trait::async_trait;

    #[derive(Debug, Default, Clone)]
    pub struct CapturingEventSink {
        events: Arc<Mutex<Vec<JobEvent>>>,
    }

    impl CapturingEventSink {
        pub async fn events(&self) -> Vec<JobEvent> {
            self.events.lock().await.clone()
        }
    }

    #[async_trait]
    impl EventSink for CapturingEventSink {
        async fn publish(&self, event: JobEvent) {
            self.events.lock().await.push(event);
        }
    }
}
