//! # Task Queue
//!
//! Priority queue for fetch tasks with a per-queue dedup window,
//! capacity backpressure and starvation protection: a task waiting
//! past the max-wait threshold is treated as highest priority on the
//! next dequeue regardless of its submitted priority.

use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify};
use tracing::debug;

use crate::domain::{FetchTask, JobId};

/// Queue sizing and scheduling parameters.
#[derive(Debug, Clone)]
pub struct QueueSettings {
    /// Pending tasks accepted before [`EnqueueOutcome::Rejected`].
    pub capacity: usize,
    /// Recently seen dedup keys remembered for duplicate collapse.
    pub dedup_window: usize,
    /// Waiting past this promotes a task over all submitted
    /// priorities.
    pub max_wait: Duration,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            dedup_window: 4_096,
            max_wait: Duration::from_secs(120),
        }
    }
}

/// What happened to an enqueue attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Accepted,
    /// Same (job, URL) already seen within the dedup window; only one
    /// task exists for it.
    Duplicate,
    /// Queue at capacity; caller decides whether to retry or shed.
    Rejected,
}

/// Running counters exposed for observability.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueMetrics {
    pub total_enqueued: u64,
    pub total_dequeued: u64,
    pub duplicates_collapsed: u64,
    pub rejected_at_capacity: u64,
    pub shed: u64,
    pub current_size: usize,
    pub max_size_reached: usize,
}

struct Pending {
    task: FetchTask,
    queued_at: Instant,
}

struct Inner {
    pending: Vec<Pending>,
    recent_keys: HashSet<(JobId, String)>,
    recent_order: VecDeque<(JobId, String)>,
    metrics: QueueMetrics,
    closed: bool,
}

/// Shared priority queue. All methods are cancel-safe; `dequeue`
/// parks until work arrives or the queue closes.
pub struct TaskQueue {
    inner: Mutex<Inner>,
    notify: Notify,
    settings: QueueSettings,
}

impl TaskQueue {
    #[must_use]
    pub fn new(settings: QueueSettings) -> Self {
        Self {
            inner: Mutex::new(Inner {
                pending: Vec::new(),
                recent_keys: HashSet::new(),
                recent_order: VecDeque::new(),
                metrics: QueueMetrics::default(),
                closed: false,
            }),
            notify: Notify::new(),
            settings,
        }
    }

    /// Enqueues a task, collapsing duplicates within the dedup window.
    pub async fn enqueue(&self, task: FetchTask) -> EnqueueOutcome {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return EnqueueOutcome::Rejected;
        }

        let key = task.dedup_key();
        if inner.recent_keys.contains(&key) {
            inner.metrics.duplicates_collapsed += 1;
            debug!(url = %task.url, "duplicate task collapsed");
            return EnqueueOutcome::Duplicate;
        }
        if inner.pending.len() >= self.settings.capacity {
            inner.metrics.rejected_at_capacity += 1;
            return EnqueueOutcome::Rejected;
        }

        inner.recent_keys.insert(key.clone());
        inner.recent_order.push_back(key);
        while inner.recent_order.len() > self.settings.dedup_window {
            if let Some(evicted) = inner.recent_order.pop_front() {
                inner.recent_keys.remove(&evicted);
            }
        }

        self.push(&mut inner, task);
        drop(inner);
        self.notify.notify_waiters();
        EnqueueOutcome::Accepted
    }

    /// Re-enqueues a retry of a task that already passed dedup once.
    /// Bypasses the window so backoff retries are never collapsed
    /// against their own first attempt.
    pub async fn enqueue_retry(&self, task: FetchTask) -> EnqueueOutcome {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return EnqueueOutcome::Rejected;
        }
        if inner.pending.len() >= self.settings.capacity {
            inner.metrics.rejected_at_capacity += 1;
            return EnqueueOutcome::Rejected;
        }
        self.push(&mut inner, task);
        drop(inner);
        self.notify.notify_waiters();
        EnqueueOutcome::Accepted
    }

    fn push(&self, inner: &mut Inner, task: FetchTask) {
        inner.pending.push(Pending {
            task,
            queued_at: Instant::now(),
        });
        inner.metrics.total_enqueued += 1;
        inner.metrics.current_size = inner.pending.len();
        inner.metrics.max_size_reached =
            inner.metrics.max_size_reached.max(inner.pending.len());
    }

    /// Takes the best pending task, waiting until one exists. Returns
    /// `None` once the queue is closed and drained.
    pub async fn dequeue(&self) -> Option<FetchTask> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut inner = self.inner.lock().await;
                if let Some(index) = self.best_index(&inner) {
                    let pending = inner.pending.remove(index);
                    inner.metrics.total_dequeued += 1;
                    inner.metrics.current_size = inner.pending.len();
                    return Some(pending.task);
                }
                if inner.closed {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Index of the task to run next: overdue tasks first (oldest
    /// wins), then highest priority, then oldest.
    fn best_index(&self, inner: &Inner) -> Option<usize> {
        let now = Instant::now();
        let mut best: Option<(usize, bool, u8, Duration)> = None;
        for (index, pending) in inner.pending.iter().enumerate() {
            let waited = now.duration_since(pending.queued_at);
            let overdue = waited >= self.settings.max_wait;
            let priority = pending.task.priority.0;
            let better = match &best {
                None => true,
                Some((_, b_overdue, b_priority, b_waited)) => {
                    (overdue, priority, waited) > (*b_overdue, *b_priority, *b_waited)
                }
            };
            if better {
                best = Some((index, overdue, priority, waited));
            }
        }
        best.map(|(index, ..)| index)
    }

    /// Drops the `count` lowest-priority pending tasks and returns
    /// them, oldest first within equal priority. Used under memory
    /// pressure; callers requeue or record the shed tasks.
    pub async fn shed_lowest(&self, count: usize) -> Vec<FetchTask> {
        let mut inner = self.inner.lock().await;
        let mut order: Vec<usize> = (0..inner.pending.len()).collect();
        order.sort_by_key(|&i| (inner.pending[i].task.priority, inner.pending[i].queued_at));
        order.truncate(count);
        order.sort_unstable_by(|a, b| b.cmp(a));

        let mut shed = Vec::with_capacity(order.len());
        for index in order {
            shed.push(inner.pending.remove(index).task);
        }
        inner.metrics.shed += shed.len() as u64;
        inner.metrics.current_size = inner.pending.len();
        shed
    }

    /// Drains every pending task, used at shutdown so unfinished work
    /// can be reported to the caller.
    pub async fn drain(&self) -> Vec<FetchTask> {
        let mut inner = self.inner.lock().await;
        let drained: Vec<FetchTask> =
            inner.pending.drain(..).map(|p| p.task).collect();
        inner.metrics.current_size = 0;
        drained
    }

    /// Closes the queue; pending tasks stay dequeueable, new enqueues
    /// are rejected, and parked dequeuers wake.
    pub async fn close(&self) {
        self.inner.lock().await.closed = true;
        self.notify.notify_waiters();
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.pending.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.pending.is_empty()
    }

    pub async fn metrics(&self) -> QueueMetrics {
        self.inner.lock().await.metrics.clone()
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new(QueueSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskPriority;

    fn task(job: JobId, url: &str, priority: TaskPriority) -> FetchTask {
        FetchTask::new(job, url.to_string(), "e.com".to_string(), priority)
    }

    #[tokio::test]
    async fn duplicate_within_window_collapses() {
        let queue = TaskQueue::default();
        let job = JobId::new();
        assert_eq!(
            queue.enqueue(task(job, "https://e.com/p", TaskPriority::NORMAL)).await,
            EnqueueOutcome::Accepted
        );
        assert_eq!(
            queue.enqueue(task(job, "https://e.com/p", TaskPriority::HIGH)).await,
            EnqueueOutcome::Duplicate
        );
        assert_eq!(queue.len().await, 1);

        // Same URL under a different job is distinct work.
        assert_eq!(
            queue
                .enqueue(task(JobId::new(), "https://e.com/p", TaskPriority::NORMAL))
                .await,
            EnqueueOutcome::Accepted
        );
    }

    #[tokio::test]
    async fn higher_priority_dequeues_first() {
        let queue = TaskQueue::default();
        let job = JobId::new();
        queue.enqueue(task(job, "https://e.com/low", TaskPriority::LOW)).await;
        queue.enqueue(task(job, "https://e.com/high", TaskPriority::HIGH)).await;
        queue.enqueue(task(job, "https://e.com/normal", TaskPriority::NORMAL)).await;

        let first = queue.dequeue().await.unwrap();
        assert_eq!(first.url, "https://e.com/high");
        let second = queue.dequeue().await.unwrap();
        assert_eq!(second.url, "https://e.com/normal");
    }

    #[tokio::test]
    async fn overdue_task_outranks_priority() {
        let queue = TaskQueue::new(QueueSettings {
            max_wait: Duration::from_millis(20),
            ..QueueSettings::default()
        });
        let job = JobId::new();
        queue.enqueue(task(job, "https://e.com/old-low", TaskPriority::LOW)).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        queue.enqueue(task(job, "https://e.com/fresh-high", TaskPriority::HIGH)).await;

        let first = queue.dequeue().await.unwrap();
        assert_eq!(first.url, "https://e.com/old-low");
    }

    #[tokio::test]
    async fn capacity_rejects_excess() {
        let queue = TaskQueue::new(QueueSettings {
            capacity: 2,
            ..QueueSettings::default()
        });
        let job = JobId::new();
        queue.enqueue(task(job, "https://e.com/1", TaskPriority::NORMAL)).await;
        queue.enqueue(task(job, "https://e.com/2", TaskPriority::NORMAL)).await;
        assert_eq!(
            queue.enqueue(task(job, "https://e.com/3", TaskPriority::NORMAL)).await,
            EnqueueOutcome::Rejected
        );
        assert_eq!(queue.metrics().await.rejected_at_capacity, 1);
    }

    #[tokio::test]
    async fn retry_bypasses_dedup_window() {
        let queue = TaskQueue::default();
        let job = JobId::new();
        let mut t = task(job, "https://e.com/p", TaskPriority::NORMAL);
        queue.enqueue(t.clone()).await;
        queue.dequeue().await.unwrap();

        t.mark_retry();
        assert_eq!(queue.enqueue_retry(t).await, EnqueueOutcome::Accepted);
        assert_eq!(queue.len().await, 1);
    }

    #[tokio::test]
    async fn shed_removes_lowest_priority_first() {
        let queue = TaskQueue::default();
        let job = JobId::new();
        queue.enqueue(task(job, "https://e.com/high", TaskPriority::HIGH)).await;
        queue.enqueue(task(job, "https://e.com/low1", TaskPriority::LOW)).await;
        queue.enqueue(task(job, "https://e.com/low2", TaskPriority::LOW)).await;

        let shed = queue.shed_lowest(2).await;
        assert_eq!(shed.len(), 2);
        assert!(shed.iter().all(|t| t.priority == TaskPriority::LOW));
        assert_eq!(queue.len().await, 1);
        assert_eq!(queue.metrics().await.shed, 2);
    }

    #[tokio::test]
    async fn close_wakes_parked_dequeuer() {
        let queue = std::sync::Arc::new(TaskQueue::default());
        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.dequeue().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.close().await;
        assert!(waiter.await.unwrap().is_none());
    }

    #[tokio::test]
    async fn drain_returns_unfinished_tasks() {
        let queue = TaskQueue::default();
        let job = JobId::new();
        queue.enqueue(task(job, "https://e.com/1", TaskPriority::NORMAL)).await;
        queue.enqueue(task(job, "https://e.com/2", TaskPriority::NORMAL)).await;
        let drained = queue.drain().await;
        assert_eq!(drained.len(), 2);
        assert!(queue.is_empty().await);
    }
}
