//! # Crawl Orchestrator
//!
//! Public surface of the queue/worker service. Validates and admits
//! crawl requests, turns task completions into job bookkeeping,
//! schedules retries with exponential backoff, expires jobs past
//! their wall-clock budget, and publishes exactly one event per
//! terminal job.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::crawling::queue::{EnqueueOutcome, QueueSettings, TaskQueue};
use crate::crawling::state::SharedState;
use crate::crawling::supervisor::WorkerSupervisor;
use crate::crawling::workers::{FetchWorker, TaskCompletion, WorkerPool};
use crate::domain::{
    task, CrawlJob, CrawlRequest, FetchTask, JobId, JobLimits, JobState, TaskFailure, TaskId,
    TaskPriority, TaskState,
};
use crate::error::{CrawlError, CrawlResult};
use crate::infrastructure::{
    CrawlerConfig, EventSink, JobEvent, MemoryProbe, PageRenderer, Storage,
};
use crate::patterns::PatternLearner;

/// Interval of the scheduler's housekeeping tick.
const TICK_INTERVAL: Duration = Duration::from_millis(500);

/// How long shutdown waits for in-flight tasks before giving up on
/// the worker loops.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

pub struct CrawlOrchestrator {
    config: CrawlerConfig,
    state: Arc<SharedState>,
    queue: Arc<TaskQueue>,
    pool: Arc<WorkerPool>,
    supervisor: Arc<WorkerSupervisor>,
    events: Arc<dyn EventSink>,
    completions: Mutex<mpsc::UnboundedReceiver<TaskCompletion>>,
    completions_tx: mpsc::UnboundedSender<TaskCompletion>,
    /// Unresolved tasks per job; a job finalizes when its count
    /// returns to zero.
    outstanding: Mutex<HashMap<JobId, usize>>,
}

impl CrawlOrchestrator {
    /// Wires the full service from its collaborators. Workers and the
    /// supervisor are not started until [`CrawlOrchestrator::start`].
    #[must_use]
    pub fn new(
        config: CrawlerConfig,
        renderer: Arc<dyn PageRenderer>,
        storage: Arc<dyn Storage>,
        events: Arc<dyn EventSink>,
        probe: Arc<dyn MemoryProbe>,
    ) -> Self {
        let state = Arc::new(SharedState::new(
            config.workers.standard_workers,
            config.workers.trusted_workers,
        ));
        let queue = Arc::new(TaskQueue::new(QueueSettings {
            capacity: config.queue.capacity,
            dedup_window: config.queue.dedup_window,
            max_wait: Duration::from_secs(config.queue.max_wait_promotion_secs),
        }));
        let learner = Arc::new(PatternLearner::with_storage(storage.clone()));
        let worker = Arc::new(FetchWorker::new(
            renderer,
            learner,
            storage,
            state.clone(),
        ));
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let pool_size = config.workers.standard_workers + config.workers.trusted_workers;
        let pool = Arc::new(WorkerPool::new(
            worker,
            queue.clone(),
            completions_tx.clone(),
            state.shutdown_token(),
            pool_size,
        ));
        let supervisor = Arc::new(WorkerSupervisor::new(
            pool.clone(),
            queue.clone(),
            probe,
            config.memory.clone(),
            state.shutdown_token(),
        ));

        Self {
            config,
            state,
            queue,
            pool,
            supervisor,
            events,
            completions: Mutex::new(completions_rx),
            completions_tx,
            outstanding: Mutex::new(HashMap::new()),
        }
    }

    /// Spawns the worker pool and the supervisor loop.
    pub async fn start(&self) {
        self.pool.start().await;
        let supervisor = self.supervisor.clone();
        tokio::spawn(async move { supervisor.run().await });
        info!(
            standard = self.config.workers.standard_workers,
            trusted = self.config.workers.trusted_workers,
            "crawl service started"
        );
    }

    /// Drives completions and housekeeping until shutdown. Run this
    /// on its own task; the submission and status methods stay usable
    /// concurrently.
    pub async fn run(&self) {
        let shutdown = self.state.shutdown_token();
        let mut completions = self.completions.lock().await;
        let mut tick = tokio::time::interval(TICK_INTERVAL);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                completion = completions.recv() => match completion {
                    Some(completion) => self.handle_completion(completion).await,
                    None => break,
                },
                _ = tick.tick() => self.expire_overdue_jobs().await,
            }
        }
        debug!("scheduler loop stopped");
    }

    /// Validates and admits one crawl request.
    pub async fn enqueue_crawl(&self, request: CrawlRequest) -> CrawlResult<JobId> {
        if request.max_pages == 0 {
            return Err(CrawlError::InvalidRequest(
                "max_pages must be at least 1".into(),
            ));
        }
        let root = task::normalize_url(&request.root_url)?;
        let domain = task::domain_of(&root)?;
        if !self.config.domains.permits(&domain) {
            return Err(CrawlError::InvalidRequest(format!(
                "domain '{domain}' not permitted by policy"
            )));
        }

        let limits = JobLimits {
            max_pages: request.max_pages.min(self.config.limits.max_pages_per_job),
            fetch_timeout: Duration::from_secs(self.config.limits.fetch_timeout_secs),
            job_timeout: Duration::from_secs(self.config.limits.job_timeout_secs),
        };
        let mut job = CrawlJob::new(
            root.clone(),
            domain.clone(),
            request.concurrency_class,
            limits,
            request.follow_pagination,
        );
        job.state = JobState::Running;
        let job_id = job.id;
        self.state.insert_job(job).await;

        let root_task = FetchTask::new(job_id, root, domain, TaskPriority::HIGH);
        match self.queue.enqueue(root_task).await {
            EnqueueOutcome::Accepted => {
                self.outstanding.lock().await.insert(job_id, 1);
                info!(%job_id, "crawl job admitted");
                Ok(job_id)
            }
            EnqueueOutcome::Duplicate => {
                // Dedup keys are scoped by job ID, so a fresh job's
                // root can never collapse against another job.
                Err(CrawlError::Queue("root task collapsed unexpectedly".into()))
            }
            EnqueueOutcome::Rejected => {
                self.state
                    .update_job(job_id, |j| {
                        j.state = JobState::Failed;
                        j.finished_at = Some(Utc::now());
                    })
                    .await;
                self.state.forget_token(job_id).await;
                Err(CrawlError::ResourceExhaustion(
                    "task queue at capacity".into(),
                ))
            }
        }
    }

    /// Snapshot of one job.
    pub async fn job_status(&self, id: JobId) -> Option<CrawlJob> {
        self.state.job(id).await
    }

    /// Engine-wide counters.
    pub async fn stats(&self) -> crate::crawling::state::CrawlStats {
        self.state.stats().await
    }

    /// Cancels a job. In-flight renders finish but resolve into the
    /// void; queued tasks drop on dequeue. Returns false for unknown
    /// or already-terminal jobs.
    pub async fn cancel_job(&self, id: JobId) -> bool {
        let Some(job) = self.state.job(id).await else {
            return false;
        };
        if job.state.is_terminal() {
            return false;
        }
        self.state.cancel_job_token(id).await;
        self.finalize_job(id, JobState::Cancelled).await;
        true
    }

    /// Stops the service and returns every task that never resolved,
    /// so the caller can persist a restart snapshot.
    pub async fn shutdown(&self) -> Vec<FetchTask> {
        info!("shutting down crawl service");
        self.state.shutdown_token().cancel();
        self.queue.close().await;
        if tokio::time::timeout(SHUTDOWN_GRACE, self.pool.join())
            .await
            .is_err()
        {
            warn!("grace period expired with tasks still in flight");
        }

        let mut unfinished = self.queue.drain().await;
        unfinished.extend(self.supervisor.drain_parked().await);
        self.outstanding.lock().await.clear();
        unfinished
    }

    async fn handle_completion(&self, completion: TaskCompletion) {
        let TaskCompletion { mut task, outcome } = completion;
        let job_id = task.job_id;
        let Some(job) = self.state.job(job_id).await else {
            return;
        };
        if job.state.is_terminal() {
            self.resolve_outstanding(job_id).await;
            return;
        }

        match outcome {
            Ok(report) => {
                let updated = self
                    .state
                    .update_job(job_id, |j| {
                        j.pages_visited += 1;
                        j.products_found += report.products_found;
                    })
                    .await;
                self.state.record_task_success(report.products_found).await;

                if let (Some(job), Some(next)) = (updated, report.next_task) {
                    if job.pages_visited < job.limits.max_pages {
                        if self.queue.enqueue(next).await == EnqueueOutcome::Accepted {
                            *self
                                .outstanding
                                .lock()
                                .await
                                .entry(job_id)
                                .or_insert(0) += 1;
                        }
                    }
                }
                if self.resolve_outstanding(job_id).await {
                    self.finalize_by_ledger(job_id).await;
                }
            }
            Err(CrawlError::Cancelled) => {
                self.resolve_outstanding(job_id).await;
            }
            Err(error) if error.is_systemic() => {
                warn!(%job_id, %error, "systemic failure, failing job");
                self.record_failure(&task, error).await;
                self.state.cancel_job_token(job_id).await;
                self.outstanding.lock().await.remove(&job_id);
                self.finalize_job(job_id, JobState::Failed).await;
            }
            Err(error)
                if error.is_retryable() && task.attempt + 1 < self.config.retry.max_attempts =>
            {
                self.schedule_retry(task, &error);
            }
            Err(error) => {
                // Exhausted retries resolve the task terminally; the
                // ledger never carries a retryable resting state.
                task.state = TaskState::FailedTerminal;
                self.record_failure(&task, error.into_terminal()).await;
                if self.resolve_outstanding(job_id).await {
                    self.finalize_by_ledger(job_id).await;
                }
            }
        }
    }

    /// Decrements a job's outstanding count; true when it hit zero.
    async fn resolve_outstanding(&self, job_id: JobId) -> bool {
        let mut outstanding = self.outstanding.lock().await;
        match outstanding.get_mut(&job_id) {
            Some(count) => {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    outstanding.remove(&job_id);
                    true
                } else {
                    false
                }
            }
            None => false,
        }
    }

    fn schedule_retry(&self, mut fetch: FetchTask, error: &CrawlError) {
        fetch.mark_retry();
        let delay = self.backoff_delay(fetch.attempt);
        debug!(
            url = %fetch.url,
            attempt = fetch.attempt,
            delay_ms = delay.as_millis() as u64,
            %error,
            "scheduling retry"
        );
        let queue = self.queue.clone();
        let completions = self.completions_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if queue.enqueue_retry(fetch.clone()).await == EnqueueOutcome::Rejected {
                // Feed the rejection back through the completion path
                // so the ledger and outstanding count stay consistent.
                let _ = completions.send(TaskCompletion {
                    task: fetch.clone(),
                    outcome: Err(CrawlError::ResourceExhaustion(
                        "retry rejected, queue at capacity".into(),
                    )),
                });
            }
        });
    }

    /// Exponential backoff with jitter, capped at the configured
    /// maximum.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let base = self
            .config
            .retry
            .base_delay_ms
            .saturating_mul(1u64 << exponent)
            .min(self.config.retry.max_delay_ms);
        let jitter = fastrand::u64(0..=base / 2);
        Duration::from_millis(base + jitter)
    }

    async fn record_failure(&self, fetch: &FetchTask, error: CrawlError) {
        warn!(url = %fetch.url, attempts = fetch.attempt + 1, %error, "task failed");
        self.state.record_task_failure().await;
        self.state
            .update_job(fetch.job_id, |j| {
                j.failures.push(TaskFailure {
                    task_id: fetch.id,
                    url: fetch.url.clone(),
                    error,
                    attempts: fetch.attempt + 1,
                    failed_at: Utc::now(),
                });
            })
            .await;
    }

    /// Finalizes a drained job from its ledger: clean runs complete,
    /// runs over the error-ratio threshold fail, everything else
    /// completes partial.
    async fn finalize_by_ledger(&self, job_id: JobId) {
        let Some(job) = self.state.job(job_id).await else {
            return;
        };
        let state = if job.failures.is_empty() {
            JobState::Completed
        } else if job.error_ratio() > self.config.limits.error_ratio_threshold {
            JobState::Failed
        } else {
            JobState::CompletedPartial
        };
        self.finalize_job(job_id, state).await;
    }

    async fn finalize_job(&self, job_id: JobId, state: JobState) {
        let Some(job) = self
            .state
            .update_job(job_id, |j| {
                j.state = state;
                j.finished_at = Some(Utc::now());
            })
            .await
        else {
            return;
        };
        self.state.record_job_terminal(state).await;
        self.state.forget_token(job_id).await;
        info!(
            %job_id,
            state = ?state,
            pages = job.pages_visited,
            products = job.products_found,
            errors = job.failures.len(),
            "job finished"
        );
        self.events
            .publish(JobEvent {
                job_id,
                state,
                pages_visited: job.pages_visited,
                products_found: job.products_found,
                error_count: job.failures.len(),
                finished_at: job.finished_at.unwrap_or_else(Utc::now),
            })
            .await;
    }

    /// Expires jobs past their wall-clock budget. An expired job with
    /// any visited pages completes partial; one that never produced a
    /// page fails.
    async fn expire_overdue_jobs(&self) {
        let now = Utc::now();
        for job in self.state.active_jobs().await {
            let Ok(budget) = chrono::Duration::from_std(job.limits.job_timeout) else {
                continue;
            };
            if now.signed_duration_since(job.created_at) <= budget {
                continue;
            }
            warn!(job_id = %job.id, "job exceeded wall-clock budget");
            self.state.cancel_job_token(job.id).await;
            self.outstanding.lock().await.remove(&job.id);
            self.state
                .update_job(job.id, |j| {
                    j.failures.push(TaskFailure {
                        task_id: TaskId::new(),
                        url: j.root_url.clone(),
                        error: CrawlError::JobTimeout(j.limits.job_timeout),
                        attempts: 0,
                        failed_at: now,
                    });
                })
                .await;
            let state = if job.pages_visited > 0 {
                JobState::CompletedPartial
            } else {
                JobState::Failed
            };
            self.finalize_job(job.id, state).await;
        }
    }
}
