//! # Fetch Workers
//!
//! A worker takes one task through the full pipeline: acquire a
//! render permit for the job's concurrency class, render, extract
//! with the learned-pattern suggestion, normalize, persist, and hand
//! back a report with the discovered next-page task if the job
//! follows pagination. Task outcomes flow to the orchestrator over a
//! completion channel; workers never mutate job lifecycle state.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::crawling::queue::TaskQueue;
use crate::crawling::state::SharedState;
use crate::domain::{
    task, FetchTask, JobId, PageType, PaginationHint, Strategy, TaskId, TaskPriority, TaskState,
};
use crate::error::{CrawlError, CrawlResult};
use crate::extraction::extract_page;
use crate::infrastructure::{PageRenderer, RenderRequest, Storage};
use crate::normalize::{normalization_issues, normalize_product};
use crate::patterns::{PatternLearner, HIGH_CONFIDENCE};

/// Successful task outcome handed to the orchestrator.
#[derive(Debug)]
pub struct TaskReport {
    pub task_id: TaskId,
    pub job_id: JobId,
    pub url: String,
    pub products_found: u64,
    /// Next catalog page, already normalized, when the job follows
    /// pagination and the page advertised a usable next link.
    pub next_task: Option<FetchTask>,
}

/// One resolved task, success or failure.
#[derive(Debug)]
pub struct TaskCompletion {
    pub task: FetchTask,
    pub outcome: CrawlResult<TaskReport>,
}

/// Task processor contract.
#[async_trait]
pub trait Worker: Send + Sync {
    async fn process(&self, task: &FetchTask) -> CrawlResult<TaskReport>;
}

/// The production worker: render, extract, normalize, persist.
pub struct FetchWorker {
    renderer: Arc<dyn PageRenderer>,
    learner: Arc<PatternLearner>,
    storage: Arc<dyn Storage>,
    state: Arc<SharedState>,
}

impl FetchWorker {
    #[must_use]
    pub fn new(
        renderer: Arc<dyn PageRenderer>,
        learner: Arc<PatternLearner>,
        storage: Arc<dyn Storage>,
        state: Arc<SharedState>,
    ) -> Self {
        Self {
            renderer,
            learner,
            storage,
            state,
        }
    }

    /// Best learned strategy for the domain across both page types a
    /// crawl visits, so listing patterns get cache hits on the queue
    /// path too. Only high-confidence entries qualify.
    async fn best_suggestion(&self, domain: &str) -> Option<(PageType, Strategy)> {
        let mut best: Option<(PageType, Strategy, f64)> = None;
        for page_type in [PageType::Product, PageType::Listing] {
            if let Some((strategy, confidence)) =
                self.learner.suggest_strategy(domain, page_type).await
            {
                if confidence >= HIGH_CONFIDENCE
                    && best.as_ref().map_or(true, |(_, _, c)| confidence > *c)
                {
                    best = Some((page_type, strategy, confidence));
                }
            }
        }
        best.map(|(page_type, strategy, _)| (page_type, strategy))
    }

    async fn record_pattern_outcomes(
        &self,
        domain: &str,
        suggested: Option<(PageType, Strategy)>,
        result_strategy: Strategy,
        page_type: PageType,
        found_products: bool,
    ) {
        // Decay applies to the key the suggestion came from, and only
        // when the page actually was that kind of page.
        if let Some((expected_type, expected)) = suggested {
            if expected_type == page_type && result_strategy != expected {
                self.learner
                    .record_outcome(domain, expected_type, expected, false)
                    .await;
            }
        }
        if found_products && result_strategy != Strategy::GenericContent {
            self.learner
                .record_outcome(domain, page_type, result_strategy, true)
                .await;
        }
    }
}

#[async_trait]
impl Worker for FetchWorker {
    async fn process(&self, fetch: &FetchTask) -> CrawlResult<TaskReport> {
        let job = self
            .state
            .job(fetch.job_id)
            .await
            .ok_or_else(|| CrawlError::Queue(format!("task for unknown job {}", fetch.job_id)))?;
        if job.state.is_terminal() {
            return Err(CrawlError::Cancelled);
        }
        if let Some(token) = self.state.token_for(fetch.job_id).await {
            if token.is_cancelled() {
                return Err(CrawlError::Cancelled);
            }
        }

        let permits = self.state.permits(job.concurrency_class);
        let _permit = permits
            .acquire_owned()
            .await
            .map_err(|_| CrawlError::Cancelled)?;

        let request = RenderRequest::new(fetch.url.clone(), job.limits.fetch_timeout);
        // The renderer contract includes the timeout, but it is
        // enforced here too so a misbehaving collaborator cannot stall
        // a worker.
        let page = tokio::time::timeout(job.limits.fetch_timeout, self.renderer.render(&request))
            .await
            .map_err(|_| {
                CrawlError::TransientFetch(format!("fetch of {} timed out", fetch.url))
            })??;

        let suggested = self.best_suggestion(&fetch.domain).await;
        let result = extract_page(
            &page.html,
            &fetch.url,
            suggested.map(|(_, strategy)| strategy),
        );
        if let Some(degradation) = &result.degradation {
            debug!(url = %fetch.url, %degradation, "extraction degraded");
        }

        self.record_pattern_outcomes(
            &fetch.domain,
            suggested,
            result.strategy,
            result.page_type,
            !result.products.is_empty(),
        )
        .await;

        let products: Vec<_> = result
            .products
            .iter()
            .map(|raw| normalize_product(raw, &fetch.url))
            .collect();
        for (raw, product) in result.products.iter().zip(&products) {
            for issue in normalization_issues(raw, product) {
                debug!(url = %fetch.url, %issue, "field left unset");
            }
        }

        self.storage.save_page(&fetch.url, &result).await?;
        if !products.is_empty() {
            self.storage.save_products(fetch.job_id, &products).await?;
        }

        let next_task = if job.follow_pagination {
            match &result.pagination {
                Some(PaginationHint::NextLink(next)) => task::normalize_url(next)
                    .ok()
                    .map(|url| {
                        FetchTask::new(
                            fetch.job_id,
                            url,
                            fetch.domain.clone(),
                            TaskPriority::NORMAL,
                        )
                    }),
                Some(PaginationHint::LoadMore) | None => None,
            }
        } else {
            None
        };

        debug!(
            url = %fetch.url,
            job_id = %fetch.job_id,
            strategy = result.strategy.as_str(),
            products = products.len(),
            has_next = next_task.is_some(),
            "task processed"
        );

        Ok(TaskReport {
            task_id: fetch.id,
            job_id: fetch.job_id,
            url: fetch.url.clone(),
            products_found: products.len() as u64,
            next_task,
        })
    }
}

/// Restartable pool of worker loops draining the shared queue.
pub struct WorkerPool {
    worker: Arc<dyn Worker>,
    queue: Arc<TaskQueue>,
    completions: mpsc::UnboundedSender<TaskCompletion>,
    shutdown: CancellationToken,
    size: usize,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    #[must_use]
    pub fn new(
        worker: Arc<dyn Worker>,
        queue: Arc<TaskQueue>,
        completions: mpsc::UnboundedSender<TaskCompletion>,
        shutdown: CancellationToken,
        size: usize,
    ) -> Self {
        Self {
            worker,
            queue,
            completions,
            shutdown,
            size: size.max(1),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Spawns the worker loops. Idempotent per pool generation.
    pub async fn start(&self) {
        let mut handles = self.handles.lock().await;
        if !handles.is_empty() {
            return;
        }
        for index in 0..self.size {
            handles.push(self.spawn_loop(index));
        }
    }

    fn spawn_loop(&self, index: usize) -> JoinHandle<()> {
        let worker = self.worker.clone();
        let queue = self.queue.clone();
        let completions = self.completions.clone();
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            debug!(worker = index, "worker loop started");
            loop {
                let mut task = tokio::select! {
                    () = shutdown.cancelled() => break,
                    task = queue.dequeue() => match task {
                        Some(task) => task,
                        None => break,
                    },
                };
                task.state = TaskState::InFlight;
                let outcome = worker.process(&task).await;
                task.state = match &outcome {
                    Ok(_) => TaskState::Done,
                    Err(e) if e.is_retryable() => TaskState::FailedRetryable,
                    Err(_) => TaskState::FailedTerminal,
                };
                if completions.send(TaskCompletion { task, outcome }).is_err() {
                    break;
                }
            }
            debug!(worker = index, "worker loop stopped");
        })
    }

    /// Aborts and respawns every loop. Tasks in flight at the moment
    /// of restart are lost to the channel and resolved later by their
    /// job's timeout.
    pub async fn restart(&self) {
        let mut handles = self.handles.lock().await;
        warn!(workers = handles.len(), "restarting worker pool");
        for handle in handles.drain(..) {
            handle.abort();
        }
        for index in 0..self.size {
            handles.push(self.spawn_loop(index));
        }
    }

    /// Number of loops still running.
    pub async fn active_count(&self) -> usize {
        self.handles
            .lock()
            .await
            .iter()
            .filter(|h| !h.is_finished())
            .count()
    }

    /// Waits for every loop to exit. Call after cancelling the
    /// shutdown token or closing the queue.
    pub async fn join(&self) {
        let mut handles = self.handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
    }
}
