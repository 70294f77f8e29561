//! # Worker Supervisor
//!
//! Health and memory governance for the worker pool. The supervisor
//! polls the memory probe on a fixed interval; crossing the
//! high-water mark sheds the lowest-priority queued tasks into a
//! parking buffer, and sustained pressure restarts the pool. Parked
//! tasks are re-enqueued once pressure clears, so load shedding
//! defers work instead of losing it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::crawling::queue::{EnqueueOutcome, TaskQueue};
use crate::crawling::workers::WorkerPool;
use crate::domain::FetchTask;
use crate::infrastructure::config::MemoryConfig;
use crate::infrastructure::MemoryProbe;

/// Fraction of the queue shed on each over-limit observation.
const SHED_FRACTION: f64 = 0.5;

pub struct WorkerSupervisor {
    pool: Arc<WorkerPool>,
    queue: Arc<TaskQueue>,
    probe: Arc<dyn MemoryProbe>,
    config: MemoryConfig,
    shutdown: CancellationToken,
    parked: Mutex<Vec<FetchTask>>,
}

impl WorkerSupervisor {
    #[must_use]
    pub fn new(
        pool: Arc<WorkerPool>,
        queue: Arc<TaskQueue>,
        probe: Arc<dyn MemoryProbe>,
        config: MemoryConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            pool,
            queue,
            probe,
            config,
            shutdown,
            parked: Mutex::new(Vec::new()),
        }
    }

    /// Runs the governance loop until shutdown.
    pub async fn run(&self) {
        let mut interval =
            tokio::time::interval(Duration::from_secs(self.config.check_interval_secs.max(1)));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut strikes = 0u32;

        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => break,
                _ = interval.tick() => {}
            }

            match self.check_pressure().await {
                Pressure::Over => {
                    strikes += 1;
                    if strikes >= self.config.restart_strikes {
                        self.pool.restart().await;
                        strikes = 0;
                    }
                }
                Pressure::Normal => {
                    strikes = 0;
                    self.unpark().await;
                }
                Pressure::Unknown => {}
            }
        }
        debug!("supervisor stopped");
    }

    /// One observation: shed on over-limit, report the verdict.
    pub async fn check_pressure(&self) -> Pressure {
        let Some(rss) = self.probe.rss_bytes() else {
            return Pressure::Unknown;
        };
        let limit = self.config.high_water_mb * 1024 * 1024;
        if rss <= limit {
            return Pressure::Normal;
        }

        let queued = self.queue.len().await;
        let to_shed = ((queued as f64) * SHED_FRACTION).ceil() as usize;
        if to_shed > 0 {
            let shed = self.queue.shed_lowest(to_shed).await;
            warn!(
                rss_mb = rss / (1024 * 1024),
                limit_mb = self.config.high_water_mb,
                shed = shed.len(),
                "memory high water crossed, parking queued tasks"
            );
            self.parked.lock().await.extend(shed);
        }
        Pressure::Over
    }

    /// Returns parked tasks to the queue, stopping if it fills again.
    async fn unpark(&self) {
        let mut parked = self.parked.lock().await;
        if parked.is_empty() {
            return;
        }
        info!(count = parked.len(), "re-enqueueing parked tasks");
        while let Some(task) = parked.pop() {
            if self.queue.enqueue_retry(task.clone()).await == EnqueueOutcome::Rejected {
                parked.push(task);
                break;
            }
        }
    }

    /// Tasks currently parked under memory pressure.
    pub async fn parked_count(&self) -> usize {
        self.parked.lock().await.len()
    }

    /// Drains the parking buffer, used at shutdown to report
    /// unfinished work.
    pub async fn drain_parked(&self) -> Vec<FetchTask> {
        std::mem::take(&mut *self.parked.lock().await)
    }
}

/// Verdict of one memory observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pressure {
    Normal,
    Over,
    /// Probe unavailable on this platform; governance stays inactive.
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawling::queue::QueueSettings;
    use crate::crawling::workers::{TaskCompletion, Worker, WorkerPool};
    use crate::domain::{JobId, TaskPriority};
    use crate::error::CrawlResult;
    use crate::infrastructure::memory::FixedMemoryProbe;
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    struct NoopWorker;

    #[async_trait]
    impl Worker for NoopWorker {
        async fn process(&self, task: &FetchTask) -> CrawlResult<crate::crawling::workers::TaskReport> {
            Ok(crate::crawling::workers::TaskReport {
                task_id: task.id,
                job_id: task.job_id,
                url: task.url.clone(),
                products_found: 0,
                next_task: None,
            })
        }
    }

    fn fetch_task(url: &str) -> FetchTask {
        FetchTask::new(JobId::new(), url.to_string(), "e.com".to_string(), TaskPriority::LOW)
    }

    fn supervisor(
        probe: Arc<FixedMemoryProbe>,
        queue: Arc<TaskQueue>,
    ) -> (WorkerSupervisor, mpsc::UnboundedReceiver<TaskCompletion>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let pool = Arc::new(WorkerPool::new(
            Arc::new(NoopWorker),
            queue.clone(),
            tx,
            shutdown.clone(),
            1,
        ));
        let config = MemoryConfig {
            high_water_mb: 100,
            check_interval_secs: 1,
            restart_strikes: 3,
        };
        (
            WorkerSupervisor::new(pool, queue, probe, config, shutdown),
            rx,
        )
    }

    #[tokio::test]
    async fn pressure_sheds_and_recovery_unparks() {
        let probe = Arc::new(FixedMemoryProbe::new(50 * 1024 * 1024));
        let queue = Arc::new(TaskQueue::new(QueueSettings::default()));
        let (supervisor, _rx) = supervisor(probe.clone(), queue.clone());

        for i in 0..4 {
            queue.enqueue(fetch_task(&format!("https://e.com/{i}"))).await;
        }

        assert_eq!(supervisor.check_pressure().await, Pressure::Normal);
        assert_eq!(supervisor.parked_count().await, 0);

        probe.set_rss(200 * 1024 * 1024);
        assert_eq!(supervisor.check_pressure().await, Pressure::Over);
        assert_eq!(supervisor.parked_count().await, 2);
        assert_eq!(queue.len().await, 2);

        probe.set_rss(50 * 1024 * 1024);
        supervisor.unpark().await;
        assert_eq!(supervisor.parked_count().await, 0);
        assert_eq!(queue.len().await, 4);
    }

    #[tokio::test]
    async fn unavailable_probe_disables_governance() {
        struct NoProbe;
        impl MemoryProbe for NoProbe {
            fn rss_bytes(&self) -> Option<u64> {
                None
            }
        }
        let queue = Arc::new(TaskQueue::new(QueueSettings::default()));
        let (tx, _rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let pool = Arc::new(WorkerPool::new(
            Arc::new(NoopWorker),
            queue.clone(),
            tx,
            shutdown.clone(),
            1,
        ));
        let supervisor = WorkerSupervisor::new(
            pool,
            queue,
            Arc::new(NoProbe),
            MemoryConfig::default(),
            shutdown,
        );
        assert_eq!(supervisor.check_pressure().await, Pressure::Unknown);
    }
}
