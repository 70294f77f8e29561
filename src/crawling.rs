//! # Queue/Worker Crawling Service
//!
//! Event-driven execution layer: the orchestrator admits jobs and
//! turns them into fetch tasks, the shared priority queue dedups and
//! schedules them, worker loops drain the queue through render
//! permits scoped per concurrency class, and the supervisor governs
//! memory. Components communicate through the queue, a completion
//! channel and [`SharedState`]; none of them call each other
//! directly.

pub mod orchestrator;
pub mod queue;
pub mod state;
pub mod supervisor;
pub mod workers;

pub use orchestrator::CrawlOrchestrator;
pub use queue::{EnqueueOutcome, QueueMetrics, QueueSettings, TaskQueue};
pub use state::{CrawlStats, SharedState};
pub use supervisor::{Pressure, WorkerSupervisor};
pub use workers::{FetchWorker, TaskCompletion, TaskReport, Worker, WorkerPool};
