//! # storecrawl
//!
//! Adaptive e-commerce crawling and product extraction engine.
//!
//! The pipeline runs in layers: the [`crawling`] service admits crawl
//! jobs and schedules fetch tasks across a worker pool; [`extraction`]
//! turns rendered HTML into raw product records through an ordered
//! strategy chain; [`normalize`] canonicalizes prices, availability
//! and specifications; [`patterns`] remembers which strategy worked
//! per domain so later visits extract faster; and [`pagination`]
//! walks multi-page catalogs sequentially. External collaborators
//! (rendering, persistence, events) sit behind the traits in
//! [`infrastructure`].
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use storecrawl::crawling::CrawlOrchestrator;
//! use storecrawl::domain::CrawlRequest;
//! use storecrawl::infrastructure::{
//!     CrawlerConfig, HttpRenderer, MemoryStorage, ProcMemoryProbe, TracingEventSink,
//! };
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let config = CrawlerConfig::default();
//! let renderer = Arc::new(HttpRenderer::new(&config.user_agent)?);
//! let orchestrator = Arc::new(CrawlOrchestrator::new(
//!     config,
//!     renderer,
//!     Arc::new(MemoryStorage::new()),
//!     Arc::new(TracingEventSink),
//!     Arc::new(ProcMemoryProbe),
//! ));
//! orchestrator.start().await;
//! let runner = orchestrator.clone();
//! tokio::spawn(async move { runner.run().await });
//!
//! let job_id = orchestrator
//!     .enqueue_crawl(CrawlRequest {
//!         root_url: "https://shop.example.com/catalog".into(),
//!         max_pages: 20,
//!         concurrency_class: Default::default(),
//!         follow_pagination: true,
//!     })
//!     .await?;
//! # let _ = job_id;
//! # Ok(())
//! # }
//! ```

pub mod crawling;
pub mod domain;
pub mod error;
pub mod extraction;
pub mod infrastructure;
pub mod normalize;
pub mod pagination;
pub mod patterns;

pub use crawling::CrawlOrchestrator;
pub use domain::{CrawlJob, CrawlRequest, JobId, JobState, NormalizedProduct};
pub use error::{CrawlError, CrawlResult};
pub use pagination::{CatalogCrawler, CatalogOptions, CatalogOutcome, StopReason};
pub use patterns::PatternLearner;
