//! # Domain Model
//!
//! Core data types shared across the pipeline: jobs, fetch tasks,
//! extraction results and normalized products. These types carry no
//! behavior beyond construction and small invariant-preserving
//! helpers; the components in `extraction`, `normalize` and `crawling`
//! operate on them.

pub mod extraction;
pub mod job;
pub mod pattern;
pub mod product;
pub mod task;

pub use extraction::{
    ExtractionResult, PageType, PaginationHint, Platform, RawProduct, RawVariant, Strategy,
};
pub use pattern::{PatternKey, PatternRecord};
pub use job::{
    ConcurrencyClass, CrawlJob, CrawlRequest, JobId, JobLimits, JobState, TaskFailure,
};
pub use product::{Availability, NormalizedProduct, Price, Variant};
pub use task::{normalize_url, FetchTask, TaskId, TaskPriority, TaskState};
