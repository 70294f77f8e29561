//! # Infrastructure
//!
//! Contracts for the external collaborators the pipeline calls —
//! rendering, persistence, event delivery — plus configuration,
//! logging and the memory probe backing resource governance. The
//! engine owns no schema and no browser: collaborators are traits
//! with documented error contracts.

pub mod config;
pub mod events;
pub mod logging;
pub mod memory;
pub mod render;
pub mod storage;

pub use config::{CrawlerConfig, LoggingConfig};
pub use events::{EventSink, JobEvent, TracingEventSink};
pub use memory::{MemoryProbe, ProcMemoryProbe};
pub use render::{HttpRenderer, PageRenderer, RenderRequest, RenderedPage};
pub use storage::{MemoryStorage, Storage};
