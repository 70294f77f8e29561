//! # Content & Product Extraction
//!
//! Two layers share one output contract ([`ExtractionResult`]):
//!
//! - the base content extractor (`content`) isolates the main text of
//!   any page with readability-style density heuristics, and
//! - the e-commerce extractor (`ecommerce`) runs an ordered strategy
//!   chain over product markup — structured linked data first,
//!   microdata second, DOM heuristics last — falling back to the base
//!   extractor when no strategy yields a sufficient record.
//!
//! Extraction is synchronous and allocation-bound; parsed documents
//! never cross an await point.

pub mod content;
pub mod ecommerce;
pub mod heuristics;
pub mod microdata;
pub mod pagination;
pub mod platform;
pub mod structured;

pub use content::{extract_content, ContentExtract, MIN_CONTENT_WORDS};
pub use ecommerce::extract_page;
pub use platform::{detect_platform, Platform};
