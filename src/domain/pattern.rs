//! # Learned Extraction Patterns
//!
//! A pattern records which extraction strategy worked for a
//! (domain, page type) pair, with an advisory confidence score.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::extraction::{PageType, Strategy};

/// Cache key for learned patterns. Shared across all jobs touching a
/// domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatternKey {
    pub domain: String,
    pub page_type: PageType,
}

impl PatternKey {
    #[must_use]
    pub fn new(domain: impl Into<String>, page_type: PageType) -> Self {
        Self {
            domain: domain.into(),
            page_type,
        }
    }
}

/// A versioned confidence record for one learned strategy.
///
/// Confidence always stays within [0, 1]; three consecutive failures
/// invalidate the entry. The version counter backs optimistic
/// read-modify-write updates of the shared cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternRecord {
    pub key: PatternKey,
    pub strategy: Strategy,
    pub confidence: f64,
    pub consecutive_failures: u32,
    pub version: u64,
    pub last_validated: DateTime<Utc>,
}

impl PatternRecord {
    /// Fresh record for a strategy that just succeeded once.
    #[must_use]
    pub fn new(key: PatternKey, strategy: Strategy, confidence: f64) -> Self {
        Self {
            key,
            strategy,
            confidence: confidence.clamp(0.0, 1.0),
            consecutive_failures: 0,
            version: 1,
            last_validated: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_clamps_confidence() {
        let key = PatternKey::new("e.com", PageType::Product);
        let record = PatternRecord::new(key, Strategy::StructuredData, 1.7);
        assert_eq!(record.confidence, 1.0);
        assert_eq!(record.consecutive_failures, 0);
        assert_eq!(record.version, 1);
    }
}
