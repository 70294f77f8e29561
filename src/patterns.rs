//! # Pattern Learner
//!
//! Per-(domain, page type) memory of which extraction strategy worked
//! last time. Suggestions only reorder the strategy chain; extraction
//! correctness never depends on this cache, so every mutation here is
//! best-effort and loss of the whole table is a performance event,
//! not a correctness event.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::domain::{PageType, PatternKey, PatternRecord, Strategy};
use crate::infrastructure::Storage;

/// Confidence at or above which a suggestion is worth acting on.
pub const HIGH_CONFIDENCE: f64 = 0.8;

/// Confidence assigned to a freshly observed strategy.
const INITIAL_CONFIDENCE: f64 = 0.3;

/// Fraction of the remaining headroom gained per success.
const SUCCESS_GAIN: f64 = 0.3;

/// Multiplier applied per failure.
const FAILURE_DECAY: f64 = 0.5;

/// Consecutive failures after which the entry is dropped entirely.
const INVALIDATION_STRIKES: u32 = 3;

/// In-memory learner with optional persistence behind [`Storage`].
pub struct PatternLearner {
    table: RwLock<HashMap<PatternKey, PatternRecord>>,
    storage: Option<Arc<dyn Storage>>,
}

impl PatternLearner {
    #[must_use]
    pub fn new() -> Self {
        Self {
            table: RwLock::new(HashMap::new()),
            storage: None,
        }
    }

    /// Learner that loads unknown keys from storage and writes every
    /// update back, best-effort.
    #[must_use]
    pub fn with_storage(storage: Arc<dyn Storage>) -> Self {
        Self {
            table: RwLock::new(HashMap::new()),
            storage: Some(storage),
        }
    }

    /// Suggests a strategy for the given page, with its confidence.
    /// Misses consult storage once and seed the in-memory table.
    pub async fn suggest_strategy(
        &self,
        domain: &str,
        page_type: PageType,
    ) -> Option<(Strategy, f64)> {
        let key = PatternKey::new(domain, page_type);
        if let Some(record) = self.table.read().await.get(&key) {
            return Some((record.strategy, record.confidence));
        }

        let storage = self.storage.as_ref()?;
        match storage.get_pattern(domain, page_type).await {
            Ok(Some(record)) => {
                let suggestion = (record.strategy, record.confidence);
                self.table.write().await.entry(key).or_insert(record);
                Some(suggestion)
            }
            Ok(None) => None,
            Err(err) => {
                warn!(domain, ?page_type, %err, "pattern lookup failed, proceeding without");
                None
            }
        }
    }

    /// Records the outcome of one extraction.
    ///
    /// A success for the cached strategy compounds its confidence
    /// toward 1.0; a success for a different strategy replaces the
    /// entry at initial confidence. A failure only penalizes the
    /// entry whose strategy actually failed, and three consecutive
    /// failures drop it.
    pub async fn record_outcome(
        &self,
        domain: &str,
        page_type: PageType,
        strategy: Strategy,
        success: bool,
    ) {
        let key = PatternKey::new(domain, page_type);
        let snapshot_version = self.table.read().await.get(&key).map(|r| r.version);

        let mut table = self.table.write().await;
        let current = table.get(&key);
        if current.map(|r| r.version) != snapshot_version {
            // Another worker updated the key in between. Their outcome
            // is as fresh as ours; last write wins from here on.
            debug!(domain, ?page_type, "concurrent pattern update, reapplying");
        }

        let updated = match (current, success) {
            (Some(record), true) if record.strategy == strategy => {
                let mut next = record.clone();
                next.confidence = clamp(next.confidence + SUCCESS_GAIN * (1.0 - next.confidence));
                next.consecutive_failures = 0;
                next.version += 1;
                next.last_validated = Utc::now();
                Some(next)
            }
            (_, true) => Some(PatternRecord::new(key.clone(), strategy, INITIAL_CONFIDENCE)),
            (Some(record), false) if record.strategy == strategy => {
                let mut next = record.clone();
                next.confidence = clamp(next.confidence * FAILURE_DECAY);
                next.consecutive_failures += 1;
                next.version += 1;
                next.last_validated = Utc::now();
                if next.consecutive_failures >= INVALIDATION_STRIKES {
                    None
                } else {
                    Some(next)
                }
            }
            // A failure for a strategy the table never recommended
            // says nothing about the cached entry.
            _ => return,
        };

        match updated {
            Some(record) => {
                table.insert(key, record.clone());
                drop(table);
                self.persist(&record).await;
            }
            None => {
                table.remove(&key);
                debug!(domain, ?page_type, "pattern invalidated after repeated failures");
            }
        }
    }

    /// Current number of learned entries.
    pub async fn len(&self) -> usize {
        self.table.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.table.read().await.is_empty()
    }

    async fn persist(&self, record: &PatternRecord) {
        if let Some(storage) = &self.storage {
            if let Err(err) = storage.save_pattern(record).await {
                warn!(key = ?record.key, %err, "pattern save failed, keeping in-memory copy");
            }
        }
    }
}

impl Default for PatternLearner {
    fn default() -> Self {
        Self::new()
    }
}

fn clamp(confidence: f64) -> f64 {
    confidence.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::Strategy;
    use crate::infrastructure::MemoryStorage;
    use proptest::prelude::*;

    #[tokio::test]
    async fn success_compounds_confidence() {
        let learner = PatternLearner::new();
        for _ in 0..5 {
            learner
                .record_outcome("e.com", PageType::Product, Strategy::StructuredData, true)
                .await;
        }
        let (strategy, confidence) = learner
            .suggest_strategy("e.com", PageType::Product)
            .await
            .unwrap();
        assert_eq!(strategy, Strategy::StructuredData);
        assert!(confidence >= HIGH_CONFIDENCE, "got {confidence}");
        assert!(confidence <= 1.0);
    }

    #[tokio::test]
    async fn strategy_switch_restarts_confidence() {
        let learner = PatternLearner::new();
        for _ in 0..5 {
            learner
                .record_outcome("e.com", PageType::Product, Strategy::StructuredData, true)
                .await;
        }
        learner
            .record_outcome("e.com", PageType::Product, Strategy::Microdata, true)
            .await;
        let (strategy, confidence) = learner
            .suggest_strategy("e.com", PageType::Product)
            .await
            .unwrap();
        assert_eq!(strategy, Strategy::Microdata);
        assert!(confidence < HIGH_CONFIDENCE);
    }

    #[tokio::test]
    async fn three_failures_invalidate_entry() {
        let learner = PatternLearner::new();
        learner
            .record_outcome("e.com", PageType::Product, Strategy::Microdata, true)
            .await;
        for _ in 0..3 {
            learner
                .record_outcome("e.com", PageType::Product, Strategy::Microdata, false)
                .await;
        }
        assert!(learner.suggest_strategy("e.com", PageType::Product).await.is_none());
        assert!(learner.is_empty().await);
    }

    #[tokio::test]
    async fn failure_of_unsuggested_strategy_is_ignored() {
        let learner = PatternLearner::new();
        learner
            .record_outcome("e.com", PageType::Product, Strategy::StructuredData, true)
            .await;
        learner
            .record_outcome("e.com", PageType::Product, Strategy::DomHeuristics, false)
            .await;
        let (strategy, _) = learner
            .suggest_strategy("e.com", PageType::Product)
            .await
            .unwrap();
        assert_eq!(strategy, Strategy::StructuredData);
    }

    #[tokio::test]
    async fn keys_are_scoped_per_page_type() {
        let learner = PatternLearner::new();
        learner
            .record_outcome("e.com", PageType::Product, Strategy::StructuredData, true)
            .await;
        assert!(learner.suggest_strategy("e.com", PageType::Listing).await.is_none());
    }

    #[tokio::test]
    async fn seeds_from_storage_and_writes_back() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .save_pattern(&PatternRecord::new(
                PatternKey::new("e.com", PageType::Product),
                Strategy::Microdata,
                0.6,
            ))
            .await
            .unwrap();

        let learner = PatternLearner::with_storage(storage.clone());
        let (strategy, confidence) = learner
            .suggest_strategy("e.com", PageType::Product)
            .await
            .unwrap();
        assert_eq!(strategy, Strategy::Microdata);
        assert!((confidence - 0.6).abs() < 1e-9);

        learner
            .record_outcome("e.com", PageType::Product, Strategy::Microdata, true)
            .await;
        let persisted = storage
            .get_pattern("e.com", PageType::Product)
            .await
            .unwrap()
            .unwrap();
        assert!(persisted.confidence > 0.6);
    }

    proptest! {
        #[test]
        fn confidence_stays_in_unit_interval(outcomes in proptest::collection::vec(any::<bool>(), 0..40)) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let learner = PatternLearner::new();
                for success in outcomes {
                    learner
                        .record_outcome("e.com", PageType::Product, Strategy::DomHeuristics, success)
                        .await;
                    if let Some((_, c)) = learner.suggest_strategy("e.com", PageType::Product).await {
                        prop_assert!((0.0..=1.0).contains(&c));
                    }
                }
                Ok(())
            })?;
        }
    }
}
