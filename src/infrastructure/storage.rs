//! Persistence collaborator contract.
//!
//! The engine calls four operations and owns nothing else about the
//! storage engine. Systemic storage failures surface as
//! [`CrawlError::Storage`] and escalate to job-level failure.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{
    ExtractionResult, JobId, NormalizedProduct, PageType, PatternKey, PatternRecord,
};
use crate::error::CrawlResult;

/// External storage engine contract.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Persists one extracted page.
    async fn save_page(&self, url: &str, result: &ExtractionResult) -> CrawlResult<()>;

    /// Persists the products found by a job's task.
    async fn save_products(&self, job_id: JobId, products: &[NormalizedProduct])
        -> CrawlResult<()>;

    /// Looks up a learned pattern.
    async fn get_pattern(
        &self,
        domain: &str,
        page_type: PageType,
    ) -> CrawlResult<Option<PatternRecord>>;

    /// Upserts a learned pattern.
    async fn save_pattern(&self, record: &PatternRecord) -> CrawlResult<()>;
}

/// In-memory storage used by tests and as a harmless default.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    pages: RwLock<HashMap<String, ExtractionResult>>,
    products: RwLock<HashMap<JobId, Vec<NormalizedProduct>>>,
    patterns: RwLock<HashMap<PatternKey, PatternRecord>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pages saved so far (test observability).
    pub async fn page_count(&self) -> usize {
        self.pages.read().await.len()
    }

    /// Products saved for one job (test observability).
    pub async fn products_for(&self, job_id: JobId) -> Vec<NormalizedProduct> {
        self.products
            .read()
            .await
            .get(&job_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn save_page(&self, url: &str, result: &ExtractionResult) -> CrawlResult<()> {
        self.pages
            .write()
            .await
            .insert(url.to_string(), result.clone());
        Ok(())
    }

    async fn save_products(
        &self,
        job_id: JobId,
        products: &[NormalizedProduct],
    ) -> CrawlResult<()> {
        self.products
            .write()
            .await
            .entry(job_id)
            .or_default()
            .extend_from_slice(products);
        Ok(())
    }

    async fn get_pattern(
        &self,
        domain: &str,
        page_type: PageType,
    ) -> CrawlResult<Option<PatternRecord>> {
        let key = PatternKey::new(domain, page_type);
        Ok(self.patterns.read().await.get(&key).cloned())
    }

    async fn save_pattern(&self, record: &PatternRecord) -> CrawlResult<()> {
        self.patterns
            .write()
            .await
            .insert(record.key.clone(), record.clone());
        Ok(())
    }
}
