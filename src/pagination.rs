//! # Catalog Crawler
//!
//! Sequential multi-page catalog walk: render a listing page, extract
//! its products, follow the detected next link, repeat. Pages within
//! one catalog are never fetched in parallel, so page N+1 always sees
//! the dedup state produced by page N.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::{task, NormalizedProduct, PaginationHint, Strategy};
use crate::error::CrawlResult;
use crate::extraction::extract_page;
use crate::infrastructure::{PageRenderer, RenderRequest};
use crate::normalize::normalize_product;
use crate::patterns::{PatternLearner, HIGH_CONFIDENCE};

/// Consecutive pages contributing zero new products before the walk
/// is declared stalled.
const STALL_PAGES: u32 = 3;

/// Per-walk options.
#[derive(Debug, Clone)]
pub struct CatalogOptions {
    pub max_pages: u32,
    pub follow_pagination: bool,
    /// Politeness delay between page fetches.
    pub page_delay: Duration,
    /// Trusted targets skip the politeness delay.
    pub trusted: bool,
    pub fetch_timeout: Duration,
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self {
            max_pages: 100,
            follow_pagination: true,
            page_delay: Duration::from_millis(750),
            trusted: false,
            fetch_timeout: Duration::from_secs(30),
        }
    }
}

/// Why a catalog walk ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// No usable next link, or the next page failed to render.
    NoFurtherPagination,
    MaxPagesReached,
    /// Pages kept rendering but stopped contributing new products.
    Stalled,
}

/// Result of one catalog walk.
#[derive(Debug, Clone)]
pub struct CatalogOutcome {
    /// Deduplicated products across all visited pages, in discovery
    /// order.
    pub products: Vec<NormalizedProduct>,
    pub pages_visited: u32,
    pub stop_reason: StopReason,
}

/// Walks paginated catalogs through a render collaborator.
pub struct CatalogCrawler {
    renderer: Arc<dyn PageRenderer>,
    learner: Arc<PatternLearner>,
}

impl CatalogCrawler {
    #[must_use]
    pub fn new(renderer: Arc<dyn PageRenderer>, learner: Arc<PatternLearner>) -> Self {
        Self { renderer, learner }
    }

    /// Walks the catalog starting at `start_url`.
    ///
    /// A failure rendering the first page is the caller's error; a
    /// failure on any later page ends the walk with what was gathered
    /// so far. Identity for dedup is SKU when present, else product
    /// URL.
    pub async fn crawl_catalog(
        &self,
        start_url: &str,
        options: &CatalogOptions,
    ) -> CrawlResult<CatalogOutcome> {
        let start = task::normalize_url(start_url)?;
        let domain = task::domain_of(&start)?;

        let mut products: Vec<NormalizedProduct> = Vec::new();
        let mut seen_identities: HashSet<String> = HashSet::new();
        let mut visited_pages: HashSet<String> = HashSet::new();
        let mut pages_visited = 0u32;
        let mut stale_pages = 0u32;
        let mut current = start;

        let stop_reason = loop {
            if pages_visited >= options.max_pages {
                break StopReason::MaxPagesReached;
            }
            if !visited_pages.insert(current.clone()) {
                debug!(url = %current, "pagination loop detected");
                break StopReason::NoFurtherPagination;
            }
            if pages_visited > 0 && !options.trusted && !options.page_delay.is_zero() {
                tokio::time::sleep(options.page_delay).await;
            }

            let request = RenderRequest::new(current.clone(), options.fetch_timeout);
            let page = match self.renderer.render(&request).await {
                Ok(page) => page,
                Err(err) if pages_visited == 0 => return Err(err),
                Err(err) => {
                    warn!(url = %current, %err, "next page failed, ending walk");
                    break StopReason::NoFurtherPagination;
                }
            };
            pages_visited += 1;

            let suggested = self
                .learner
                .suggest_strategy(&domain, crate::domain::PageType::Listing)
                .await
                .filter(|(_, confidence)| *confidence >= HIGH_CONFIDENCE)
                .map(|(strategy, _)| strategy);
            let result = extract_page(&page.html, &current, suggested);

            if let Some(expected) = suggested {
                if result.strategy != expected {
                    self.learner
                        .record_outcome(&domain, result.page_type, expected, false)
                        .await;
                }
            }
            if !result.products.is_empty() && result.strategy != Strategy::GenericContent {
                self.learner
                    .record_outcome(&domain, result.page_type, result.strategy, true)
                    .await;
            }

            let mut new_on_page = 0usize;
            for raw in &result.products {
                let product = normalize_product(raw, &current);
                if seen_identities.insert(product.dedup_identity().to_string()) {
                    products.push(product);
                    new_on_page += 1;
                }
            }
            debug!(
                url = %current,
                page = pages_visited,
                new_products = new_on_page,
                "catalog page extracted"
            );

            if new_on_page == 0 {
                stale_pages += 1;
                if stale_pages >= STALL_PAGES {
                    break StopReason::Stalled;
                }
            } else {
                stale_pages = 0;
            }

            if !options.follow_pagination {
                break StopReason::NoFurtherPagination;
            }
            match result.pagination {
                Some(PaginationHint::NextLink(next)) => current = next,
                // A load-more affordance needs script execution the
                // render contract does not promise.
                Some(PaginationHint::LoadMore) | None => {
                    break StopReason::NoFurtherPagination;
                }
            }
        };

        info!(
            pages = pages_visited,
            products = products.len(),
            ?stop_reason,
            "catalog walk finished"
        );
        Ok(CatalogOutcome {
            products,
            pages_visited,
            stop_reason,
        })
    }
}
