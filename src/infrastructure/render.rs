//! Render collaborator contract and the default HTTP-backed
//! implementation.
//!
//! The render engine is a black box with a documented contract:
//! `render` either returns the final HTML with its status code within
//! the request timeout, or fails with a taxonomy error — timeouts and
//! connection problems are transient, anything the engine refuses to
//! process is terminal.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CrawlError, CrawlResult};

/// One render request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderRequest {
    pub url: String,
    /// Ask the engine to skip images/fonts/media for speed.
    pub block_resources: bool,
    /// Hard per-render timeout.
    pub timeout: Duration,
}

impl RenderRequest {
    #[must_use]
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            block_resources: true,
            timeout,
        }
    }
}

/// A rendered page as returned by the collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderedPage {
    pub html: String,
    /// URL after redirects.
    pub final_url: String,
    pub status: u16,
}

/// Browser-automation / fetch engine contract.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Renders a page. Non-2xx statuses are returned as errors already
    /// classified by the taxonomy, never as a page.
    async fn render(&self, request: &RenderRequest) -> CrawlResult<RenderedPage>;
}

/// Default renderer: plain HTTP fetch via reqwest. Suitable for
/// server-rendered sites; script-heavy storefronts want a real
/// browser-automation collaborator behind the same trait.
pub struct HttpRenderer {
    client: reqwest::Client,
}

impl HttpRenderer {
    /// Builds a renderer with its own connection pool.
    pub fn new(user_agent: &str) -> CrawlResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .gzip(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| CrawlError::InvalidRequest(format!("HTTP client build failed: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageRenderer for HttpRenderer {
    async fn render(&self, request: &RenderRequest) -> CrawlResult<RenderedPage> {
        let response = self
            .client
            .get(&request.url)
            .timeout(request.timeout)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e, &request.url))?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();

        if let Some(err) = CrawlError::from_status(status, &request.url) {
            return Err(err);
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !content_type.is_empty()
            && !content_type.contains("html")
            && !content_type.contains("xml")
        {
            return Err(CrawlError::TerminalFetch(format!(
                "unsupported content type '{content_type}' at {final_url}"
            )));
        }

        let html = response
            .text()
            .await
            .map_err(|e| CrawlError::TransientFetch(format!("body read failed: {e}")))?;

        debug!(url = %request.url, status, bytes = html.len(), "rendered page");
        Ok(RenderedPage {
            html,
            final_url,
            status,
        })
    }
}

fn classify_reqwest_error(err: &reqwest::Error, url: &str) -> CrawlError {
    if err.is_timeout() || err.is_connect() {
        CrawlError::TransientFetch(format!("fetch of {url} failed: {err}"))
    } else if err.is_redirect() {
        CrawlError::TerminalFetch(format!("redirect loop at {url}"))
    } else {
        CrawlError::TransientFetch(format!("fetch of {url} failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_request_defaults_block_resources() {
        let req = RenderRequest::new("https://e.com", Duration::from_secs(10));
        assert!(req.block_resources);
        assert_eq!(req.timeout, Duration::from_secs(10));
    }

    #[test]
    fn renderer_builds() {
        assert!(HttpRenderer::new("storecrawl/0.3").is_ok());
    }
}
