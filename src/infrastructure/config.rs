//! Configuration loading and management.
//!
//! The whole engine is driven from one [`CrawlerConfig`] tree that
//! serializes to JSON. Every field has a default so a missing or
//! partial file still produces a working engine.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::info;

/// Hard-coded fallbacks used by the `Default` impls below.
pub mod defaults {
    pub const STANDARD_WORKERS: usize = 4;
    pub const TRUSTED_WORKERS: usize = 12;
    pub const QUEUE_CAPACITY: usize = 10_000;
    pub const DEDUP_WINDOW: usize = 4_096;
    pub const MAX_WAIT_PROMOTION_SECS: u64 = 120;
    pub const MAX_RETRY_ATTEMPTS: u32 = 3;
    pub const RETRY_BASE_DELAY_MS: u64 = 500;
    pub const RETRY_MAX_DELAY_MS: u64 = 30_000;
    pub const FETCH_TIMEOUT_SECS: u64 = 30;
    pub const JOB_TIMEOUT_SECS: u64 = 600;
    pub const PAGE_DELAY_MS: u64 = 750;
    pub const MAX_PAGES_PER_JOB: u32 = 100;
    pub const ERROR_RATIO_THRESHOLD: f64 = 0.5;
    pub const MEMORY_HIGH_WATER_MB: u64 = 1_536;
    pub const MEMORY_CHECK_INTERVAL_SECS: u64 = 5;
    pub const MEMORY_RESTART_STRIKES: u32 = 6;
    pub const USER_AGENT: &str = concat!("storecrawl/", env!("CARGO_PKG_VERSION"));
}

/// Complete engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    pub workers: WorkerConfig,
    pub queue: QueueConfig,
    pub retry: RetryConfig,
    pub limits: LimitsConfig,
    pub memory: MemoryConfig,
    pub domains: DomainPolicy,
    pub logging: LoggingConfig,
    /// User-Agent sent by the default renderer.
    pub user_agent: String,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            workers: WorkerConfig::default(),
            queue: QueueConfig::default(),
            retry: RetryConfig::default(),
            limits: LimitsConfig::default(),
            memory: MemoryConfig::default(),
            domains: DomainPolicy::default(),
            logging: LoggingConfig::default(),
            user_agent: defaults::USER_AGENT.to_string(),
        }
    }
}

/// Worker pool sizes per concurrency class.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub standard_workers: usize,
    pub trusted_workers: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            standard_workers: defaults::STANDARD_WORKERS,
            trusted_workers: defaults::TRUSTED_WORKERS,
        }
    }
}

/// Task queue sizing and scheduling knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Pending tasks accepted before enqueue applies backpressure.
    pub capacity: usize,
    /// Recently-seen dedup keys remembered per queue.
    pub dedup_window: usize,
    /// Waiting this long promotes a task past higher-priority work.
    pub max_wait_promotion_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: defaults::QUEUE_CAPACITY,
            dedup_window: defaults::DEDUP_WINDOW,
            max_wait_promotion_secs: defaults::MAX_WAIT_PROMOTION_SECS,
        }
    }
}

/// Retry policy for transient task failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::MAX_RETRY_ATTEMPTS,
            base_delay_ms: defaults::RETRY_BASE_DELAY_MS,
            max_delay_ms: defaults::RETRY_MAX_DELAY_MS,
        }
    }
}

/// Per-job and per-fetch limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub fetch_timeout_secs: u64,
    pub job_timeout_secs: u64,
    pub max_pages_per_job: u32,
    /// Politeness delay between sequential page fetches (waived for
    /// the trusted class).
    pub page_delay_ms: u64,
    /// A job finishing with failures above this ratio of attempted
    /// pages is marked failed rather than partially complete.
    pub error_ratio_threshold: f64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: defaults::FETCH_TIMEOUT_SECS,
            job_timeout_secs: defaults::JOB_TIMEOUT_SECS,
            max_pages_per_job: defaults::MAX_PAGES_PER_JOB,
            page_delay_ms: defaults::PAGE_DELAY_MS,
            error_ratio_threshold: defaults::ERROR_RATIO_THRESHOLD,
        }
    }
}

/// Memory governance thresholds for the worker supervisor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub high_water_mb: u64,
    pub check_interval_secs: u64,
    /// Consecutive over-high-water observations before workers are
    /// restarted instead of merely shedding queue load.
    pub restart_strikes: u32,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            high_water_mb: defaults::MEMORY_HIGH_WATER_MB,
            check_interval_secs: defaults::MEMORY_CHECK_INTERVAL_SECS,
            restart_strikes: defaults::MEMORY_RESTART_STRIKES,
        }
    }
}

/// Domain allow/deny lists applied at request validation.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DomainPolicy {
    /// When non-empty, only these domains (and their subdomains) are
    /// accepted.
    pub allow: Vec<String>,
    /// Always rejected, even when also allowed.
    pub deny: Vec<String>,
}

impl DomainPolicy {
    /// Checks one already-normalized domain against the policy.
    #[must_use]
    pub fn permits(&self, domain: &str) -> bool {
        if self.deny.iter().any(|d| matches_domain(domain, d)) {
            return false;
        }
        self.allow.is_empty() || self.allow.iter().any(|d| matches_domain(domain, d))
    }
}

fn matches_domain(candidate: &str, rule: &str) -> bool {
    candidate == rule || candidate.ends_with(&format!(".{rule}"))
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub level: String,
    pub console_output: bool,
    pub file_output: bool,
    /// Directory for rolled log files when file output is on.
    pub log_dir: String,
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console_output: true,
            file_output: false,
            log_dir: "logs".to_string(),
            json_format: false,
        }
    }
}

impl CrawlerConfig {
    /// Loads configuration from a JSON file, falling back to defaults
    /// when the file does not exist.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "config file absent, using defaults");
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .await
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }

    /// Writes the configuration back as pretty-printed JSON.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating config directory {}", parent.display()))?;
        }
        let raw = serde_json::to_string_pretty(self).context("serializing config")?;
        fs::write(path, raw)
            .await
            .with_context(|| format!("writing config file {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = CrawlerConfig::default();
        assert_eq!(config.workers.standard_workers, 4);
        assert!(config.workers.trusted_workers > config.workers.standard_workers);
        assert_eq!(config.retry.max_attempts, 3);
        assert!(config.limits.error_ratio_threshold > 0.0);
        assert!(config.user_agent.starts_with("storecrawl/"));
    }

    #[test]
    fn partial_json_fills_missing_fields() {
        let config: CrawlerConfig =
            serde_json::from_str(r#"{"workers":{"standard_workers":2}}"#).unwrap();
        assert_eq!(config.workers.standard_workers, 2);
        assert_eq!(config.workers.trusted_workers, defaults::TRUSTED_WORKERS);
        assert_eq!(config.queue.capacity, defaults::QUEUE_CAPACITY);
    }

    #[test]
    fn domain_policy_deny_wins() {
        let policy = DomainPolicy {
            allow: vec!["example.com".into()],
            deny: vec!["bad.example.com".into()],
        };
        assert!(policy.permits("example.com"));
        assert!(policy.permits("shop.example.com"));
        assert!(!policy.permits("bad.example.com"));
        assert!(!policy.permits("deep.bad.example.com"));
        assert!(!policy.permits("other.org"));
    }

    #[test]
    fn empty_allow_list_permits_everything_not_denied() {
        let policy = DomainPolicy {
            allow: vec![],
            deny: vec!["blocked.net".into()],
        };
        assert!(policy.permits("anything.example"));
        assert!(!policy.permits("blocked.net"));
    }

    #[tokio::test]
    async fn round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crawler.json");

        let mut config = CrawlerConfig::default();
        config.workers.standard_workers = 7;
        config.save(&path).await.unwrap();

        let loaded = CrawlerConfig::load(&path).await.unwrap();
        assert_eq!(loaded.workers.standard_workers, 7);
    }

    #[tokio::test]
    async fn missing_file_yields_defaults() {
        let loaded = CrawlerConfig::load("/nonexistent/crawler.json").await.unwrap();
        assert_eq!(loaded.queue.dedup_window, defaults::DEDUP_WINDOW);
    }
}
