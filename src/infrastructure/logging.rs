//! Logging initialization.
//!
//! Builds a `tracing` subscriber from [`LoggingConfig`]: a console
//! layer, an optional daily-rolling file layer, and an `EnvFilter`
//! that `RUST_LOG` overrides. Noisy dependency targets are capped
//! below trace level so operational logs stay readable.

use std::sync::Mutex;

use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use tracing::info;
use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

pub use crate::infrastructure::config::LoggingConfig;

// Keeps the non-blocking file writer alive for the process lifetime.
static LOG_GUARDS: Lazy<Mutex<Vec<WorkerGuard>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// Initializes the global subscriber. Call once at startup; a second
/// call fails because the global default is already set.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| build_filter(config));
    let registry = Registry::default().with(env_filter);

    match (config.console_output, config.file_output) {
        (true, true) => {
            let console_layer = fmt::Layer::new().with_writer(std::io::stdout).with_target(false);
            let file_layer = file_layer(config)?;
            registry.with(console_layer).with(file_layer).init();
        }
        (true, false) => {
            let console_layer = fmt::Layer::new().with_writer(std::io::stdout).with_target(false);
            registry.with(console_layer).init();
        }
        (false, true) => {
            let file_layer = file_layer(config)?;
            registry.with(file_layer).init();
        }
        (false, false) => return Err(anyhow!("no logging output configured")),
    }

    info!(level = %config.level, file_output = config.file_output, "logging initialized");
    Ok(())
}

fn build_filter(config: &LoggingConfig) -> EnvFilter {
    let mut filter = EnvFilter::new(&config.level);
    if !config.level.eq_ignore_ascii_case("trace") {
        for directive in ["reqwest=info", "hyper=warn", "h2=warn", "tokio=info"] {
            if let Ok(parsed) = directive.parse() {
                filter = filter.add_directive(parsed);
            }
        }
    }
    filter
}

fn file_layer<S>(config: &LoggingConfig) -> Result<Box<dyn Layer<S> + Send + Sync>>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    std::fs::create_dir_all(&config.log_dir)
        .map_err(|e| anyhow!("creating log directory {}: {e}", config.log_dir))?;
    let appender = rolling::daily(&config.log_dir, "storecrawl.log");
    let (writer, guard) = non_blocking(appender);
    LOG_GUARDS
        .lock()
        .map_err(|_| anyhow!("log guard mutex poisoned"))?
        .push(guard);

    let layer = if config.json_format {
        fmt::Layer::new()
            .json()
            .with_writer(writer)
            .with_target(true)
            .with_ansi(false)
            .boxed()
    } else {
        fmt::Layer::new()
            .with_writer(writer)
            .with_target(false)
            .with_ansi(false)
            .boxed()
    };
    Ok(layer)
}
