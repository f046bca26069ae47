//! Logging configuration and tracing initialization.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Logging and tracing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: `"trace"`, `"debug"`, `"info"`, `"warn"`, `"error"`.
    #[serde(default = "default_level")]
    pub level: String,
    /// Log format: `"json"` or `"pretty"`.
    #[serde(default = "default_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: default_format(),
        }
    }
}

/// Initialize the global tracing subscriber from configuration.
///
/// `RUST_LOG` takes precedence over the configured level. Safe to call once
/// per process; subsequent calls are ignored.
pub fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let result = if config.format == "json" {
        builder.json().try_init()
    } else {
        builder.pretty().try_init()
    };

    // Another subscriber may already be installed (e.g. by a test harness).
    if result.is_err() {
        tracing::debug!("Tracing subscriber already initialized");
    }
}

fn default_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "json".to_string()
}
