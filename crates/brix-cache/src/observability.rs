//! Tracing setup for processes embedding the cache.
//!
//! The filter sits behind a reload layer so an operator can raise or lower
//! verbosity without restarting (see [`apply_logging_level`]).
use std::sync::OnceLock;
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*, reload};

use crate::config::LoggingConfig;

static LOG_RELOAD_HANDLE: OnceLock<reload::Handle<EnvFilter, tracing_subscriber::Registry>> =
    OnceLock::new();

pub fn init_tracing() {
    init_tracing_from_config(&LoggingConfig::default());
}

/// Shorthand for a default subscriber at `level`, used by the CLI.
pub fn init_tracing_with_level(level: &str) {
    init_tracing_from_config(&LoggingConfig {
        level: level.to_string(),
        ..LoggingConfig::default()
    });
}

/// Installs the global subscriber. A second call is a no-op.
pub fn init_tracing_from_config(logging: &LoggingConfig) {
    let (reload_layer, handle) = reload::Layer::new(build_filter(&logging.level));
    let _ = LOG_RELOAD_HANDLE.set(handle);

    let fmt_layer = fmt::layer().with_ansi(logging.ansi).with_target(!logging.compact);
    let fmt_layer = if logging.compact {
        fmt_layer.compact().boxed()
    } else {
        fmt_layer.boxed()
    };

    let _ = tracing_subscriber::registry()
        .with(reload_layer)
        .with(fmt_layer)
        .try_init();
}

/// Apply a new logging level at runtime if reload handle is configured.
pub fn apply_logging_level(level: &str) {
    let Some(handle) = LOG_RELOAD_HANDLE.get() else {
        tracing::debug!(level, "log level change ignored, tracing not initialized");
        return;
    };
    match EnvFilter::try_new(level) {
        Ok(filter) => {
            let _ = handle.modify(|f| *f = filter);
            tracing::info!(level, "log level changed");
        }
        Err(e) => tracing::warn!(level, error = %e, "invalid log level directive"),
    }
}

fn build_filter(level: &str) -> EnvFilter {
    if std::env::var_os("RUST_LOG").is_some() {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return filter;
        }
    }
    EnvFilter::try_new(level).unwrap_or_else(|e| {
        eprintln!("invalid log level '{level}' ({e}), falling back to info");
        EnvFilter::new("info")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_directive_falls_back() {
        let filter = build_filter("brix_cache=notalevel");
        assert!(filter.to_string().contains("info") || std::env::var_os("RUST_LOG").is_some());
    }

    #[test]
    fn test_apply_before_init_is_ignored() {
        apply_logging_level("debug");
    }
}
