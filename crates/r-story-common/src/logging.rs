//! ---
//! story_section: "01-core-functionality"
//! story_subsection: "module"
//! story_type: "source"
//! story_scope: "code"
//! story_description: "Shared primitives and utilities for the page runtime."
//! story_version: "v0.0.0-prealpha"
//! story_owner: "tbd"
//! ---
use std::io;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::registry::Registry;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

const LOG_ENV: &str = "R_STORY_LOG";
const DEFAULT_DIRECTIVE: &str = "info";

/// Flush guards for the non-blocking writers; dropping them loses buffered lines.
static GUARDS: OnceCell<(WorkerGuard, WorkerGuard)> = OnceCell::new();

/// Available log formats for the runtime.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    #[default]
    StructuredJson,
    Pretty,
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global subscriber for `service_name`.
///
/// * `R_STORY_LOG` sets the filter (e.g. `info`, `debug,r_story_page=trace`),
///   then `RUST_LOG`, then `info`.
/// * Stdout gets JSON or pretty lines per `config.format`; a daily rolling
///   JSON file under `config.directory` is always written.
///
/// Calling it again after a subscriber is installed is a no-op.
pub fn init_tracing(service_name: &str, config: &LoggingConfig) -> Result<()> {
    std::fs::create_dir_all(&config.directory).with_context(|| {
        format!(
            "unable to create log directory {}",
            config.directory.display()
        )
    })?;
    let prefix = config.file_prefix.as_deref().unwrap_or(service_name);
    let (file_writer, file_guard) = tracing_appender::non_blocking(rolling::daily(
        &config.directory,
        format!("{prefix}-{service_name}.log"),
    ));
    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(io::stdout());
    let _ = GUARDS.set((file_guard, stdout_guard));

    let installed = tracing_subscriber::registry()
        .with(stdout_layer(config.format, stdout_writer))
        .with(
            fmt::layer()
                .with_timer(fmt::time::UtcTime::rfc_3339())
                .json()
                .with_writer(file_writer),
        )
        .with(env_filter())
        .try_init()
        .is_ok();

    if installed {
        info!(
            service = %service_name,
            log_dir = %config.directory.display(),
            format = ?config.format,
            "tracing initialised"
        );
    }
    Ok(())
}

fn stdout_layer(format: LogFormat, writer: NonBlocking) -> BoxedLayer {
    let layer = fmt::layer().with_timer(fmt::time::UtcTime::rfc_3339());
    match format {
        LogFormat::StructuredJson => layer.with_target(false).json().with_writer(writer).boxed(),
        LogFormat::Pretty => layer.with_writer(writer).boxed(),
    }
}

fn env_filter() -> EnvFilter {
    match std::env::var(LOG_ENV) {
        Ok(directive) => EnvFilter::try_new(&directive).unwrap_or_else(|err| {
            eprintln!("ignoring invalid {LOG_ENV} directive '{directive}': {err}");
            EnvFilter::new(DEFAULT_DIRECTIVE)
        }),
        Err(_) => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_uses_kebab_case() {
        let format: LogFormat = serde_json::from_str("\"structured-json\"").unwrap();
        assert_eq!(format, LogFormat::StructuredJson);
        let pretty: LogFormat = serde_json::from_str("\"pretty\"").unwrap();
        assert_eq!(pretty, LogFormat::Pretty);
    }

    #[test]
    fn init_creates_log_directory() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config = LoggingConfig {
            directory: temp.path().join("logs"),
            format: LogFormat::Pretty,
            file_prefix: Some("test".into()),
        };
        init_tracing("r-story-common", &config).expect("init tracing");
        assert!(config.directory.is_dir());
    }
}
