use super::config::{LogFormat, LogLevel};
use std::sync::Once;
use thiserror::Error;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Targets that are too chatty at the application's level.
const QUIET_TARGETS: &[&str] = &["hyper", "hyper_util", "reqwest", "h2", "rustls"];

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Invalid log filter '{filter}': {source}")]
    InvalidFilter {
        filter: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },
    #[error("Failed to install global subscriber: {0}")]
    InstallFailed(String),
}

/// Default filter directives for `level`, used when `RUST_LOG` is unset.
pub fn build_filter_string(level: LogLevel) -> String {
    let mut directives = Vec::with_capacity(QUIET_TARGETS.len() + 1);
    directives.push(level.as_str().to_string());
    for target in QUIET_TARGETS {
        directives.push(format!("{target}=warn"));
    }
    directives.join(",")
}

/// Installs the global subscriber. Only the first call in a process has an
/// effect; later calls return `Ok(())`.
pub fn init_logging(level: LogLevel, format: LogFormat) -> Result<(), LoggingError> {
    static INIT: Once = Once::new();

    let mut result = Ok(());
    INIT.call_once(|| result = install(level, format));
    result
}

fn install(level: LogLevel, format: LogFormat) -> Result<(), LoggingError> {
    let filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) if !directives.trim().is_empty() => directives,
        _ => build_filter_string(level),
    };
    let env_filter = EnvFilter::try_new(&filter)
        .map_err(|source| LoggingError::InvalidFilter { filter, source })?;

    let registry = tracing_subscriber::registry().with(env_filter);
    let installed = match format {
        LogFormat::Compact => registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };

    installed.map_err(|e| LoggingError::InstallFailed(e.to_string()))
}
