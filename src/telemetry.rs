//! Tracing setup for the engine binary.
//!
//! Sweeps and dispatches log with structured fields (`tenant_id`, `user_id`,
//! `sweep`, `event`), so the default output is JSON. SQL chatter from
//! SeaORM and sqlx is held at `warn` unless `RUST_LOG` asks for more.

use std::any::type_name_of_val;
use std::sync::atomic::{AtomicBool, Ordering};

use log::LevelFilter;
use thiserror::Error;
use tracing_log::LogTracer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::Layer,
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
};

use crate::config::AppConfig;

const QUIET_DEPENDENCIES: [&str; 3] = ["sea_orm=warn", "sqlx=warn", "sea_orm_migration=info"];

#[derive(Debug, Error)]
pub enum TelemetryInitError {
    #[error("failed to install log tracer bridge: {0}")]
    LogTracer(#[from] log::SetLoggerError),
    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(#[from] TryInitError),
}

static TRACING_READY: AtomicBool = AtomicBool::new(false);

/// Directives used when `RUST_LOG` is unset: the configured level for the
/// engine, `warn` for the database crates.
pub fn default_directives(log_level: &str) -> String {
    std::iter::once(log_level)
        .chain(QUIET_DEPENDENCIES)
        .collect::<Vec<_>>()
        .join(",")
}

/// Install the global subscriber once. `log::` records are bridged into it.
pub fn init_tracing(config: &AppConfig) -> Result<(), TelemetryInitError> {
    if TRACING_READY
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return Ok(());
    }

    if let Err(err) = LogTracer::builder()
        .with_max_level(LevelFilter::Info)
        .init()
    {
        let logger_type = type_name_of_val(log::logger());
        if !logger_type.contains("LogTracer") {
            eprintln!("Warning: log bridge not installed ({err}); `log::` records are dropped.");
        }
    }

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(&config.log_level)));

    let fmt_layer = match config.log_format.as_str() {
        "pretty" => fmt::layer().pretty().with_target(false).boxed(),
        _ => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
    };

    if let Err(err) = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
    {
        TRACING_READY.store(false, Ordering::SeqCst);
        return Err(TelemetryInitError::Subscriber(err));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_quiet_database_crates() {
        let directives = default_directives("debug");
        assert!(directives.starts_with("debug,"));
        assert!(directives.contains("sqlx=warn"));
        assert!(EnvFilter::try_new(&directives).is_ok());
    }
}
