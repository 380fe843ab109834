/*!
 * Logging Module
 * Subscriber setup: rolling files plus console, JSON in production
 */
pub mod middleware;

use std::io;
use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, util::TryInitError, EnvFilter, Layer,
};

use crate::config::AppConfig;

/// Default directive set when `RUST_LOG` is absent.
pub fn default_filter(config: &AppConfig) -> String {
    let level = match config.log_level.as_deref() {
        Some(level) => level,
        None if config.environment.is_production() => "info",
        None => "debug",
    };
    format!("newsroom_backend={level},tower_http=debug,axum=info,sqlx=warn")
}

/// Installs the global subscriber. The returned guards flush the
/// background writers and must live as long as the process.
pub fn init(config: &AppConfig) -> Result<Vec<WorkerGuard>, TryInitError> {
    if let Err(e) = std::fs::create_dir_all(&config.log_dir) {
        eprintln!("Cannot create log directory {}: {e}", config.log_dir.display());
    }

    let (file_writer, file_guard) = non_blocking(rolling::daily(&config.log_dir, "app.log"));
    let (error_writer, error_guard) = non_blocking(rolling::daily(&config.log_dir, "error.log"));
    let (console_writer, console_guard) = non_blocking(io::stdout());

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(config)));
    let subscriber = tracing_subscriber::registry().with(env_filter);

    if config.environment.is_production() {
        let file_layer = fmt::layer()
            .json()
            .with_writer(file_writer)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);

        let error_layer = fmt::layer()
            .json()
            .with_writer(error_writer)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_filter(tracing_subscriber::filter::LevelFilter::ERROR);

        let console_layer = fmt::layer()
            .json()
            .with_writer(console_writer)
            .with_target(false);

        subscriber
            .with(file_layer)
            .with(error_layer)
            .with(console_layer)
            .try_init()?;
    } else {
        let file_layer = fmt::layer()
            .with_writer(file_writer)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false);

        let error_layer = fmt::layer()
            .with_writer(error_writer)
            .with_target(true)
            .with_ansi(false)
            .with_filter(tracing_subscriber::filter::LevelFilter::ERROR);

        let console_layer = fmt::layer()
            .with_writer(console_writer)
            .with_target(true)
            .pretty();

        subscriber
            .with(file_layer)
            .with(error_layer)
            .with(console_layer)
            .try_init()?;
    }

    tracing::info!(
        environment = config.environment.as_str(),
        dir = %config.log_dir.display(),
        "Logging initialized"
    );
    Ok(vec![file_guard, error_guard, console_guard])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;

    #[test]
    fn test_default_filter_uses_configured_level() {
        let mut config = test_config();
        assert!(default_filter(&config).starts_with("newsroom_backend=debug,"));

        config.log_level = Some("warn".to_string());
        assert!(default_filter(&config).starts_with("newsroom_backend=warn,"));
    }
}
