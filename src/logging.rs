//! # Structured Logging Module
//!
//! Environment-aware structured logging for long-running batch jobs: console
//! output always, plus an optional JSON file mirror for post-hoc analysis of
//! runs that span hours.

use crate::config::TelemetryConfig;
use chrono::Utc;
use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::OnceLock;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize console logging with environment-based level selection.
pub fn init_structured_logging() {
    init_with_telemetry(&TelemetryConfig::default());
}

/// Initialize logging per the given telemetry configuration.
///
/// Safe to call more than once; only the first call installs a subscriber.
/// If a global subscriber is already set (e.g. by the embedding application),
/// that subscriber is left in place.
pub fn init_with_telemetry(telemetry: &TelemetryConfig) {
    let telemetry = telemetry.clone();
    LOGGER_INITIALIZED.get_or_init(move || {
        let environment = get_environment();
        let log_level = get_log_level(&environment);

        let console_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_level(true)
            .with_ansi(true)
            .with_filter(EnvFilter::new(log_level.clone()));

        let file_layer = if telemetry.structured_file_logging {
            let log_dir = PathBuf::from(&telemetry.log_directory);
            if !log_dir.exists() {
                if let Err(e) = fs::create_dir_all(&log_dir) {
                    eprintln!("failed to create log directory {}: {e}", log_dir.display());
                }
            }

            let pid = process::id();
            let timestamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
            let file_name = format!("{environment}.{pid}.{timestamp}.log");
            let file_appender = tracing_appender::rolling::never(&log_dir, file_name);
            let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

            // The guard must outlive the process for the writer to flush.
            std::mem::forget(guard);

            Some(
                fmt::layer()
                    .with_writer(file_writer)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_level(true)
                    .with_ansi(false)
                    .json()
                    .with_filter(EnvFilter::new(log_level)),
            )
        } else {
            None
        };

        let subscriber = tracing_subscriber::registry()
            .with(console_layer)
            .with(file_layer);

        if subscriber.try_init().is_err() {
            tracing::debug!(
                "global tracing subscriber already initialized, keeping the existing one"
            );
        }

        tracing::info!(
            pid = process::id(),
            environment = %environment,
            file_logging = telemetry.structured_file_logging,
            "🔧 structured logging initialized"
        );
    });
}

/// Get the current environment from environment variables.
fn get_environment() -> String {
    std::env::var("BATCH_ENGINE_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get the log level for an environment.
fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}
