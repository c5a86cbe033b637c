//! Logging setup for churnflow
//!
//! Logs go to stderr and to daily-rotating files in the platform data
//! directory. Library code only emits `tracing` events; the binary calls
//! [`init`] once at startup.
//!
//! ## Usage
//!
//! ```no_run
//! use churnflow::logging;
//!
//! logging::init(false).expect("Failed to initialize logging");
//!
//! tracing::info!("Session started");
//! tracing::warn!("Column 'Surname' excluded from features");
//! ```

use anyhow::{Context as _, Result};
use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer as _, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

const APP_DIR: &str = "churnflow";

/// Gets the log directory path based on platform conventions
///
/// Returns:
/// - Windows: `%APPDATA%/churnflow/logs`
/// - macOS: `~/Library/Application Support/churnflow/logs`
/// - Linux: `~/.local/share/churnflow/logs`
pub fn get_log_dir() -> Result<PathBuf> {
    let base_dir = dirs::data_dir().context("Failed to determine data directory")?;
    let log_dir = base_dir.join(APP_DIR).join("logs");

    if !log_dir.exists() {
        std::fs::create_dir_all(&log_dir)
            .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;
    }

    Ok(log_dir)
}

/// Initializes console and file logging
///
/// Creates two daily-rotating log files, keeping 10 of each:
/// - `churnflow.log`: everything the filter lets through
/// - `error.log`: warnings and errors only, including convergence warnings
///
/// `verbose` lowers the default level from `info` to `debug`; `RUST_LOG`
/// overrides both.
///
/// # Errors
///
/// Returns error if log directory cannot be created or file appenders fail
pub fn init(verbose: bool) -> Result<()> {
    let log_dir = get_log_dir()?;

    let all_logs_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(10)
        .filename_prefix(APP_DIR)
        .filename_suffix("log")
        .build(&log_dir)
        .context("Failed to create all-logs file appender")?;

    let error_logs_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(10)
        .filename_prefix("error")
        .filename_suffix("log")
        .build(&log_dir)
        .context("Failed to create error-logs file appender")?;

    let default_level = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .context("Failed to create env filter")?;

    // stdout carries command output, so console logging goes to stderr.
    let console_layer = fmt::layer()
        .with_target(false)
        .without_time()
        .compact()
        .with_writer(std::io::stderr);

    let all_logs_layer = fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false)
        .with_writer(all_logs_appender);

    let error_logs_layer = fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false)
        .with_writer(error_logs_appender)
        .with_filter(EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(all_logs_layer)
        .with(error_logs_layer)
        .try_init()
        .context("A global tracing subscriber is already installed")?;

    tracing::debug!(
        "Logging initialized, writing to {}",
        get_current_log_path()?.display()
    );

    Ok(())
}

/// Gets the path to today's log file
///
/// The appender rolls over at midnight UTC, so the date is a UTC date.
pub fn get_current_log_path() -> Result<PathBuf> {
    let log_dir = get_log_dir()?;
    let today = chrono::Utc::now().format("%Y-%m-%d").to_string();
    Ok(log_dir.join(format!("{APP_DIR}.{today}.log")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_log_dir() -> anyhow::Result<()> {
        let log_dir = get_log_dir()?;
        assert!(log_dir.ends_with("churnflow/logs") || log_dir.ends_with("churnflow\\logs"));
        Ok(())
    }

    #[test]
    fn test_current_log_path_is_dated() -> anyhow::Result<()> {
        let path = get_current_log_path()?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        assert!(name.starts_with("churnflow.") && name.ends_with(".log"), "{name}");

        let date = name
            .trim_start_matches("churnflow.")
            .trim_end_matches(".log");
        let parsed = chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d")?;
        let today = chrono::Utc::now().date_naive();
        assert!(
            parsed == today || parsed.succ_opt() == Some(today),
            "{date} is not the current UTC date"
        );
        Ok(())
    }
}
