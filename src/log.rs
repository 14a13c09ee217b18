//! Tracing setup: stdout plus a non-blocking log file.
//!
//! Per-entry warnings (rejected values, missing required fields, icon
//! failures) go through this; silent-by-design drops of adversarial input
//! shapes do not log at all.

// -- std imports (conditional)
#[cfg(debug_assertions)]
use std::fs;

// -- std imports
use std::{path::PathBuf, sync::OnceLock};

// -- crate imports (conditional)
#[cfg(all(debug_assertions, feature = "tokio-console"))]
use console_subscriber::ConsoleLayer;

// -- crate imports
use anyhow::{Context, Result};
use tracing::warn;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, filter::LevelFilter, fmt, prelude::*, registry::Registry};

/// Keeps the non-blocking file writer's worker thread alive for the whole
/// process; dropping the guard early would lose buffered records.
static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

const LOG_FILE_NAME: &str = "appmenu-sync.log";

#[cfg(debug_assertions)]
const LOG_LEVEL: LevelFilter = LevelFilter::DEBUG;

#[cfg(not(debug_assertions))]
const LOG_LEVEL: LevelFilter = LevelFilter::INFO;

/// Path of the log file: `./appmenu-sync.log` in debug builds, the XDG data
/// directory in release builds.
///
/// # Errors
/// - [`anyhow::Error`] if the XDG data directory cannot be used or created
///   (release builds only).
pub fn log_filepath() -> Result<PathBuf> {
    #[cfg(debug_assertions)]
    {
        let path = PathBuf::from(LOG_FILE_NAME);
        let _ = fs::remove_file(&path);
        Ok(path)
    }

    #[cfg(not(debug_assertions))]
    {
        xdg::BaseDirectories::with_prefix("appmenu-sync")
            .place_data_file(LOG_FILE_NAME)
            .with_context(|| "Could not determine log file path")
    }
}

/// Build the non-blocking file writer and park its guard in [`LOG_GUARD`].
fn build_file_writer() -> Result<NonBlocking> {
    let path = log_filepath()?;

    let dir = path
        .parent()
        .context("Could not determine log file directory")?;
    let file_name = path
        .file_name()
        .context("Could not determine log file name")?;

    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    Ok(file_writer)
}

/// Initializes global tracing with stdout and file logging. Falls back to
/// stdout only when the log file cannot be set up.
///
/// # Errors
/// - [`anyhow::Error`] if the global tracing subscriber cannot be installed.
pub fn init_tracing() -> Result<()> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LOG_LEVEL.into())
        .from_env_lossy();

    #[cfg(debug_assertions)]
    let stdout_layer = fmt::layer()
        .with_file(true)
        .with_line_number(true)
        .with_target(false)
        .with_filter(env_filter.clone());

    #[cfg(not(debug_assertions))]
    let stdout_layer = fmt::layer()
        .with_target(false)
        .with_filter(env_filter.clone());

    match build_file_writer() {
        Ok(writer) => {
            #[cfg(debug_assertions)]
            let file_layer = fmt::layer()
                .pretty()
                .with_file(true)
                .with_line_number(true)
                .with_target(false)
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(env_filter.clone());

            #[cfg(not(debug_assertions))]
            let file_layer = fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_target(false)
                .with_filter(env_filter.clone());

            #[cfg(all(debug_assertions, feature = "tokio-console"))]
            let subscriber = Registry::default()
                .with(stdout_layer)
                .with(file_layer)
                .with(ConsoleLayer::builder().spawn());

            #[cfg(not(all(debug_assertions, feature = "tokio-console")))]
            let subscriber = Registry::default().with(stdout_layer).with(file_layer);

            tracing::subscriber::set_global_default(subscriber)?;
        }
        Err(e) => {
            let subscriber = Registry::default().with(stdout_layer);
            tracing::subscriber::set_global_default(subscriber)?;

            warn!(
                "File logging could not be initialized. Falling back to stdout only: {}",
                e
            );
        }
    }

    Ok(())
}
