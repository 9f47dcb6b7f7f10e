//! Tracing subscriber setup

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use terrashade_core::LogConfig;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{
    filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer,
};

/// Keeps the file writer thread alive and remembers where it writes
pub struct LogGuard {
    path: PathBuf,
    _guard: WorkerGuard,
}

impl LogGuard {
    /// File the logs of this process go to
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Open this process's log file behind a non-blocking writer.
///
/// Older files beyond `max_files` are pruned first; the outcome is returned
/// so it can be reported once a subscriber exists.
fn open_log_file(config: &LogConfig) -> Result<(NonBlocking, LogGuard, io::Result<usize>)> {
    config
        .ensure_log_directory()
        .context("Failed to create log directory")?;
    let pruned = config.cleanup_old_logs();

    let path = config.current_log_path();
    let file = File::create(&path).with_context(|| format!("Failed to create log file: {:?}", path))?;
    let (writer, guard) = tracing_appender::non_blocking(file);
    Ok((writer, LogGuard { path, _guard: guard }, pruned))
}

/// Install the global subscriber.
///
/// `RUST_LOG` overrides the configured level. Console output goes to stderr so
/// stdout stays free for command output. The returned guard must outlive all
/// logging when file output is on.
pub fn init(config: &LogConfig) -> Result<Option<LogGuard>> {
    let filter = EnvFilter::builder()
        .with_default_directive(config.parse_level().into())
        .from_env_lossy();

    let console_layer = config.console_output.then(|| {
        fmt::layer()
            .with_writer(io::stderr)
            .with_target(false)
            .with_filter(filter.clone())
    });

    let file = config.file_output.then(|| open_log_file(config)).transpose()?;
    let (file_layer, guard, pruned) = match file {
        Some((writer, guard, pruned)) => {
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(filter);
            (Some(layer), Some(guard), Some(pruned))
        }
        None => (None, None, None),
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("A global tracing subscriber is already installed")?;

    tracing::info!("Logging initialized at level {}", config.parse_level());
    if let Some(guard) = &guard {
        tracing::info!("Logging to {:?}", guard.path());
    }
    match pruned {
        Some(Ok(0)) | None => {}
        Some(Ok(removed)) => tracing::debug!("Removed {} old log files", removed),
        Some(Err(e)) => tracing::warn!("Failed to clean up old log files: {}", e),
    }
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_is_created_and_old_files_pruned() {
        let dir = tempfile::tempdir().unwrap();
        for stale in ["terrashade_1.log", "terrashade_2.log", "terrashade_3.log"] {
            std::fs::write(dir.path().join(stale), "x").unwrap();
        }
        let config = LogConfig {
            file_output: true,
            log_dir: dir.path().to_path_buf(),
            max_files: 2,
            ..LogConfig::default()
        };

        let (_writer, guard, pruned) = open_log_file(&config).unwrap();
        assert_eq!(pruned.unwrap(), 2);
        assert!(guard.path().is_file());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_unlimited_retention_keeps_old_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("terrashade_1.log"), "x").unwrap();
        let config = LogConfig {
            file_output: true,
            log_dir: dir.path().to_path_buf(),
            max_files: 0,
            ..LogConfig::default()
        };

        let (_writer, _guard, pruned) = open_log_file(&config).unwrap();
        assert_eq!(pruned.unwrap(), 0);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    }
}
