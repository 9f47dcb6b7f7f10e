//! Logging configuration
//!
//! Settings for the tracing subscriber installed by the binary, plus the
//! housekeeping of the log directory.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

const LOG_FILE_PREFIX: &str = "terrashade_";
const LOG_FILE_EXTENSION: &str = "log";

static SESSION_STAMP: OnceLock<u64> = OnceLock::new();

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default level (`trace`, `debug`, `info`, `warn`, `error`)
    pub level: String,
    /// Log to stderr
    pub console_output: bool,
    /// Log to a file in `log_dir`
    pub file_output: bool,
    /// Directory of the log files
    pub log_dir: PathBuf,
    /// Number of log files kept, the current one included; 0 keeps every file
    pub max_files: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console_output: true,
            file_output: false,
            log_dir: PathBuf::from("logs"),
            max_files: 10,
        }
    }
}

impl LogConfig {
    /// Parse `level`, falling back to INFO
    pub fn parse_level(&self) -> LevelFilter {
        self.level.trim().parse().unwrap_or(LevelFilter::INFO)
    }

    /// Create the log directory if file output is enabled
    pub fn ensure_log_directory(&self) -> io::Result<()> {
        if self.file_output {
            fs::create_dir_all(&self.log_dir)?;
        }
        Ok(())
    }

    /// Path of the log file for this process
    pub fn current_log_path(&self) -> PathBuf {
        let stamp = SESSION_STAMP.get_or_init(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default()
        });
        self.log_dir
            .join(format!("{}{}.{}", LOG_FILE_PREFIX, stamp, LOG_FILE_EXTENSION))
    }

    /// Delete the oldest log files so that a new one keeps the total at `max_files`.
    ///
    /// Returns the number of deleted files.
    pub fn cleanup_old_logs(&self) -> io::Result<usize> {
        if self.max_files == 0 || !self.log_dir.is_dir() {
            return Ok(0);
        }

        let mut logs: Vec<(SystemTime, PathBuf)> = fs::read_dir(&self.log_dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| is_log_file(path))
            .filter_map(|path| {
                let modified = fs::metadata(&path).and_then(|m| m.modified()).ok()?;
                Some((modified, path))
            })
            .collect();

        let keep = self.max_files.saturating_sub(1);
        if logs.len() <= keep {
            return Ok(0);
        }

        // Oldest first
        logs.sort();
        let excess = logs.len() - keep;
        let mut removed = 0;
        for (_, path) in logs.into_iter().take(excess) {
            fs::remove_file(&path)?;
            removed += 1;
        }
        Ok(removed)
    }
}

fn is_log_file(path: &std::path::Path) -> bool {
    let name_matches = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with(LOG_FILE_PREFIX));
    let ext_matches = path.extension().is_some_and(|e| e == LOG_FILE_EXTENSION);
    name_matches && ext_matches
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        let mut config = LogConfig::default();
        assert_eq!(config.parse_level(), LevelFilter::INFO);
        config.level = "debug".to_string();
        assert_eq!(config.parse_level(), LevelFilter::DEBUG);
        config.level = "loud".to_string();
        assert_eq!(config.parse_level(), LevelFilter::INFO);
    }

    #[test]
    fn test_current_log_path_is_stable() {
        let config = LogConfig::default();
        assert_eq!(config.current_log_path(), config.current_log_path());
        assert!(config.current_log_path().starts_with("logs"));
    }

    #[test]
    fn test_cleanup_keeps_newest() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..5 {
            let path = dir.path().join(format!("terrashade_{}.log", i));
            fs::write(&path, "x").unwrap();
            std::thread::sleep(std::time::Duration::from_millis(20));
        }
        fs::write(dir.path().join("unrelated.txt"), "x").unwrap();

        let config = LogConfig {
            file_output: true,
            log_dir: dir.path().to_path_buf(),
            max_files: 3,
            ..LogConfig::default()
        };
        assert_eq!(config.cleanup_old_logs().unwrap(), 3);
        assert!(dir.path().join("terrashade_4.log").exists());
        assert!(dir.path().join("terrashade_3.log").exists());
        assert!(!dir.path().join("terrashade_0.log").exists());
        assert!(dir.path().join("unrelated.txt").exists());
    }

    #[test]
    fn test_zero_max_files_keeps_everything() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("terrashade_0.log"), "x").unwrap();
        let config = LogConfig {
            log_dir: dir.path().to_path_buf(),
            max_files: 0,
            ..LogConfig::default()
        };
        assert_eq!(config.cleanup_old_logs().unwrap(), 0);
        assert!(dir.path().join("terrashade_0.log").exists());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: LogConfig = serde_json::from_str(r#"{ "level": "warn" }"#).unwrap();
        assert_eq!(config.level, "warn");
        assert!(config.console_output);
    }
}
