//! Tracing setup for the license check run.
//!
//! Events go to stdout and, when the log directory is writable, to a dated
//! plain-text file `license_check_YYYYMMDD.log` inside it.

use chrono::Local;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Path of today's log file inside `log_dir`.
pub fn log_file_path(log_dir: &Path) -> PathBuf {
    log_dir.join(format!("license_check_{}.log", Local::now().format("%Y%m%d")))
}

/// Initialize the global subscriber.
///
/// Reads `RUST_LOG`, defaulting to `info`.
pub fn init(log_dir: &Path) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let log_path = log_file_path(log_dir);

    let file = fs::create_dir_all(log_dir).and_then(|_| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
    });

    let (file_layer, file_error) = match file {
        Ok(file) => (
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(true)
                    .with_writer(Mutex::new(file)),
            ),
            None,
        ),
        Err(e) => (None, Some(e)),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stdout))
        .with(file_layer)
        .init();

    if let Some(e) = file_error {
        warn!(path = %log_path.display(), error = %e, "Log file unavailable, logging to stdout only");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_name_is_dated() {
        let path = log_file_path(Path::new("logs"));
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("license_check_"));
        assert!(name.ends_with(".log"));
        assert_eq!(name.len(), "license_check_YYYYMMDD.log".len());
    }
}
