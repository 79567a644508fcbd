use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Where and how pipeline logs are emitted.
pub struct LogOptions {
    /// Prefix of the daily-rolled log files, e.g. "pipeline".
    pub component: String,
    /// Log directory; defaults to `~/.nutpress/logs`.
    pub directory: Option<PathBuf>,
    /// Mirror log lines to stderr, useful for interactive runs.
    pub to_stderr: bool,
}

impl LogOptions {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            directory: None,
            to_stderr: false,
        }
    }

    pub fn directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    pub fn to_stderr(mut self, enabled: bool) -> Self {
        self.to_stderr = enabled;
        self
    }
}

fn default_log_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    Path::new(&home).join(".nutpress/logs")
}

/// Installs the global subscriber: daily-rolled files plus an optional
/// stderr mirror. The returned guard flushes buffered lines on drop and must
/// outlive the process' logging.
pub fn init_logging(options: &LogOptions) -> WorkerGuard {
    let log_dir = options.directory.clone().unwrap_or_else(default_log_dir);
    let _ = std::fs::create_dir_all(&log_dir);

    // Roll daily, with the component name as the prefix
    let file_appender = tracing_appender::rolling::daily(&log_dir, &options.component);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true);

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);

    if options.to_stderr {
        let stderr_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(false);
        registry.with(stderr_layer).init();
    } else {
        registry.init();
    }

    guard
}

#[cfg(test)]
mod tests {
    use super::*;

    // One test only: installing the global subscriber is a once-per-process
    // operation.
    #[test]
    fn log_files_land_in_the_requested_directory() {
        let dir = tempfile::tempdir().unwrap();
        let guard = init_logging(
            &LogOptions::new("pipeline").directory(dir.path()),
        );

        tracing::info!("chain started");
        drop(guard);

        let files: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .collect();
        assert_eq!(files.len(), 1);
        let name = files[0].file_name();
        assert!(name.to_string_lossy().starts_with("pipeline"));
    }
}
