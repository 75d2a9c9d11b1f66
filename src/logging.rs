use std::path::Path;
use std::time::{Duration, Instant};

use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::error::{InsightError, Result};

/// Initialize structured logging
///
/// `RUST_LOG` overrides `log_level`. Console output goes to stderr so stdout
/// stays clean for command output. With `log_file` set, a daily-rolling JSON
/// file is written as well; keep the returned guard alive until exit or the
/// tail of the log is lost.
pub fn init_logging(
    log_level: Option<&str>,
    log_file: Option<&Path>,
    json: bool,
) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level.unwrap_or("info")))
        .map_err(|e| InsightError::InvalidConfig(format!("Failed to create log filter: {e}")))?;

    let console_text = (!json).then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(true)
    });
    let console_json = json.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .json()
    });

    let mut guard = None;
    let file_layer = log_file.map(|log_path| {
        let dir = log_path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
        let prefix = log_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("txt-insight.log")
            .to_string();
        let (writer, worker_guard) = non_blocking(rolling::daily(dir, prefix));
        guard = Some(worker_guard);
        fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(true)
            .json()
    });

    Registry::default()
        .with(env_filter)
        .with(console_text)
        .with(console_json)
        .with(file_layer)
        .try_init()
        .map_err(|e| InsightError::InvalidConfig(format!("Logging already initialized: {e}")))?;

    info!("Logging system initialized");
    Ok(guard)
}

/// Times one operation and logs it on completion
pub struct OperationTimer {
    operation: &'static str,
    start: Instant,
    finished: bool,
}

impl OperationTimer {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            start: Instant::now(),
            finished: false,
        }
    }

    /// Name the timer was created with.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        self.operation
    }

    /// Stop the timer, log at debug, and return the elapsed time.
    pub fn finish(mut self) -> Duration {
        self.finished = true;
        let elapsed = self.start.elapsed();
        tracing::debug!(
            operation = self.operation,
            duration_ms = elapsed.as_millis() as u64,
            "Operation completed"
        );
        elapsed
    }
}

impl Drop for OperationTimer {
    fn drop(&mut self) {
        if !self.finished && !std::thread::panicking() {
            tracing::debug!(
                operation = self.operation,
                duration_ms = self.start.elapsed().as_millis() as u64,
                "Operation abandoned"
            );
        }
    }
}
