use std::env;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_LOG_FILE: &str = "logs/cropsheet.log";

/// Pretty events on stdout plus plain lines in `LOG_FILE_PATH`.
///
/// The returned guard flushes the file writer on drop. If the log file cannot
/// be opened, events still go to stdout and no guard is returned.
pub fn init_logger() -> Option<WorkerGuard> {
    let filter = env::var("TRACING_LEVEL").unwrap_or_else(|_| "info".to_string());
    let filter_layer = EnvFilter::new(filter);

    let log_file = log_file_path();
    let (file_writer, guard, open_error) = match file_appender(&log_file) {
        Ok(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(writer), Some(guard), None)
        }
        Err(err) => (None, None, Some(err)),
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stdout)
                .pretty()
                .with_file(false)
                .without_time()
                .with_ansi(true),
        )
        .with(file_writer.map(|writer| fmt::layer().with_writer(writer).with_ansi(false)))
        .with(filter_layer)
        .init();

    match open_error {
        None => info!("Logging to stdout and {}", log_file.display()),
        Some(err) => warn!(
            "Cannot open log file {}: {}; logging to stdout only",
            log_file.display(),
            err
        ),
    }

    guard
}

fn log_file_path() -> PathBuf {
    env::var_os("LOG_FILE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE))
}

/// Single non-rotating file; missing parent directories are created.
fn file_appender(path: &Path) -> Result<RollingFileAppender, InitError> {
    let (dir, file_name) = split_log_path(path);
    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(dir)
}

fn split_log_path(path: &Path) -> (PathBuf, String) {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "cropsheet.log".to_string());
    (dir, file_name)
}
