use std::env;
use std::path::Path;

use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_LOG_FILE: &str = "./logs/alto-ids.log";

/// Installs the stdout layer and, unless `LOG_FILE_PATH` is set to an empty
/// string, a plain-text file layer. The returned guard flushes the file on drop.
pub fn init_logger() -> Option<WorkerGuard> {
    let filter = env::var("TRACING_LEVEL").unwrap_or_else(|_| "info".to_string());
    let filter_layer = EnvFilter::new(filter);

    let stdout_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .pretty()
        .with_file(false)
        .with_target(false)
        .without_time()
        .with_ansi(true);

    let log_file_path = env::var("LOG_FILE_PATH").unwrap_or_else(|_| DEFAULT_LOG_FILE.to_string());
    let (file_layer, guard) = if log_file_path.trim().is_empty() {
        (None, None)
    } else {
        let path = Path::new(&log_file_path);
        let directory = path.parent().unwrap_or_else(|| Path::new("."));
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "alto-ids.log".to_string());

        let file_appender = tracing_appender::rolling::never(directory, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        let layer = fmt::layer().with_writer(non_blocking).with_ansi(false);
        (Some(layer), Some(guard))
    };

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .with(filter_layer)
        .init();

    match &guard {
        Some(_) => info!("Logging to stdout and {}", log_file_path),
        None => info!("Logging to stdout"),
    }

    guard
}
