//! Tracing subscriber setup

use std::path::Path;
use std::time::{Duration, SystemTime};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

use crate::config::schema::LoggingConfig;

const LOG_FILE_PREFIX: &str = "chatq.log";

/// Build the level filter from `RUST_LOG` or the config, plus module overrides
fn build_filter(config: &LoggingConfig) -> EnvFilter {
    let mut filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    for (module, level) in &config.overrides {
        match format!("{}={}", module, level).parse() {
            Ok(directive) => filter = filter.add_directive(directive),
            Err(_) => eprintln!("Invalid log directive: {}={}", module, level),
        }
    }
    filter
}

fn wants_json(config: &LoggingConfig) -> bool {
    std::env::var("LOG_FORMAT")
        .unwrap_or_else(|_| config.format.clone())
        .eq_ignore_ascii_case("json")
}

/// Initialize the logging system
///
/// Logs go to stdout and, when `config.dir` is set, to a daily rolling file.
/// The returned guard must be held for the file writer to keep flushing.
pub fn init_logging(config: &LoggingConfig) -> crate::Result<Option<WorkerGuard>> {
    let filter = build_filter(config);
    let is_json = wants_json(config);

    let stdout_layer = if is_json {
        fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .boxed()
    } else {
        fmt::layer().with_target(true).with_thread_ids(true).boxed()
    };

    let (file_layer, guard) = match &config.dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = if is_json {
                fmt::layer()
                    .json()
                    .with_writer(non_blocking)
                    .with_ansi(false)
                    .boxed()
            } else {
                fmt::layer()
                    .with_writer(non_blocking)
                    .with_ansi(false)
                    .boxed()
            };
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    Registry::default()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| crate::Error::Config(format!("logging already initialized: {}", e)))?;

    if let Some(dir) = &config.dir {
        if let Err(e) = cleanup_old_logs(Path::new(dir), config.retention_days) {
            tracing::warn!("Failed to clean up old logs: {}", e);
        }
    }

    Ok(guard)
}

/// Remove rolled log files older than `days` days
fn cleanup_old_logs(dir: &Path, days: u64) -> std::io::Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let now = SystemTime::now();
    let threshold = Duration::from_secs(days * 24 * 3600);
    let mut removed = 0;

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_log = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| name.starts_with(LOG_FILE_PREFIX));
        if !path.is_file() || !is_log {
            continue;
        }

        let age = entry
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok());
        if age.is_some_and(|age| age > threshold) {
            std::fs::remove_file(&path)?;
            removed += 1;
        }
    }
    Ok(removed)
}
