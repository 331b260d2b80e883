use std::path::Path;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::LoggingConfig;

/// Initialize structured logging based on configuration.
///
/// Supports both JSON (production) and pretty (interactive) formats with a
/// configurable level and optional file output. When a file sink is
/// configured, the returned guard must be kept alive for the process's
/// lifetime — dropping it stops the background flush thread and silently
/// truncates buffered log lines.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let log_level = parse_log_level(&config.level)?;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    let registry = tracing_subscriber::registry().with(env_filter);

    let (writer, guard) = match &config.file_path {
        Some(file_path) => {
            let (writer, guard) = file_writer(file_path)?;
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };

    if config.format.as_str() == "json" {
        let json_layer = fmt::layer()
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .with_current_span(true)
            .with_target(true)
            .with_line_number(true)
            .with_file(true);

        match writer {
            Some(writer) => registry.with(json_layer.with_writer(writer)).init(),
            None => registry.with(json_layer).init(),
        }
    } else {
        let pretty_layer = fmt::layer()
            .pretty()
            .with_span_events(FmtSpan::CLOSE)
            .with_target(true)
            .with_line_number(false)
            .with_file(false);

        match writer {
            Some(writer) => registry.with(pretty_layer.with_writer(writer)).init(),
            None => registry.with(pretty_layer).init(),
        }
    }

    Ok(guard)
}

fn file_writer(file_path: &str) -> anyhow::Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let path = Path::new(file_path);
    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("invalid log file path: {file_path}"))?;
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    Ok(tracing_appender::non_blocking(appender))
}

fn parse_log_level(level: &str) -> anyhow::Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(anyhow::anyhow!("invalid log level: {level}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_levels() {
        assert!(parse_log_level("trace").is_ok());
        assert!(parse_log_level("debug").is_ok());
        assert!(parse_log_level("info").is_ok());
        assert!(parse_log_level("warn").is_ok());
        assert!(parse_log_level("error").is_ok());
        assert!(parse_log_level("bogus").is_err());
    }

    #[test]
    fn file_writer_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("nested").join("watchcast.log");
        let (_writer, _guard) = file_writer(log_path.to_str().unwrap()).unwrap();
        assert!(log_path.parent().unwrap().is_dir());
    }
}
