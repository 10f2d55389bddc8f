use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::Layered;
use tracing_subscriber::{fmt::time::UtcTime, prelude::*, EnvFilter, Layer, Registry};

use crate::config::{LogFormat, LoggingConfig};

type FilteredRegistry = Layered<EnvFilter, Registry>;
type BoxedLayer = Box<dyn Layer<FilteredRegistry> + Send + Sync>;

/// Install the global subscriber: stdout plus an optional rolling log file.
///
/// The level comes from `logging.level` if set, then `RUST_LOG`, then `info`. Keep the
/// returned guard alive for as long as file output should be flushed.
pub fn init_with_config(cfg: &LoggingConfig) -> Option<WorkerGuard> {
    let mut layers: Vec<BoxedLayer> = vec![console_layer(cfg.format)];
    let mut guard = None;

    if cfg.enable_file_logging {
        match file_writer(cfg) {
            Ok((writer, file_guard)) => {
                layers.push(file_layer(cfg.format, writer));
                guard = Some(file_guard);
            }
            Err(err) => eprintln!(
                "Failed to create log directory '{}' ({err}), continuing with stdout logs",
                cfg.dir
            ),
        }
    }

    let _ = tracing_subscriber::registry()
        .with(env_filter(cfg))
        .with(layers)
        .try_init();
    guard
}

fn env_filter(cfg: &LoggingConfig) -> EnvFilter {
    match &cfg.level {
        Some(level) => EnvFilter::new(level.as_str()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    }
}

fn console_layer(format: LogFormat) -> BoxedLayer {
    let layer = tracing_subscriber::fmt::layer()
        .with_timer(UtcTime::rfc_3339())
        .with_writer(std::io::stdout);
    match format {
        LogFormat::Json => layer.json().with_ansi(false).boxed(),
        LogFormat::Text => layer.with_ansi(true).boxed(),
    }
}

fn file_layer(format: LogFormat, writer: NonBlocking) -> BoxedLayer {
    let layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_timer(UtcTime::rfc_3339())
        .with_writer(writer);
    match format {
        LogFormat::Json => layer.json().boxed(),
        LogFormat::Text => layer.boxed(),
    }
}

fn file_writer(cfg: &LoggingConfig) -> std::io::Result<(NonBlocking, WorkerGuard)> {
    std::fs::create_dir_all(&cfg.dir)?;
    let appender = RollingFileAppender::new(rotation(&cfg.rotation), &cfg.dir, &cfg.filename);
    Ok(tracing_appender::non_blocking(appender))
}

/// Unknown values fall back to daily rotation.
fn rotation(name: &str) -> Rotation {
    match name.trim().to_lowercase().as_str() {
        "hourly" => Rotation::HOURLY,
        "never" => Rotation::NEVER,
        _ => Rotation::DAILY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn rotation_names() {
        assert_eq!(rotation("Hourly"), Rotation::HOURLY);
        assert_eq!(rotation("never"), Rotation::NEVER);
        assert_eq!(rotation("weekly"), Rotation::DAILY);
    }

    #[test]
    fn configured_level_wins() {
        let cfg = LoggingConfig {
            level: Some(LogLevel::Debug),
            ..LoggingConfig::default()
        };
        assert_eq!(env_filter(&cfg).to_string(), "debug");
    }

    #[test]
    fn file_writer_creates_log_dir() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("nested/logs");
        let cfg = LoggingConfig {
            dir: dir.to_string_lossy().into_owned(),
            enable_file_logging: true,
            ..LoggingConfig::default()
        };
        let (_writer, _guard) = file_writer(&cfg).unwrap();
        assert!(dir.is_dir());
    }
}
