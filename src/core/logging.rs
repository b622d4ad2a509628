//! Structured logging setup for the memory bank engine
//!
//! Console logging with colors, optional rolling file logging under
//! `.cortex/logs/`, and an optional JSON layer for downstream analytics —
//! mirrors the console+file+json layering used throughout the corpus this
//! engine is grounded on.

use is_terminal::IsTerminal;
use std::fs;
use std::path::PathBuf;
use std::sync::Once;
use tracing::{Level, Span};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::core::error::{BankError, Result};

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub console_level: Level,
    pub file_level: Level,
    pub json_level: Level,
    pub log_dir: PathBuf,
    pub console_colors: bool,
    pub file_logging: bool,
    pub json_logging: bool,
    pub rotation: LogRotation,
    pub max_files: usize,
}

#[derive(Debug, Clone, Copy)]
pub enum LogRotation {
    Daily,
    Hourly,
    Never,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            console_level: Level::INFO,
            file_level: Level::DEBUG,
            json_level: Level::WARN,
            log_dir: PathBuf::from(".cortex/logs"),
            console_colors: true,
            file_logging: true,
            json_logging: false,
            rotation: LogRotation::Daily,
            max_files: 10,
        }
    }
}

static LOGGING_INITIALIZED: Once = Once::new();

/// Initialize logging; safe to call more than once, only the first call wins.
pub fn initialize_logging(config: LoggingConfig) -> Result<()> {
    LOGGING_INITIALIZED.call_once(|| {
        if let Err(e) = setup_logging_internal(config) {
            eprintln!("failed to initialize logging: {e}");
        }
    });
    Ok(())
}

pub fn initialize_default_logging() -> Result<()> {
    initialize_logging(LoggingConfig::default())
}

fn setup_logging_internal(config: LoggingConfig) -> Result<()> {
    if config.file_logging || config.json_logging {
        fs::create_dir_all(&config.log_dir)
            .map_err(|e| BankError::internal("logging", e.to_string()))?;
    }

    let env_filter = EnvFilter::builder()
        .with_default_directive(config.console_level.into())
        .from_env_lossy();

    let registry = tracing_subscriber::registry().with(env_filter);

    let console_layer = fmt::layer()
        .with_ansi(config.console_colors && std::io::stdout().is_terminal())
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stdout)
        .with_filter(tracing_subscriber::filter::LevelFilter::from_level(
            config.console_level,
        ));

    let mut layers = vec![Box::new(console_layer) as Box<dyn Layer<_> + Send + Sync>];

    if config.file_logging {
        let rotation = match config.rotation {
            LogRotation::Daily => Rotation::DAILY,
            LogRotation::Hourly => Rotation::HOURLY,
            LogRotation::Never => Rotation::NEVER,
        };
        let file_appender = RollingFileAppender::new(rotation, &config.log_dir, "bank.log");
        let file_layer = fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .with_span_events(FmtSpan::FULL)
            .with_writer(file_appender)
            .with_filter(tracing_subscriber::filter::LevelFilter::from_level(
                config.file_level,
            ));
        layers.push(Box::new(file_layer));
    }

    if config.json_logging {
        let json_appender =
            RollingFileAppender::new(Rotation::DAILY, &config.log_dir, "bank-events.jsonl");
        let json_layer = fmt::layer()
            .json()
            .with_current_span(true)
            .with_writer(json_appender)
            .with_filter(tracing_subscriber::filter::LevelFilter::from_level(
                config.json_level,
            ));
        layers.push(Box::new(json_layer));
    }

    registry
        .with(layers)
        .try_init()
        .map_err(|e| BankError::internal("logging", format!("failed to init tracing: {e}")))?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        log_dir = %config.log_dir.display(),
        "memory bank logging initialized"
    );

    Ok(())
}

/// Simple elapsed-time timer tied to a tracing span, for timing engine operations.
pub struct PerfTimer {
    name: String,
    start: std::time::Instant,
    span: Span,
}

impl PerfTimer {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let span = tracing::info_span!("perf_timer", operation = %name);
        Self {
            name,
            start: std::time::Instant::now(),
            span,
        }
    }

    pub fn checkpoint(&self, label: &str) {
        let elapsed = self.start.elapsed();
        tracing::debug!(
            parent: &self.span,
            operation = %self.name,
            checkpoint = label,
            elapsed_ms = elapsed.as_millis() as f64,
            "checkpoint"
        );
    }

    pub fn finish(self) {
        let elapsed = self.start.elapsed();
        tracing::info!(
            parent: &self.span,
            operation = %self.name,
            elapsed_ms = elapsed.as_millis() as f64,
            "operation timing"
        );
    }
}

pub fn is_initialized() -> bool {
    LOGGING_INITIALIZED.is_completed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_has_sane_levels() {
        let config = LoggingConfig::default();
        assert_eq!(config.console_level, Level::INFO);
        assert!(config.file_logging);
    }

    #[test]
    fn perf_timer_records_checkpoints_without_panicking() {
        let timer = PerfTimer::new("test-op");
        timer.checkpoint("midpoint");
        timer.finish();
    }

    #[test]
    fn log_dir_can_be_overridden() {
        let temp_dir = TempDir::new().unwrap();
        let config = LoggingConfig {
            log_dir: temp_dir.path().to_path_buf(),
            ..LoggingConfig::default()
        };
        assert_eq!(config.log_dir, temp_dir.path());
    }
}
