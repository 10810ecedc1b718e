//! Shared logging configuration and initialization.

use std::env;

use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::PipelineConfig;
use crate::pipeline::RunReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            include_target: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoggingInitError {
    #[error("logging already initialized: {0}")]
    AlreadyInitialized(#[from] tracing::subscriber::SetGlobalDefaultError),
}

pub fn logging_config_from_env() -> LoggingConfig {
    let mut config = LoggingConfig::default();

    if let Ok(level) = env::var("POLLING_FEATURES_LOG_LEVEL") {
        let trimmed = level.trim();
        if !trimmed.is_empty() {
            config.level = trimmed.to_string();
        }
    }

    if let Ok(format) = env::var("POLLING_FEATURES_LOG_FORMAT") {
        if let Some(parsed) = parse_log_format(&format) {
            config.format = parsed;
        }
    }

    if let Ok(include_target) = env::var("POLLING_FEATURES_LOG_TARGET") {
        if let Some(parsed) = parse_bool(&include_target) {
            config.include_target = parsed;
        }
    }

    config
}

pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingInitError> {
    let env_filter =
        EnvFilter::try_new(config.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(config.include_target)
        .with_writer(std::io::stderr)
        .with_ansi(matches!(config.format, LogFormat::Pretty));

    match config.format {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
        LogFormat::Pretty => tracing::subscriber::set_global_default(builder.pretty().finish())?,
    }

    Ok(())
}

pub fn log_app_start(logging: &LoggingConfig, pipeline: &PipelineConfig) {
    info!(
        component = "polling_features",
        event = "app.start",
        log_level = %logging.level,
        log_format = ?logging.format,
        include_target = logging.include_target,
        orders_path = %pipeline.orders_path().display(),
        polling_path = %pipeline.polling_path().display(),
        output_dir = %pipeline.output_dir.display(),
        window_join = pipeline.features.window_join.as_str(),
        layout = pipeline.features.layout.as_str()
    );
}

pub fn log_app_finish(report: &RunReport) {
    info!(
        component = "polling_features",
        event = "app.finish",
        orders = report.orders,
        joined_events = report.joined_events,
        feature_rows = report.feature_rows,
        feature_columns = report.feature_columns,
        schema_fingerprint = %report.schema_fingerprint
    );
}

fn parse_log_format(raw: &str) -> Option<LogFormat> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "json" => Some(LogFormat::Json),
        "pretty" => Some(LogFormat::Pretty),
        _ => None,
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
