use std::sync::Once;

use tracing::Level;
use tracing_subscriber::{filter::LevelFilter, fmt::format::FmtSpan, EnvFilter};

use crate::{
    config::ServiceConfig,
    error::{Result, ServiceError},
};

static INIT: Once = Once::new();

/// Logging configuration options
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default level when `RUST_LOG` does not say otherwise
    pub level: Level,
    /// Whether to include source file and line
    pub source_location: bool,
    /// Whether to log span open/close events
    pub log_spans: bool,
    /// Whether to include the thread name (the generation worker has its own)
    pub thread_names: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            source_location: false,
            log_spans: false,
            thread_names: true,
        }
    }
}

impl LogConfig {
    /// Logging for the chat service; development mode adds source locations
    pub fn for_service(config: &ServiceConfig) -> Self {
        Self {
            level: config.monitoring.log_level.into(),
            source_location: config.server.development,
            ..Self::default()
        }
    }
}

/// Install the global subscriber. Later calls are no-ops.
pub fn setup_logging(config: LogConfig) -> Result<()> {
    let mut result = Ok(());

    INIT.call_once(|| {
        result = init_subscriber(&config);
    });

    result
}

fn init_subscriber(config: &LogConfig) -> Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(config.level).into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(config.thread_names)
        .with_file(config.source_location)
        .with_line_number(config.source_location)
        .with_span_events(if config.log_spans {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        })
        .try_init()
        .map_err(|e| ServiceError::InitializationError {
            message: "Failed to set global subscriber".to_string(),
            source: Some(e),
        })
}
