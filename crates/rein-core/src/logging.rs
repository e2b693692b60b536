//! Structured logging setup for the runtime.
//!
//! Centralized `tracing` configuration; library code only emits events and
//! never installs a subscriber on its own.

use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum level to display.
    pub level: LogLevel,
    /// Whether to include timestamps.
    pub with_timestamps: bool,
    /// Whether to emit JSON instead of human-readable lines.
    pub json_format: bool,
}

/// Log level selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    /// Most verbose.
    Trace,
    /// Developer diagnostics.
    Debug,
    /// Normal operation.
    Info,
    /// Recoverable problems.
    Warn,
    /// Failures only.
    Error,
}

impl LogLevel {
    fn as_tracing(self) -> Level {
        match self {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            with_timestamps: true,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the minimum level, builder style.
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Enable JSON output, builder style.
    pub fn with_json(mut self, json: bool) -> Self {
        self.json_format = json;
        self
    }
}

/// Install a global subscriber from `config`.
///
/// `REIN_LOG` overrides the configured level with an `EnvFilter` directive.
/// Returns an error if a subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_env("REIN_LOG")
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_tracing().to_string().to_lowercase()));

    let builder = fmt::Subscriber::builder().with_env_filter(filter);
    if config.json_format {
        if config.with_timestamps {
            builder.json().try_init()?;
        } else {
            builder.json().without_time().try_init()?;
        }
    } else if config.with_timestamps {
        builder.try_init()?;
    } else {
        builder.without_time().try_init()?;
    }
    Ok(())
}
