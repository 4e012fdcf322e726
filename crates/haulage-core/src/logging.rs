//! Tracing subscriber setup.
//!
//! Logs go to stderr so stdout stays reserved for JSON run reports.
//! `RUST_LOG`, when set, takes precedence over `HAULAGE_LOG_LEVEL`.
//!
//! ```no_run
//! use haulage_core::logging::{init_logging, LogConfig};
//!
//! let config = LogConfig::from_env().unwrap_or_default();
//! init_logging(&config).ok();
//! tracing::info!(pipeline = "shiphero_pipeline", "starting");
//! ```

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_LEVEL_ENV: &str = "HAULAGE_LOG_LEVEL";
pub const LOG_FORMAT_ENV: &str = "HAULAGE_LOG_FORMAT";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log level '{0}'")]
    InvalidLevel(String),
    #[error("invalid log format '{0}', expected text or json")]
    InvalidFormat(String),
    #[error("invalid filter directive: {0}")]
    InvalidFilter(String),
    #[error("global subscriber already installed: {0}")]
    AlreadyInitialized(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub const fn to_tracing_level(self) -> Level {
        match self {
            Self::Trace => Level::TRACE,
            Self::Debug => Level::DEBUG,
            Self::Info => Level::INFO,
            Self::Warn => Level::WARN,
            Self::Error => Level::ERROR,
        }
    }
}

impl FromStr for LogLevel {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(LoggingError::InvalidLevel(s.to_owned())),
        }
    }
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(LoggingError::InvalidFormat(s.to_owned())),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: LogFormat,
}

impl LogConfig {
    pub fn from_env() -> Result<Self, LoggingError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, LoggingError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(level) = lookup(LOG_LEVEL_ENV) {
            config.level = level.parse()?;
        }
        if let Some(format) = lookup(LOG_FORMAT_ENV) {
            config.format = format.parse()?;
        }
        Ok(config)
    }

    fn env_filter(&self) -> Result<EnvFilter, LoggingError> {
        match std::env::var(EnvFilter::DEFAULT_ENV) {
            Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(directives)
                .map_err(|error| LoggingError::InvalidFilter(error.to_string())),
            _ => Ok(EnvFilter::default().add_directive(self.level.to_tracing_level().into())),
        }
    }
}

/// Install the global subscriber. Call once at startup.
pub fn init_logging(config: &LogConfig) -> Result<(), LoggingError> {
    let filter = config.env_filter()?;
    let layer = fmt::layer().with_writer(std::io::stderr).with_target(true);

    let result = match config.format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(layer)
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(layer.json())
            .try_init(),
    };
    result.map_err(|error| LoggingError::AlreadyInitialized(error.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_level_and_format() {
        let config = LogConfig::from_lookup(|name| match name {
            LOG_LEVEL_ENV => Some(String::from("DEBUG")),
            LOG_FORMAT_ENV => Some(String::from("json")),
            _ => None,
        })
        .expect("config");

        assert_eq!(config.level, LogLevel::Debug);
        assert_eq!(config.format, LogFormat::Json);
    }

    #[test]
    fn rejects_unknown_format() {
        let error = LogConfig::from_lookup(|name| {
            (name == LOG_FORMAT_ENV).then(|| String::from("xml"))
        })
        .expect_err("invalid");
        assert!(matches!(error, LoggingError::InvalidFormat(_)));
    }

    #[test]
    fn defaults_to_info_text() {
        let config = LogConfig::from_lookup(|_| None).expect("config");
        assert_eq!(config.level, LogLevel::Info);
        assert_eq!(config.format, LogFormat::Text);
        assert_eq!(config.level.to_string(), "info");
    }
}
