//! Tracing/logging initialization.
//!
//! `RUST_LOG` wins over the configured filter when it is set.

use sparks_core::Properties;
use sparks_core::properties::{LOG_FILTER_PROPERTY, LOG_FORMAT_PROPERTY};
use tracing_subscriber::EnvFilter;

/// Output format of the fmt subscriber.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event, with timestamps.
    #[default]
    Json,
    /// Single-line human-readable output.
    Compact,
}

impl LogFormat {
    /// Parse `json` or `compact` (case-insensitive).
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "compact" => Some(Self::Compact),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Filter directives used when `RUST_LOG` is unset.
    pub filter: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            format: LogFormat::Json,
        }
    }
}

impl LoggingConfig {
    /// Read `logFormat` and `logFilter` from application properties.
    pub fn from_properties(properties: &Properties) -> Self {
        let defaults = Self::default();
        Self {
            filter: properties
                .get(LOG_FILTER_PROPERTY)
                .map(str::to_string)
                .unwrap_or(defaults.filter),
            format: properties
                .get(LOG_FORMAT_PROPERTY)
                .and_then(LogFormat::parse)
                .unwrap_or(defaults.format),
        }
    }
}

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let _ = match config.format {
        LogFormat::Json => builder
            .json()
            .with_timer(tracing_subscriber::fmt::time::SystemTime)
            .try_init(),
        LogFormat::Compact => builder.compact().try_init(),
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_format_and_filter_from_properties() {
        let properties = Properties::new()
            .with(LOG_FORMAT_PROPERTY, "Compact")
            .with(LOG_FILTER_PROPERTY, "sparks_infra=debug");
        let config = LoggingConfig::from_properties(&properties);
        assert_eq!(config.format, LogFormat::Compact);
        assert_eq!(config.filter, "sparks_infra=debug");
    }

    #[test]
    fn unknown_format_falls_back_to_json() {
        let properties = Properties::new().with(LOG_FORMAT_PROPERTY, "xml");
        assert_eq!(LoggingConfig::from_properties(&properties), LoggingConfig::default());
    }

    #[test]
    fn init_is_idempotent() {
        init(&LoggingConfig::default());
        init(&LoggingConfig {
            filter: "debug".to_string(),
            format: LogFormat::Compact,
        });
    }
}
