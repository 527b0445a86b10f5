//! Logging setup using `tracing` and `tracing-subscriber`.
//!
//! Logs go to stderr so they never mix with report output. `RUST_LOG`
//! overrides the configured level when set.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line human-readable output
    #[default]
    Pretty,
    /// Single-line output
    Compact,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level_filter: LevelFilter,
    pub format: LogFormat,
    pub with_ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level_filter: LevelFilter::INFO,
            format: LogFormat::default(),
            with_ansi: true,
        }
    }
}

impl LogConfig {
    pub fn with_level_filter(mut self, level_filter: LevelFilter) -> Self {
        self.level_filter = level_filter;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_ansi(mut self, enable: bool) -> Self {
        self.with_ansi = enable;
        self
    }
}

/// Installs the global subscriber.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(build_env_filter(config.level_filter))
        .with_writer(std::io::stderr)
        .with_ansi(config.with_ansi)
        .with_target(false);

    match config.format {
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
    }
}

fn build_env_filter(level_filter: LevelFilter) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(level_filter))
}

/// Dependencies stay at warn unless everything is switched off.
fn default_filter(level_filter: LevelFilter) -> EnvFilter {
    let level = level_filter.to_string().to_lowercase();
    let base = if level_filter == LevelFilter::OFF { "off" } else { "warn" };
    EnvFilter::new(format!("{base},dataverse_attribute_exporter={level}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = LogConfig::default()
            .with_level_filter(LevelFilter::DEBUG)
            .with_format(LogFormat::Compact)
            .with_ansi(false);
        assert_eq!(config.level_filter, LevelFilter::DEBUG);
        assert_eq!(config.format, LogFormat::Compact);
        assert!(!config.with_ansi);
    }

    #[test]
    fn test_default_filter_targets_this_crate() {
        let filter = default_filter(LevelFilter::DEBUG).to_string().to_lowercase();
        assert!(filter.contains("dataverse_attribute_exporter=debug"), "{filter}");

        let filter = default_filter(LevelFilter::OFF).to_string().to_lowercase();
        assert!(filter.contains("dataverse_attribute_exporter=off"), "{filter}");
    }
}
