//! Logging configuration.

use crate::config::LoggingSettings;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Default filter when neither config nor environment sets one.
const DEFAULT_FILTER: &str = "sortbox=info";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Parses a format name; anything but `json` is pretty.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Pretty
        }
    }
}

/// Resolved logging configuration.
#[derive(Debug)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// Event filter.
    pub filter: EnvFilter,
    /// Optional file to append logs to instead of stderr.
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    /// Builds logging config from settings with env overrides.
    ///
    /// Filter precedence: `SORTBOX_LOG`, `RUST_LOG`, the config file, then
    /// `sortbox=debug` if `verbose` else `sortbox=info`.
    #[must_use]
    pub fn from_settings(settings: &LoggingSettings, verbose: bool) -> Self {
        Self::from_lookup(settings, verbose, |key| std::env::var(key).ok())
    }

    fn from_lookup(
        settings: &LoggingSettings,
        verbose: bool,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let format = lookup("SORTBOX_LOG_FORMAT")
            .or_else(|| settings.format.clone())
            .map_or(LogFormat::Pretty, |f| LogFormat::parse(&f));

        let directive = lookup("SORTBOX_LOG")
            .or_else(|| lookup("RUST_LOG"))
            .or_else(|| settings.filter.clone())
            .unwrap_or_else(|| {
                if verbose {
                    "sortbox=debug".to_string()
                } else {
                    DEFAULT_FILTER.to_string()
                }
            });
        let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        let file = lookup("SORTBOX_LOG_FILE")
            .map(PathBuf::from)
            .or_else(|| settings.file.clone());

        Self {
            format,
            filter,
            file,
        }
    }
}
