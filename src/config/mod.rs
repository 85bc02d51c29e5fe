//! Configuration management.
//!
//! Configuration is read once at startup from TOML, then environment
//! overrides (`SORTBOX_*`) are applied on top. After that it is read-only.

mod review;

pub use review::{ACTION_BYPASS_CONFIDENCE, ReviewConfig};

use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration for sortbox.
#[derive(Debug, Clone)]
pub struct SortboxConfig {
    /// Directory for queue snapshots and logs.
    pub data_dir: PathBuf,
    /// Review thresholds and display options.
    pub review: ReviewConfig,
    /// Classification provider configuration.
    pub llm: LlmConfig,
    /// Tracker file location.
    pub trackers: TrackerConfig,
    /// Logging settings.
    pub logging: LoggingSettings,
}

/// LLM provider configuration.
#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    /// Provider to use.
    pub provider: LlmProvider,
    /// Model name.
    pub model: Option<String>,
    /// API key. Falls back to the provider's environment variable.
    pub api_key: Option<SecretString>,
    /// Base URL for the provider (for self-hosted).
    pub base_url: Option<String>,
    /// Timeout for one provider request in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Connect timeout in milliseconds.
    pub connect_timeout_ms: Option<u64>,
    /// Maximum retries for timed-out calls.
    pub max_retries: Option<u32>,
    /// Backoff between retries in milliseconds.
    pub retry_backoff_ms: Option<u64>,
    /// Consecutive failures before the circuit opens.
    pub breaker_failure_threshold: Option<u32>,
    /// How long the circuit stays open in milliseconds.
    pub breaker_reset_ms: Option<u64>,
}

/// Available LLM providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LlmProvider {
    /// Anthropic Claude.
    #[default]
    Anthropic,
    /// Ollama (local).
    Ollama,
}

impl LlmProvider {
    /// Parses a provider string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "ollama" => Self::Ollama,
            _ => Self::Anthropic,
        }
    }

    /// Returns the provider as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::Ollama => "ollama",
        }
    }
}

/// Where tracker files live.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Directory containing one file per tracker.
    pub directory: PathBuf,
    /// File extension for tracker files, without the dot.
    pub extension: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("trackers"),
            extension: "md".to_string(),
        }
    }
}

/// Logging settings from the config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingSettings {
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// `tracing` filter directive, e.g. `sortbox=debug`.
    pub filter: Option<String>,
    /// Optional log file path.
    pub file: Option<PathBuf>,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Data directory.
    pub data_dir: Option<String>,
    /// Review section.
    pub review: Option<ConfigFileReview>,
    /// LLM section.
    pub llm: Option<ConfigFileLlm>,
    /// Trackers section.
    pub trackers: Option<ConfigFileTrackers>,
    /// Logging section.
    pub logging: Option<LoggingSettings>,
}

/// Review section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileReview {
    /// Pending/flagged boundary.
    pub auto_review_threshold: Option<f64>,
    /// Bypass cutoff for non-action items.
    pub require_review_threshold: Option<f64>,
    /// Items shown per review page.
    pub default_batch_size: Option<usize>,
    /// Colourize CLI output.
    pub color_output: Option<bool>,
    /// Show confidence in review entries.
    pub show_confidence_scores: Option<bool>,
    /// Queue capacity.
    pub max_queue_size: Option<usize>,
}

/// LLM section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileLlm {
    /// Provider name.
    pub provider: Option<String>,
    /// Model name.
    pub model: Option<String>,
    /// API key.
    pub api_key: Option<String>,
    /// Base URL.
    pub base_url: Option<String>,
    /// Call deadline.
    pub timeout_ms: Option<u64>,
    /// Connect timeout.
    pub connect_timeout_ms: Option<u64>,
    /// Retry count.
    pub max_retries: Option<u32>,
    /// Retry backoff.
    pub retry_backoff_ms: Option<u64>,
    /// Breaker threshold.
    pub breaker_failure_threshold: Option<u32>,
    /// Breaker reset.
    pub breaker_reset_ms: Option<u64>,
}

/// Trackers section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileTrackers {
    /// Tracker directory.
    pub directory: Option<String>,
    /// Tracker file extension.
    pub extension: Option<String>,
}

impl Default for SortboxConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".sortbox"),
            review: ReviewConfig::default(),
            llm: LlmConfig::default(),
            trackers: TrackerConfig::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl SortboxConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML for this schema.
    pub fn from_toml_str(contents: &str) -> crate::Result<Self> {
        let file: ConfigFile =
            toml::from_str(contents).map_err(|e| crate::Error::OperationFailed {
                operation: "parse_config_file".to_string(),
                cause: e.to_string(),
            })?;
        Ok(Self::from_config_file(file))
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> crate::Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| crate::Error::OperationFailed {
                operation: "read_config_file".to_string(),
                cause: format!("{}: {e}", path.display()),
            })?;
        Self::from_toml_str(&contents)
    }

    /// Loads configuration from the default location.
    ///
    /// Checks the following paths in order:
    /// 1. Platform-specific config dir (`~/Library/Application Support/sortbox/` on macOS)
    /// 2. XDG config dir (`~/.config/sortbox/`)
    ///
    /// Returns default configuration if no config file is found.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default();
        };

        let platform_config = base_dirs.config_dir().join("sortbox").join("config.toml");
        if platform_config.exists() {
            match Self::load_from_file(&platform_config) {
                Ok(config) => return config,
                Err(e) => tracing::warn!(path = %platform_config.display(), error = %e, "Ignoring unreadable config file"),
            }
        }

        let xdg_config = base_dirs
            .home_dir()
            .join(".config")
            .join("sortbox")
            .join("config.toml");
        if xdg_config.exists() {
            match Self::load_from_file(&xdg_config) {
                Ok(config) => return config,
                Err(e) => tracing::warn!(path = %xdg_config.display(), error = %e, "Ignoring unreadable config file"),
            }
        }

        Self::default()
    }

    /// Converts a `ConfigFile` to `SortboxConfig`.
    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(data_dir) = file.data_dir {
            config.data_dir = PathBuf::from(data_dir);
        }
        if let Some(review) = file.review {
            config.review = config.review.merge(&review);
        }
        if let Some(llm) = file.llm {
            if let Some(provider) = llm.provider {
                config.llm.provider = LlmProvider::parse(&provider);
            }
            config.llm.model = llm.model;
            config.llm.api_key = llm.api_key.map(SecretString::from);
            config.llm.base_url = llm.base_url;
            config.llm.timeout_ms = llm.timeout_ms;
            config.llm.connect_timeout_ms = llm.connect_timeout_ms;
            config.llm.max_retries = llm.max_retries;
            config.llm.retry_backoff_ms = llm.retry_backoff_ms;
            config.llm.breaker_failure_threshold = llm.breaker_failure_threshold;
            config.llm.breaker_reset_ms = llm.breaker_reset_ms;
        }
        if let Some(trackers) = file.trackers {
            if let Some(directory) = trackers.directory {
                config.trackers.directory = PathBuf::from(directory);
            }
            if let Some(extension) = trackers.extension {
                config.trackers.extension = extension.trim_start_matches('.').to_string();
            }
        }
        if let Some(logging) = file.logging {
            config.logging = logging;
        }

        config
    }

    /// Applies environment variable overrides.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary key lookup.
    #[must_use]
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("SORTBOX_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("SORTBOX_TRACKER_DIR") {
            self.trackers.directory = PathBuf::from(v);
        }
        if let Some(v) = lookup("SORTBOX_LLM_PROVIDER") {
            self.llm.provider = LlmProvider::parse(&v);
        }
        if let Some(v) = lookup("SORTBOX_LLM_MODEL") {
            self.llm.model = Some(v);
        }
        if let Some(v) = lookup("SORTBOX_LLM_BASE_URL") {
            self.llm.base_url = Some(v);
        }
        if let Some(parsed) = lookup("SORTBOX_LLM_TIMEOUT_MS").and_then(|v| v.parse::<u64>().ok()) {
            self.llm.timeout_ms = Some(parsed);
        }
        if let Some(parsed) = lookup("SORTBOX_LLM_MAX_RETRIES").and_then(|v| v.parse::<u32>().ok()) {
            self.llm.max_retries = Some(parsed);
        }
        if let Some(parsed) =
            lookup("SORTBOX_AUTO_REVIEW_THRESHOLD").and_then(|v| v.parse::<f64>().ok())
        {
            self.review.auto_review_threshold = parsed.clamp(0.0, 1.0);
        }
        if let Some(parsed) =
            lookup("SORTBOX_REQUIRE_REVIEW_THRESHOLD").and_then(|v| v.parse::<f64>().ok())
        {
            self.review.require_review_threshold = parsed.clamp(0.0, 1.0);
        }
        if let Some(v) = lookup("SORTBOX_LOG_FORMAT") {
            self.logging.format = Some(v);
        }
        if lookup("NO_COLOR").is_some_and(|v| !v.is_empty()) {
            self.review.color_output = false;
        }
        self
    }

    /// Sets the data directory.
    #[must_use]
    pub fn with_data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_dir = path.into();
        self
    }

    /// Sets the tracker directory.
    #[must_use]
    pub fn with_tracker_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.trackers.directory = path.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = SortboxConfig::default();
        assert!((config.review.require_review_threshold - 0.7).abs() < f64::EPSILON);
        assert!((config.review.auto_review_threshold - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.review.default_batch_size, 10);
        assert_eq!(config.llm.provider, LlmProvider::Anthropic);
        assert_eq!(config.trackers.extension, "md");
    }

    #[test]
    fn test_from_toml() {
        let toml = r#"
            data_dir = "/tmp/sortbox"

            [review]
            require_review_threshold = 0.65
            default_batch_size = 5
            color_output = false

            [llm]
            provider = "ollama"
            model = "llama3.2"
            timeout_ms = 4000

            [trackers]
            directory = "/home/me/notes"
            extension = ".txt"

            [logging]
            format = "json"
        "#;

        let config = SortboxConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/sortbox"));
        assert!((config.review.require_review_threshold - 0.65).abs() < f64::EPSILON);
        assert_eq!(config.review.default_batch_size, 5);
        assert!(!config.review.color_output);
        assert!(config.review.show_confidence_scores);
        assert_eq!(config.llm.provider, LlmProvider::Ollama);
        assert_eq!(config.llm.timeout_ms, Some(4000));
        assert_eq!(config.trackers.directory, PathBuf::from("/home/me/notes"));
        assert_eq!(config.trackers.extension, "txt");
        assert_eq!(config.logging.format.as_deref(), Some("json"));
    }

    #[test]
    fn test_invalid_toml() {
        let result = SortboxConfig::from_toml_str("[review\nbroken");
        assert!(matches!(result, Err(crate::Error::OperationFailed { .. })));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("SORTBOX_REQUIRE_REVIEW_THRESHOLD", "1.7"),
            ("SORTBOX_LLM_PROVIDER", "ollama"),
            ("SORTBOX_LLM_TIMEOUT_MS", "not-a-number"),
            ("NO_COLOR", "1"),
        ]);
        let config = SortboxConfig::default()
            .with_overrides_from(|key| env.get(key).map(ToString::to_string));

        assert!((config.review.require_review_threshold - 1.0).abs() < f64::EPSILON);
        assert_eq!(config.llm.provider, LlmProvider::Ollama);
        assert_eq!(config.llm.timeout_ms, None);
        assert!(!config.review.color_output);
    }
}
