//! Classification provider abstraction.
//!
//! A provider turns one capture into a structured [`InferenceResult`]. The
//! HTTP clients only know how to complete a system/user prompt pair; the
//! trait's default [`ClassificationProvider::classify`] builds the prompt and
//! parses the JSON the model returns.

mod anthropic;
mod ollama;
mod resilience;
pub mod system_prompt;

pub use anthropic::AnthropicClient;
pub use ollama::OllamaClient;
pub use resilience::{ResilienceConfig, ResilientProvider};
pub use system_prompt::{DEFAULT_TRACKERS, build_classification_prompt, build_user_message};

use crate::config::{LlmConfig, LlmProvider};
use crate::models::{GeneratedItem, InferenceResult, ItemType, Priority, TaskCompletion, TrackerId};
use crate::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// A service that classifies captures.
#[async_trait]
pub trait ClassificationProvider: Send + Sync {
    /// The provider name.
    fn name(&self) -> &'static str;

    /// Completes a prompt with a system message.
    ///
    /// # Errors
    ///
    /// Returns `ProviderUnavailable` or `ProviderTimeout` if the call fails.
    async fn complete_with_system(&self, system: &str, user: &str) -> Result<String>;

    /// Classifies `text`, optionally with prior context.
    ///
    /// # Errors
    ///
    /// Returns `ProviderUnavailable` if the call fails or the response
    /// cannot be parsed, and `ProviderTimeout` if the call timed out.
    async fn classify(&self, text: &str, context: Option<&str>) -> Result<InferenceResult> {
        let system = build_classification_prompt(DEFAULT_TRACKERS);
        let user = build_user_message(text, context);
        let response = self
            .complete_with_system(&system, &user)
            .await
            .map_err(|e| into_provider_error(self.name(), e))?;
        parse_inference_result(&response).map_err(|e| into_provider_error(self.name(), e))
    }
}

#[async_trait]
impl<P: ClassificationProvider + ?Sized> ClassificationProvider for Arc<P> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn complete_with_system(&self, system: &str, user: &str) -> Result<String> {
        (**self).complete_with_system(system, user).await
    }

    async fn classify(&self, text: &str, context: Option<&str>) -> Result<InferenceResult> {
        (**self).classify(text, context).await
    }
}

/// HTTP client configuration for providers.
#[derive(Debug, Clone, Copy)]
pub struct LlmHttpConfig {
    /// Request timeout in milliseconds (0 to disable).
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds (0 to disable).
    pub connect_timeout_ms: u64,
}

impl Default for LlmHttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            connect_timeout_ms: 3_000,
        }
    }
}

impl LlmHttpConfig {
    /// Loads HTTP configuration from config settings.
    #[must_use]
    pub fn from_config(config: &LlmConfig) -> Self {
        let mut settings = Self::default();
        if let Some(timeout_ms) = config.timeout_ms {
            settings.timeout_ms = timeout_ms;
        }
        if let Some(connect_timeout_ms) = config.connect_timeout_ms {
            settings.connect_timeout_ms = connect_timeout_ms;
        }
        settings
    }
}

/// Builds an HTTP client for provider requests with configured timeouts.
#[must_use]
pub fn build_http_client(config: LlmHttpConfig) -> reqwest::Client {
    let mut builder = reqwest::Client::builder();
    if config.timeout_ms > 0 {
        builder = builder.timeout(Duration::from_millis(config.timeout_ms));
    }
    if config.connect_timeout_ms > 0 {
        builder = builder.connect_timeout(Duration::from_millis(config.connect_timeout_ms));
    }

    builder.build().unwrap_or_else(|err| {
        tracing::warn!("Failed to build LLM HTTP client: {err}");
        reqwest::Client::new()
    })
}

/// Builds the configured provider, wrapped with retries and a circuit breaker.
#[must_use]
pub fn provider_from_config(config: &LlmConfig) -> Arc<dyn ClassificationProvider> {
    let http = LlmHttpConfig::from_config(config);
    let resilience = ResilienceConfig::from_config(config);
    match config.provider {
        LlmProvider::Anthropic => {
            let mut client = AnthropicClient::new().with_http_config(http);
            if let Some(key) = &config.api_key {
                client = client.with_api_key(key.clone());
            }
            if let Some(url) = &config.base_url {
                client = client.with_endpoint(url);
            }
            if let Some(model) = &config.model {
                client = client.with_model(model);
            }
            Arc::new(ResilientProvider::new(client, resilience))
        },
        LlmProvider::Ollama => {
            let mut client = OllamaClient::new().with_http_config(http);
            if let Some(url) = &config.base_url {
                client = client.with_endpoint(url);
            }
            if let Some(model) = &config.model {
                client = client.with_model(model);
            }
            Arc::new(ResilientProvider::new(client, resilience))
        },
    }
}

/// Headroom on top of the retry budget in [`classification_deadline`].
pub const DEADLINE_SLACK_MS: u64 = 1_000;

/// Overall deadline for one classification, long enough for every retry.
///
/// Covers each attempt's request timeout plus the backoff between attempts.
/// Returns `None` when request timeouts are disabled.
#[must_use]
pub fn classification_deadline(config: &LlmConfig) -> Option<Duration> {
    let http = LlmHttpConfig::from_config(config);
    if http.timeout_ms == 0 {
        return None;
    }
    let resilience = ResilienceConfig::from_config(config);
    let retries = u64::from(resilience.max_retries);
    let budget = http
        .timeout_ms
        .saturating_mul(retries + 1)
        .saturating_add(resilience.retry_backoff_ms.saturating_mul(retries))
        .saturating_add(DEADLINE_SLACK_MS);
    Some(Duration::from_millis(budget))
}

/// Maps a transport error to the provider error taxonomy.
pub(crate) fn request_error(provider: &str, e: &reqwest::Error, timeout_ms: u64) -> Error {
    let error_kind = if e.is_timeout() {
        "timeout"
    } else if e.is_connect() {
        "connect"
    } else if e.is_request() {
        "request"
    } else {
        "unknown"
    };
    tracing::error!(
        provider = provider,
        error = %e,
        error_kind = error_kind,
        "Provider request failed"
    );
    if e.is_timeout() {
        Error::ProviderTimeout {
            provider: provider.to_string(),
            timeout_ms,
        }
    } else {
        Error::ProviderUnavailable {
            provider: provider.to_string(),
            cause: format!("{error_kind} error: {e}"),
        }
    }
}

/// Wraps any non-provider error as `ProviderUnavailable`.
fn into_provider_error(provider: &str, err: Error) -> Error {
    if err.is_provider_failure() {
        err
    } else {
        Error::ProviderUnavailable {
            provider: provider.to_string(),
            cause: err.to_string(),
        }
    }
}

/// Extracts JSON from a model response, handling markdown code blocks.
pub fn extract_json_from_response(response: &str) -> &str {
    let trimmed = response.trim();

    if let Some(start) = trimmed.find("```json") {
        let json_start = start + 7;
        if let Some(end) = trimmed[json_start..].find("```") {
            return trimmed[json_start..json_start + end].trim();
        }
    }

    // Fence without a language marker; skip to the first brace.
    if let Some(start) = trimmed.find("```") {
        let content_start = start + 3;
        let json_start = trimmed[content_start..]
            .find('{')
            .map_or(content_start, |pos| content_start + pos);
        if let Some(end) = trimmed[json_start..].find("```") {
            return trimmed[json_start..json_start + end].trim();
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            return &trimmed[start..=end];
        }
    }

    trimmed
}

/// Parses a classification response into an [`InferenceResult`].
///
/// Parsing is lenient about casing and synonyms (`urgent`, `task`) and
/// clamps confidences to `[0, 1]`. Items without content are dropped.
///
/// # Errors
///
/// Returns `OperationFailed` if the response holds no parseable JSON.
pub fn parse_inference_result(response: &str) -> Result<InferenceResult> {
    let json_str = extract_json_from_response(response);
    let wire: WireInference =
        serde_json::from_str(json_str).map_err(|e| Error::OperationFailed {
            operation: "parse_inference_result".to_string(),
            cause: format!("Invalid JSON: {e}"),
        })?;
    Ok(wire.into_result())
}

fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

/// Lowercases a tracker name and turns whitespace into `-`.
///
/// The result may still be invalid; check it with [`TrackerId::is_valid`].
#[must_use]
pub fn normalize_tracker(raw: &str) -> TrackerId {
    let name: String = raw
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_whitespace() { '-' } else { c })
        .collect();
    TrackerId::new(name)
}

/// Model output as it arrives on the wire.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireInference {
    #[serde(default)]
    primary_tracker: String,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    overall_reasoning: String,
    #[serde(default)]
    generated_items: Vec<WireItem>,
    #[serde(default)]
    task_completions: Vec<WireCompletion>,
    #[serde(default)]
    requires_review: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireItem {
    #[serde(default)]
    tracker: String,
    #[serde(default, alias = "type")]
    item_type: String,
    #[serde(default)]
    priority: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    time_sensitivity: Option<String>,
    #[serde(default)]
    estimated_effort: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCompletion {
    #[serde(default)]
    tracker: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    reasoning: String,
}

impl WireInference {
    fn into_result(self) -> InferenceResult {
        let primary_tracker = normalize_tracker(&self.primary_tracker);
        let generated_items = self
            .generated_items
            .into_iter()
            .filter(|item| !item.content.trim().is_empty())
            .map(|item| {
                let tracker = if item.tracker.trim().is_empty() {
                    primary_tracker.clone()
                } else {
                    normalize_tracker(&item.tracker)
                };
                GeneratedItem {
                    tracker,
                    item_type: ItemType::parse(&item.item_type).unwrap_or_default(),
                    priority: Priority::parse(&item.priority).unwrap_or_default(),
                    content: item.content.trim().to_string(),
                    reasoning: item.reasoning,
                    time_sensitivity: item.time_sensitivity,
                    estimated_effort: item.estimated_effort,
                    confidence: item.confidence.map(clamp_confidence),
                }
            })
            .collect();
        let task_completions = self
            .task_completions
            .into_iter()
            .filter(|c| !c.description.trim().is_empty())
            .map(|c| TaskCompletion {
                tracker: normalize_tracker(&c.tracker),
                description: c.description.trim().to_string(),
                reasoning: c.reasoning,
            })
            .collect();

        InferenceResult {
            primary_tracker,
            confidence: clamp_confidence(self.confidence),
            overall_reasoning: self.overall_reasoning,
            generated_items,
            task_completions,
            requires_review: self.requires_review,
        }
    }
}
