//! Anthropic Claude client.

use super::{ClassificationProvider, LlmHttpConfig, build_http_client, request_error};
use crate::{Error, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

const PROVIDER: &str = "anthropic";

/// Anthropic Claude client.
pub struct AnthropicClient {
    api_key: Option<SecretString>,
    endpoint: String,
    model: String,
    max_tokens: u32,
    http: LlmHttpConfig,
    client: reqwest::Client,
}

impl AnthropicClient {
    /// Default API endpoint.
    pub const DEFAULT_ENDPOINT: &'static str = "https://api.anthropic.com/v1";

    /// Default model.
    pub const DEFAULT_MODEL: &'static str = "claude-3-5-haiku-latest";

    /// Creates a client reading `ANTHROPIC_API_KEY` from the environment.
    #[must_use]
    pub fn new() -> Self {
        let http = LlmHttpConfig::default();
        Self {
            api_key: std::env::var("ANTHROPIC_API_KEY").ok().map(SecretString::from),
            endpoint: Self::DEFAULT_ENDPOINT.to_string(),
            model: Self::DEFAULT_MODEL.to_string(),
            max_tokens: 1024,
            http,
            client: build_http_client(http),
        }
    }

    /// Sets the API key.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<SecretString>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the API endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets HTTP client timeouts.
    #[must_use]
    pub fn with_http_config(mut self, config: LlmHttpConfig) -> Self {
        self.http = config;
        self.client = build_http_client(config);
        self
    }

    /// Returns the configured model.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn unavailable(cause: impl Into<String>) -> Error {
        Error::ProviderUnavailable {
            provider: PROVIDER.to_string(),
            cause: cause.into(),
        }
    }

    /// Returns the API key if it is present and well formed.
    fn validated_key(&self) -> Result<&str> {
        let key = self
            .api_key
            .as_ref()
            .map(|key| key.expose_secret())
            .ok_or_else(|| Self::unavailable("ANTHROPIC_API_KEY not set"))?;
        if !Self::is_valid_api_key_format(key) {
            return Err(Self::unavailable(
                "Invalid API key format: expected 'sk-ant-' prefix",
            ));
        }
        Ok(key)
    }

    /// Checks the `sk-ant-` prefix, a 40 character minimum and the character set.
    fn is_valid_api_key_format(key: &str) -> bool {
        const MIN_KEY_LENGTH: usize = 40;
        const PREFIX: &str = "sk-ant-";

        key.starts_with(PREFIX)
            && key.len() >= MIN_KEY_LENGTH
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }
}

impl Default for AnthropicClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClassificationProvider for AnthropicClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn complete_with_system(&self, system: &str, user: &str) -> Result<String> {
        let api_key = self.validated_key()?;

        tracing::info!(provider = PROVIDER, model = %self.model, "Making LLM request");

        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system,
            messages: vec![Message {
                role: "user",
                content: user,
            }],
        };

        let response = self
            .client
            .post(format!("{}/messages", self.endpoint))
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&request)
            .send()
            .await
            .map_err(|e| request_error(PROVIDER, &e, self.http.timeout_ms))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                provider = PROVIDER,
                model = %self.model,
                status = %status,
                body = %body,
                "LLM API returned error status"
            );
            return Err(Self::unavailable(format!(
                "API returned status: {status} - {body}"
            )));
        }

        let response: MessagesResponse = response
            .json()
            .await
            .map_err(|e| request_error(PROVIDER, &e, self.http.timeout_ms))?;

        response
            .content
            .into_iter()
            .find(|block| block.block_type == "text")
            .map(|block| block.text)
            .ok_or_else(|| Self::unavailable("No text content in response"))
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: String,
}
