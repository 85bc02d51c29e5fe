//! Classification provider HTTP tests.
//!
//! Runs the Anthropic and Ollama clients against a local mock server:
//! - Successful responses parse into an inference result
//! - Error statuses and timeouts map to distinct errors
//! - The resilient wrapper opens its circuit after repeated failures
//!
//! No API keys or network access are needed.

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use serde_json::json;
use sortbox::config::LlmConfig;
use sortbox::llm::{
    AnthropicClient, LlmHttpConfig, OllamaClient, ResilienceConfig, ResilientProvider,
    classification_deadline,
};
use sortbox::{
    CaptureInput, ClassificationProvider, Error, InferenceEngine, ItemType, Priority, ReviewConfig,
};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Test Helpers
// ============================================================================

const TEST_KEY: &str = "sk-ant-REDACTED";

fn classification_json() -> serde_json::Value {
    json!({
        "primaryTracker": "Actions",
        "confidence": 0.82,
        "overallReasoning": "a chore and a note",
        "generatedItems": [
            {
                "tracker": "actions",
                "itemType": "task",
                "priority": "urgent",
                "content": "Fix the leaking tap",
                "reasoning": "explicit chore"
            },
            {
                "tracker": "reference",
                "type": "reference",
                "content": "Plumber number is 555-0199",
                "confidence": 0.95
            },
            { "tracker": "someday", "content": "   " }
        ],
        "taskCompletions": [
            { "tracker": "actions", "description": "buy washers" }
        ]
    })
}

fn anthropic(server: &MockServer, timeout_ms: u64) -> AnthropicClient {
    AnthropicClient::new()
        .with_api_key(TEST_KEY.to_string())
        .with_endpoint(server.uri())
        .with_http_config(LlmHttpConfig {
            timeout_ms,
            connect_timeout_ms: 1_000,
        })
}

fn ollama(server: &MockServer) -> OllamaClient {
    OllamaClient::new()
        .with_endpoint(server.uri())
        .with_model("test-model")
        .with_http_config(LlmHttpConfig {
            timeout_ms: 2_000,
            connect_timeout_ms: 1_000,
        })
}

fn anthropic_body(text: &str) -> serde_json::Value {
    json!({
        "content": [{ "type": "text", "text": text }]
    })
}

// ============================================================================
// Anthropic
// ============================================================================

#[tokio::test]
async fn test_anthropic_parses_fenced_json() {
    let server = MockServer::start().await;
    let text = format!(
        "Here you go:\n```json\n{}\n```",
        classification_json()
    );
    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(header("x-api-key", TEST_KEY))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(anthropic_body(&text)))
        .expect(1)
        .mount(&server)
        .await;

    let result = anthropic(&server, 2_000)
        .classify("fix the tap, plumber is 555-0199", None)
        .await
        .unwrap();

    assert_eq!(result.primary_tracker.as_str(), "actions");
    assert_eq!(result.generated_items.len(), 2);
    let chore = &result.generated_items[0];
    assert_eq!(chore.item_type, ItemType::Action);
    assert_eq!(chore.priority, Priority::Critical);
    assert_eq!(result.generated_items[1].item_type, ItemType::Reference);
    assert_eq!(result.generated_items[1].confidence, Some(0.95));
    assert_eq!(result.task_completions.len(), 1);
}

#[tokio::test]
async fn test_anthropic_error_status_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(500).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let err = anthropic(&server, 2_000)
        .classify("anything", None)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ProviderUnavailable { ref cause, .. } if cause.contains("500")));
    assert!(!err.is_timeout());
}

#[tokio::test]
async fn test_anthropic_slow_response_is_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(anthropic_body("{}"))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let err = anthropic(&server, 50)
        .classify("anything", None)
        .await
        .unwrap_err();

    assert!(err.is_timeout(), "expected timeout, got {err}");
    assert!(matches!(err, Error::ProviderTimeout { timeout_ms: 50, .. }));
}

#[tokio::test]
async fn test_anthropic_unparseable_output_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(anthropic_body("I could not decide.")),
        )
        .mount(&server)
        .await;

    let err = anthropic(&server, 2_000)
        .classify("hmm", None)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ProviderUnavailable { .. }));
}

#[tokio::test]
async fn test_anthropic_without_key_never_calls_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = AnthropicClient::new()
        .with_api_key("not-a-key".to_string())
        .with_endpoint(server.uri());
    let err = client.classify("anything", None).await.unwrap_err();

    assert!(matches!(err, Error::ProviderUnavailable { .. }));
}

// ============================================================================
// Ollama
// ============================================================================

#[tokio::test]
async fn test_ollama_chat_response_parses() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "test-model",
            "message": { "role": "assistant", "content": classification_json().to_string() },
            "done": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = ollama(&server).classify("fix the tap", None).await.unwrap();

    assert!((result.confidence - 0.82).abs() < f64::EPSILON);
    assert_eq!(result.generated_items[0].content, "Fix the leaking tap");
}

#[tokio::test]
async fn test_ollama_availability_check() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "models": [] })))
        .mount(&server)
        .await;

    assert!(ollama(&server).is_available().await);
}

// ============================================================================
// Resilience
// ============================================================================

#[tokio::test]
async fn test_circuit_opens_after_repeated_failures() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    let provider = ResilientProvider::new(
        ollama(&server),
        ResilienceConfig {
            max_retries: 0,
            retry_backoff_ms: 0,
            breaker_failure_threshold: 2,
            breaker_reset_timeout_ms: 60_000,
        },
    );

    for _ in 0..2 {
        assert!(provider.classify("x", None).await.is_err());
    }
    let err = provider.classify("x", None).await.unwrap_err();
    assert!(matches!(err, Error::ProviderUnavailable { ref cause, .. } if cause.contains("circuit")));
}

#[tokio::test]
async fn test_inference_engine_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": { "role": "assistant", "content": classification_json().to_string() }
        })))
        .mount(&server)
        .await;

    let engine = InferenceEngine::new(Arc::new(ollama(&server)), ReviewConfig::default());
    let result = engine
        .infer(&CaptureInput::new("fix the tap"), None)
        .await
        .unwrap();

    // The chore sits at the overall 0.82, above the action cutoff.
    assert!(!result.requires_review);
    assert_eq!(result.generated_items.len(), 2);
}

#[tokio::test]
async fn test_inference_deadline_leaves_room_for_a_retry() {
    let server = MockServer::start().await;
    let reply = json!({
        "message": { "role": "assistant", "content": classification_json().to_string() }
    });
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(reply.clone())
                .set_delay(Duration::from_millis(1_000)),
        )
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply))
        .expect(1)
        .mount(&server)
        .await;

    let config = LlmConfig {
        timeout_ms: Some(150),
        max_retries: Some(1),
        retry_backoff_ms: Some(100),
        ..LlmConfig::default()
    };
    let client = OllamaClient::new()
        .with_endpoint(server.uri())
        .with_model("test-model")
        .with_http_config(LlmHttpConfig::from_config(&config));
    let provider = ResilientProvider::new(client, ResilienceConfig::from_config(&config));
    let engine = InferenceEngine::new(Arc::new(provider), ReviewConfig::default())
        .with_timeout(classification_deadline(&config).unwrap());

    let result = engine
        .infer(&CaptureInput::new("fix the tap"), None)
        .await
        .unwrap();

    assert_eq!(result.generated_items[0].content, "Fix the leaking tap");
}
