//! Provider wrapper with retries and circuit breaking.

use super::ClassificationProvider;
use crate::config::LlmConfig;
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Resilience configuration for provider calls.
#[derive(Debug, Clone)]
pub struct ResilienceConfig {
    /// Maximum retries for timed-out calls.
    pub max_retries: u32,
    /// Backoff between retries in milliseconds.
    pub retry_backoff_ms: u64,
    /// Consecutive failures before opening the circuit.
    pub breaker_failure_threshold: u32,
    /// How long to keep the circuit open before half-open.
    pub breaker_reset_timeout_ms: u64,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            max_retries: 1,
            retry_backoff_ms: 250,
            breaker_failure_threshold: 3,
            breaker_reset_timeout_ms: 30_000,
        }
    }
}

impl ResilienceConfig {
    /// Loads resilience settings from provider configuration.
    #[must_use]
    pub fn from_config(config: &LlmConfig) -> Self {
        let mut settings = Self::default();
        if let Some(max_retries) = config.max_retries {
            settings.max_retries = max_retries;
        }
        if let Some(retry_backoff_ms) = config.retry_backoff_ms {
            settings.retry_backoff_ms = retry_backoff_ms;
        }
        if let Some(threshold) = config.breaker_failure_threshold {
            settings.breaker_failure_threshold = threshold.max(1);
        }
        if let Some(reset_ms) = config.breaker_reset_ms {
            settings.breaker_reset_timeout_ms = reset_ms;
        }
        settings
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BreakerState {
    Closed { failures: u32 },
    Open { opened_at: Instant },
    HalfOpen,
}

#[derive(Debug)]
struct CircuitBreaker {
    state: BreakerState,
    failure_threshold: u32,
    reset_timeout: Duration,
}

impl CircuitBreaker {
    fn new(config: &ResilienceConfig) -> Self {
        Self {
            state: BreakerState::Closed { failures: 0 },
            failure_threshold: config.breaker_failure_threshold.max(1),
            reset_timeout: Duration::from_millis(config.breaker_reset_timeout_ms),
        }
    }

    /// Returns true if a call may proceed. Only one half-open trial runs.
    fn allow(&mut self) -> bool {
        match self.state {
            BreakerState::Closed { .. } => true,
            BreakerState::Open { opened_at } if opened_at.elapsed() >= self.reset_timeout => {
                self.state = BreakerState::HalfOpen;
                true
            },
            BreakerState::Open { .. } | BreakerState::HalfOpen => false,
        }
    }

    const fn on_success(&mut self) {
        self.state = BreakerState::Closed { failures: 0 };
    }

    /// Records a failure; returns true if the circuit just opened.
    fn on_failure(&mut self) -> bool {
        match self.state {
            BreakerState::Closed { failures } => {
                let failures = failures + 1;
                if failures >= self.failure_threshold {
                    self.state = BreakerState::Open {
                        opened_at: Instant::now(),
                    };
                    return true;
                }
                self.state = BreakerState::Closed { failures };
            },
            BreakerState::HalfOpen => {
                self.state = BreakerState::Open {
                    opened_at: Instant::now(),
                };
                return true;
            },
            BreakerState::Open { .. } => {},
        }
        false
    }

    const fn state_value(&self) -> u8 {
        match self.state {
            BreakerState::Closed { .. } => 0,
            BreakerState::Open { .. } => 1,
            BreakerState::HalfOpen => 2,
        }
    }
}

/// Provider wrapper with bounded retries and a circuit breaker.
///
/// Only timeouts are retried. While the circuit is open calls fail fast with
/// `ProviderUnavailable` without reaching the inner provider.
pub struct ResilientProvider<P: ClassificationProvider> {
    inner: P,
    config: ResilienceConfig,
    breaker: Mutex<CircuitBreaker>,
}

impl<P: ClassificationProvider> ResilientProvider<P> {
    /// Wraps `inner`.
    #[must_use]
    pub fn new(inner: P, config: ResilienceConfig) -> Self {
        let breaker = CircuitBreaker::new(&config);
        Self {
            inner,
            config,
            breaker: Mutex::new(breaker),
        }
    }

    /// Returns the wrapped provider.
    pub const fn inner(&self) -> &P {
        &self.inner
    }

    fn with_breaker<T>(&self, f: impl FnOnce(&mut CircuitBreaker) -> T) -> T {
        let mut breaker = self
            .breaker
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut breaker)
    }

    fn record_breaker_state(&self, state: u8) {
        metrics::gauge!("sortbox_llm_circuit_breaker_state", "provider" => self.inner.name())
            .set(f64::from(state));
    }
}

#[async_trait]
impl<P: ClassificationProvider> ClassificationProvider for ResilientProvider<P> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn complete_with_system(&self, system: &str, user: &str) -> Result<String> {
        let provider = self.inner.name();

        if !self.with_breaker(CircuitBreaker::allow) {
            metrics::counter!(
                "sortbox_llm_requests_total",
                "provider" => provider,
                "status" => "circuit_open"
            )
            .increment(1);
            tracing::warn!(provider = provider, "Circuit open; skipping provider call");
            return Err(Error::ProviderUnavailable {
                provider: provider.to_string(),
                cause: "circuit breaker open".to_string(),
            });
        }

        let max_attempts = self.config.max_retries + 1;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let started = Instant::now();
            let result = self.inner.complete_with_system(system, user).await;
            let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

            match result {
                Ok(text) => {
                    let state = self.with_breaker(|b| {
                        b.on_success();
                        b.state_value()
                    });
                    self.record_breaker_state(state);
                    metrics::counter!(
                        "sortbox_llm_requests_total",
                        "provider" => provider,
                        "status" => "success"
                    )
                    .increment(1);
                    metrics::histogram!("sortbox_llm_request_duration_ms", "provider" => provider)
                        .record(elapsed_ms);
                    return Ok(text);
                },
                Err(err) => {
                    let status = if err.is_timeout() { "timeout" } else { "error" };
                    metrics::counter!(
                        "sortbox_llm_requests_total",
                        "provider" => provider,
                        "status" => status
                    )
                    .increment(1);

                    let (tripped, state) = self.with_breaker(|b| (b.on_failure(), b.state_value()));
                    self.record_breaker_state(state);
                    if tripped {
                        tracing::warn!(provider = provider, "LLM circuit breaker opened");
                    }

                    let retryable = err.is_timeout() && attempt < max_attempts && !tripped;
                    if !retryable {
                        return Err(err);
                    }
                    tracing::warn!(
                        provider = provider,
                        attempt = attempt,
                        elapsed_ms = elapsed_ms,
                        "Retrying timed-out provider call"
                    );
                    if self.config.retry_backoff_ms > 0 {
                        tokio::time::sleep(Duration::from_millis(self.config.retry_backoff_ms))
                            .await;
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Flaky {
        calls: AtomicU32,
        fail_first: u32,
        timeout: bool,
    }

    impl Flaky {
        fn new(fail_first: u32, timeout: bool) -> Self {
            Self {
                calls: AtomicU32::new(0),
                fail_first,
                timeout,
            }
        }
    }

    #[async_trait]
    impl ClassificationProvider for Flaky {
        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn complete_with_system(&self, _system: &str, _user: &str) -> Result<String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_first {
                if self.timeout {
                    return Err(Error::ProviderTimeout {
                        provider: "flaky".to_string(),
                        timeout_ms: 10,
                    });
                }
                return Err(Error::ProviderUnavailable {
                    provider: "flaky".to_string(),
                    cause: "503".to_string(),
                });
            }
            Ok("{}".to_string())
        }
    }

    fn config(max_retries: u32, threshold: u32) -> ResilienceConfig {
        ResilienceConfig {
            max_retries,
            retry_backoff_ms: 0,
            breaker_failure_threshold: threshold,
            breaker_reset_timeout_ms: 60_000,
        }
    }

    #[tokio::test]
    async fn test_retries_timeouts() {
        let provider = ResilientProvider::new(Flaky::new(1, true), config(1, 5));
        assert!(provider.complete_with_system("s", "u").await.is_ok());
        assert_eq!(provider.inner().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_does_not_retry_hard_failures() {
        let provider = ResilientProvider::new(Flaky::new(1, false), config(3, 5));
        let err = provider.complete_with_system("s", "u").await.unwrap_err();
        assert!(matches!(err, Error::ProviderUnavailable { .. }));
        assert_eq!(provider.inner().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_open_circuit_fails_fast() {
        let provider = ResilientProvider::new(Flaky::new(10, false), config(0, 2));
        assert!(provider.complete_with_system("s", "u").await.is_err());
        assert!(provider.complete_with_system("s", "u").await.is_err());

        let err = provider.complete_with_system("s", "u").await.unwrap_err();
        assert!(err.to_string().contains("circuit breaker open"));
        assert_eq!(provider.inner().calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_half_open_recovers() {
        let mut breaker = CircuitBreaker::new(&ResilienceConfig {
            breaker_failure_threshold: 1,
            breaker_reset_timeout_ms: 0,
            ..ResilienceConfig::default()
        });
        assert!(breaker.on_failure());
        assert!(breaker.allow());
        assert_eq!(breaker.state, BreakerState::HalfOpen);
        assert!(!breaker.allow());
        breaker.on_success();
        assert_eq!(breaker.state, BreakerState::Closed { failures: 0 });
    }
}
