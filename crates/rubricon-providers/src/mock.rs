//! Mock provider for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use rubricon_core::error::GenerationError;
use rubricon_core::feedback::{
    FeedbackProvider, ModelInfo, ProseRequest, ProseResponse, TokenUsage,
};
use rubricon_core::report::SectionKey;

#[derive(Debug, Clone, Copy)]
enum FailureKind {
    Network,
    RateLimited(u64),
    Authentication,
}

/// A mock feedback provider for testing report generation without real
/// API calls.
///
/// Returns configurable prose per section, and can be scripted to fail
/// its first N calls so retry behavior is testable.
pub struct MockProvider {
    /// Canned prose keyed by section.
    responses: HashMap<SectionKey, String>,
    /// Default prose if the section has no mapping.
    default_response: String,
    /// Number of calls made.
    call_count: AtomicU32,
    /// Last request received.
    last_request: Mutex<Option<ProseRequest>>,
    /// Calls left that should fail. `u32::MAX` means fail forever.
    failures_remaining: AtomicU32,
    failure: FailureKind,
}

impl MockProvider {
    /// Create a new mock provider with per-section prose overrides.
    pub fn new(responses: HashMap<SectionKey, String>) -> Self {
        Self {
            responses,
            default_response: "The student made steady progress.".to_string(),
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
            failures_remaining: AtomicU32::new(0),
            failure: FailureKind::Network,
        }
    }

    /// Create a mock that always returns the same prose.
    pub fn with_fixed_response(response: &str) -> Self {
        let mut provider = Self::new(HashMap::new());
        provider.default_response = response.to_string();
        provider
    }

    /// Create a mock whose first `failures` calls fail with a network
    /// error, then succeed.
    pub fn failing(failures: u32) -> Self {
        let mut provider = Self::with_fixed_response("Recovered after retry.");
        provider.failures_remaining = AtomicU32::new(failures);
        provider
    }

    /// Create a mock whose first `failures` calls are rate limited with
    /// the given retry-after hint, then succeed.
    pub fn rate_limited(failures: u32, retry_after_ms: u64) -> Self {
        let mut provider = Self::with_fixed_response("Recovered after rate limit.");
        provider.failures_remaining = AtomicU32::new(failures);
        provider.failure = FailureKind::RateLimited(retry_after_ms);
        provider
    }

    /// Create a mock that fails every call with an authentication error.
    pub fn always_auth_failing() -> Self {
        let mut provider = Self::with_fixed_response("unreachable");
        provider.failures_remaining = AtomicU32::new(u32::MAX);
        provider.failure = FailureKind::Authentication;
        provider
    }

    /// Get the number of calls made to this provider.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Get the last request made to this provider.
    pub fn last_request(&self) -> Option<ProseRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl FeedbackProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, request: &ProseRequest) -> Result<ProseResponse, GenerationError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        *self.last_request.lock().unwrap() = Some(request.clone());

        let remaining = self.failures_remaining.load(Ordering::Relaxed);
        if remaining > 0 {
            if remaining != u32::MAX {
                self.failures_remaining.store(remaining - 1, Ordering::Relaxed);
            }
            return Err(match self.failure {
                FailureKind::Network => {
                    GenerationError::NetworkError("mock connection reset".into())
                }
                FailureKind::RateLimited(retry_after_ms) => {
                    GenerationError::RateLimited { retry_after_ms }
                }
                FailureKind::Authentication => {
                    GenerationError::AuthenticationFailed("mock bad key".into())
                }
            });
        }

        let content = self
            .responses
            .get(&request.section)
            .cloned()
            .unwrap_or_else(|| self.default_response.clone());

        let token_count = (content.len() / 4) as u32; // Rough estimate

        Ok(ProseResponse {
            content,
            model: request.model.clone(),
            token_usage: TokenUsage {
                prompt_tokens: (request.prompt.len() / 4) as u32,
                completion_tokens: token_count,
                total_tokens: (request.prompt.len() / 4) as u32 + token_count,
                estimated_cost_usd: 0.0,
            },
            latency_ms: 1,
        })
    }

    fn available_models(&self) -> Vec<ModelInfo> {
        vec![ModelInfo {
            id: "mock-model".into(),
            name: "Mock Model".into(),
            provider: "mock".into(),
            max_context: 100_000,
            cost_per_1k_input: 0.0,
            cost_per_1k_output: 0.0,
        }]
    }
}
