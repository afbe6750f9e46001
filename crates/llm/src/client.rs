//! Provider adapter abstraction and request/outcome types.
//!
//! Adapters translate one family's wire format into the common types here.
//! They never retry; retries and failover belong to the dispatcher.

use crate::credentials::Credential;
use crate::family::ProviderFamily;
use seva_core::{AppError, AppResult, IntentClass};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Generation request, built once by the caller and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The user prompt text
    pub prompt: String,

    /// System prompt (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Temperature for sampling (0.0 - 2.0)
    pub temperature: f32,

    /// Intent of the query this answer serves
    pub intent: IntentClass,
}

impl GenerationRequest {
    /// Create a new request with default sizing.
    pub fn new(prompt: impl Into<String>, intent: IntentClass) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            max_tokens: 4096,
            temperature: 0.15,
            intent,
        }
    }

    /// Set the maximum tokens to generate.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the temperature for sampling.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the system prompt.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// Token usage statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TokenUsage {
    /// Tokens in the prompt
    #[serde(default)]
    pub prompt_tokens: u32,

    /// Tokens in the completion
    #[serde(default)]
    pub completion_tokens: u32,

    /// Total tokens used
    #[serde(default)]
    pub total_tokens: u32,
}

impl TokenUsage {
    /// Create usage stats from prompt and completion token counts.
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

/// A successful adapter call.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// The generated text
    pub text: String,

    /// Model that generated the response
    pub model: String,

    pub usage: TokenUsage,
}

/// Raw adapter failure, before classification.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("provider returned an empty completion")]
    EmptyCompletion,
}

/// Two-kind failure taxonomy used for credential bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Rate limit, timeout, transient network or 5xx; retry later
    Transient,
    /// Invalid credential or permanently exhausted quota
    Fatal,
}

const TOKEN_LIMIT_HINTS: [&str; 6] = [
    "max_tokens",
    "max_output_tokens",
    "context length",
    "context_length",
    "too many tokens",
    "token limit",
];

const FATAL_BODY_HINTS: [&str; 3] = ["insufficient_quota", "invalid_api_key", "api_key_invalid"];

/// Default classification shared by every family.
pub fn classify_error(error: &ProviderError) -> FailureKind {
    match error {
        ProviderError::Http { status, body } => {
            let body = body.to_lowercase();
            if matches!(status, 401 | 402 | 403)
                || FATAL_BODY_HINTS.iter().any(|hint| body.contains(hint))
            {
                FailureKind::Fatal
            } else {
                FailureKind::Transient
            }
        }
        ProviderError::Transport(_)
        | ProviderError::Timeout(_)
        | ProviderError::Decode(_)
        | ProviderError::EmptyCompletion => FailureKind::Transient,
    }
}

/// Whether the error says the request asked for more tokens than allowed.
pub fn is_token_limit_error(error: &ProviderError) -> bool {
    let text = match error {
        ProviderError::Http { body, .. } => body.to_lowercase(),
        other => other.to_string().to_lowercase(),
    };
    TOKEN_LIMIT_HINTS.iter().any(|hint| text.contains(hint))
}

/// Trait implemented once per provider family.
#[async_trait::async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// The family this adapter speaks for.
    fn family(&self) -> ProviderFamily;

    /// Model identifier sent with each request.
    fn model(&self) -> &str;

    /// Perform one completion with the given credential.
    async fn invoke(
        &self,
        credential: &Credential,
        request: &GenerationRequest,
    ) -> Result<Completion, ProviderError>;

    /// Classify a raw failure for credential bookkeeping.
    fn classify(&self, error: &ProviderError) -> FailureKind {
        classify_error(error)
    }

    /// Whether the failure means the request was too large for the family.
    fn is_oversized(&self, error: &ProviderError) -> bool {
        is_token_limit_error(error)
    }

    /// A smaller version of the request, if this family can shrink it further.
    fn shrink(&self, _request: &GenerationRequest) -> Option<GenerationRequest> {
        None
    }
}

/// A successful dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    pub text: String,
    pub provider_used: ProviderFamily,
    /// Credential identifier such as `groq#2`; never the secret
    pub credential_used: String,
    pub model: String,
    pub tokens_used: u32,
}

/// Last error observed for one attempted family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptError {
    pub family: ProviderFamily,
    pub credential: String,
    pub kind: FailureKind,
    pub message: String,
    /// The error came from the shrunk retry
    pub after_shrink: bool,
}

/// Why the dispatcher gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchFailure {
    /// No family has any credential
    NoProvidersConfigured,
    /// Every credential across every family failed or was unavailable
    AllProvidersExhausted,
}

/// Result of `FailoverDispatcher::generate`.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    Success(Generation),
    Failure {
        kind: DispatchFailure,
        last_errors_by_attempt: Vec<AttemptError>,
    },
}

impl GenerationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Convert into a `Result`, folding the failure into one error.
    pub fn into_result(self) -> AppResult<Generation> {
        match self {
            Self::Success(generation) => Ok(generation),
            Self::Failure {
                kind: DispatchFailure::NoProvidersConfigured,
                ..
            } => Err(AppError::ProvidersExhausted(
                "no provider credentials configured".to_string(),
            )),
            Self::Failure {
                last_errors_by_attempt,
                ..
            } => {
                let summary = if last_errors_by_attempt.is_empty() {
                    "no credential was available".to_string()
                } else {
                    last_errors_by_attempt
                        .iter()
                        .map(|e| format!("{} ({}): {}", e.family, e.credential, e.message))
                        .collect::<Vec<_>>()
                        .join("; ")
                };
                Err(AppError::ProvidersExhausted(summary))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: u16, body: &str) -> ProviderError {
        ProviderError::Http {
            status,
            body: body.to_string(),
        }
    }

    #[test]
    fn test_request_builder() {
        let request = GenerationRequest::new("PM-KISAN eligibility", IntentClass::EligibilityCheck)
            .with_max_tokens(512)
            .with_temperature(0.5)
            .with_system("be precise");
        assert_eq!(request.max_tokens, 512);
        assert_eq!(request.temperature, 0.5);
        assert_eq!(request.system.as_deref(), Some("be precise"));
    }

    #[test]
    fn test_classify_transient() {
        assert_eq!(classify_error(&http(429, "rate limited")), FailureKind::Transient);
        assert_eq!(classify_error(&http(503, "overloaded")), FailureKind::Transient);
        assert_eq!(
            classify_error(&ProviderError::Timeout(Duration::from_secs(30))),
            FailureKind::Transient
        );
        assert_eq!(classify_error(&ProviderError::EmptyCompletion), FailureKind::Transient);
    }

    #[test]
    fn test_classify_fatal() {
        assert_eq!(classify_error(&http(401, "unauthorized")), FailureKind::Fatal);
        assert_eq!(classify_error(&http(403, "forbidden")), FailureKind::Fatal);
        assert_eq!(
            classify_error(&http(429, r#"{"error":{"code":"insufficient_quota"}}"#)),
            FailureKind::Fatal
        );
    }

    #[test]
    fn test_token_limit_detection() {
        assert!(is_token_limit_error(&http(
            400,
            "This model's maximum context length is 8192 tokens"
        )));
        assert!(is_token_limit_error(&http(400, "max_tokens is too large")));
        assert!(!is_token_limit_error(&http(400, "invalid json")));
    }

    #[test]
    fn test_failure_into_result_summarizes() {
        let outcome = GenerationOutcome::Failure {
            kind: DispatchFailure::AllProvidersExhausted,
            last_errors_by_attempt: vec![AttemptError {
                family: ProviderFamily::GroqLike,
                credential: "groq#1".to_string(),
                kind: FailureKind::Transient,
                message: "HTTP 429: slow down".to_string(),
                after_shrink: false,
            }],
        };
        match outcome.into_result() {
            Err(AppError::ProvidersExhausted(msg)) => assert!(msg.contains("groq#1")),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
