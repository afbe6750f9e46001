//! OpenAI adapter: most capable and most expensive, tried last.

use super::chat_completions;
use crate::client::{Completion, GenerationRequest, ProviderAdapter, ProviderError};
use crate::credentials::Credential;
use crate::family::ProviderFamily;

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-5-nano";

/// Smallest `max_tokens` a shrunk request will ask for.
pub const MIN_SHRUNK_MAX_TOKENS: u32 = 1024;

pub struct OpenAiAdapter {
    endpoint: String,
    model: String,
    http: reqwest::Client,
}

impl OpenAiAdapter {
    pub fn new(model: impl Into<String>) -> Self {
        Self::with_endpoint(DEFAULT_ENDPOINT, model)
    }

    pub fn with_endpoint(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            model: model.into(),
            http: reqwest::Client::new(),
        }
    }
}

impl Default for OpenAiAdapter {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL)
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn family(&self) -> ProviderFamily {
        ProviderFamily::OpenAiLike
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn invoke(
        &self,
        credential: &Credential,
        request: &GenerationRequest,
    ) -> Result<Completion, ProviderError> {
        tracing::debug!("OpenAI request to {} ({})", self.endpoint, self.model);
        chat_completions::complete(&self.http, &self.endpoint, &self.model, credential, request)
            .await
    }

    /// Halve `max_tokens`, never below the floor.
    fn shrink(&self, request: &GenerationRequest) -> Option<GenerationRequest> {
        if request.max_tokens <= MIN_SHRUNK_MAX_TOKENS {
            return None;
        }
        let max_tokens = (request.max_tokens / 2).max(MIN_SHRUNK_MAX_TOKENS);
        Some(request.clone().with_max_tokens(max_tokens))
    }
}
