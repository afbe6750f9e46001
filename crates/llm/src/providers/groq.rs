//! Groq adapter (OpenAI-compatible endpoint, cheap and fast).

use super::chat_completions;
use crate::client::{Completion, GenerationRequest, ProviderAdapter, ProviderError};
use crate::credentials::Credential;
use crate::family::ProviderFamily;

pub const DEFAULT_ENDPOINT: &str = "https://api.groq.com/openai/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

pub struct GroqAdapter {
    endpoint: String,
    model: String,
    http: reqwest::Client,
}

impl GroqAdapter {
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

impl Default for GroqAdapter {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL)
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for GroqAdapter {
    fn family(&self) -> ProviderFamily {
        ProviderFamily::GroqLike
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn invoke(
        &self,
        credential: &Credential,
        request: &GenerationRequest,
    ) -> Result<Completion, ProviderError> {
        tracing::debug!("Groq request to {} ({})", self.endpoint, self.model);
        chat_completions::complete(&self.http, &self.endpoint, &self.model, credential, request)
            .await
    }
}
