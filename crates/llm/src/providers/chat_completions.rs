//! OpenAI-compatible chat completions wire format, shared by the Groq and
//! OpenAI adapters.

use crate::client::{Completion, GenerationRequest, ProviderError, TokenUsage};
use crate::credentials::Credential;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponse {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
    #[serde(default)]
    pub usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatChoice {
    pub message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
}

pub(crate) fn build_request(model: &str, request: &GenerationRequest) -> ChatRequest {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = &request.system {
        messages.push(ChatMessage {
            role: "system".to_string(),
            content: system.clone(),
        });
    }
    messages.push(ChatMessage {
        role: "user".to_string(),
        content: request.prompt.clone(),
    });

    ChatRequest {
        model: model.to_string(),
        messages,
        max_tokens: request.max_tokens,
        temperature: request.temperature,
    }
}

pub(crate) fn into_completion(
    model: &str,
    response: ChatResponse,
) -> Result<Completion, ProviderError> {
    let text = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or(ProviderError::EmptyCompletion)?;

    let usage = response
        .usage
        .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens))
        .unwrap_or_default();

    Ok(Completion {
        text,
        model: response.model.unwrap_or_else(|| model.to_string()),
        usage,
    })
}

/// Send one chat completion with bearer authentication.
pub(crate) async fn complete(
    http: &reqwest::Client,
    endpoint: &str,
    model: &str,
    credential: &Credential,
    request: &GenerationRequest,
) -> Result<Completion, ProviderError> {
    let body = build_request(model, request);
    let builder = http
        .post(endpoint)
        .bearer_auth(credential.secret.expose());

    let response: ChatResponse = super::post_json(builder, &body).await?;
    into_completion(model, response)
}
