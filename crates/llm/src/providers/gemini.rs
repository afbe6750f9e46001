//! Google Gemini adapter (`generateContent` REST API).

use crate::client::{Completion, GenerationRequest, ProviderAdapter, ProviderError, TokenUsage};
use crate::credentials::Credential;
use crate::family::ProviderFamily;
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

pub struct GeminiAdapter {
    base_url: String,
    model: String,
    http: reqwest::Client,
}

impl GeminiAdapter {
    pub fn new(model: impl Into<String>) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, model)
    }

    pub fn with_base_url(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            http: reqwest::Client::new(),
        }
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn to_gemini_request(&self, request: &GenerationRequest) -> GeminiRequest {
        GeminiRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: request.prompt.clone(),
                }],
            }],
            system_instruction: request.system.as_ref().map(|system| Content {
                role: None,
                parts: vec![Part {
                    text: system.clone(),
                }],
            }),
            generation_config: GenerationConfig {
                max_output_tokens: request.max_tokens,
                temperature: request.temperature,
            },
        }
    }

    fn convert_response(&self, response: GeminiResponse) -> Result<Completion, ProviderError> {
        let text = response
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .map(|part| part.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or(ProviderError::EmptyCompletion)?;

        let usage = response
            .usage_metadata
            .map(|u| TokenUsage::new(u.prompt_token_count, u.candidates_token_count))
            .unwrap_or_default();

        Ok(Completion {
            text,
            model: response.model_version.unwrap_or_else(|| self.model.clone()),
            usage,
        })
    }
}

impl Default for GeminiAdapter {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL)
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for GeminiAdapter {
    fn family(&self) -> ProviderFamily {
        ProviderFamily::GeminiLike
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn invoke(
        &self,
        credential: &Credential,
        request: &GenerationRequest,
    ) -> Result<Completion, ProviderError> {
        let url = self.url();
        tracing::debug!("Gemini request to {}", url);

        let body = self.to_gemini_request(request);
        let builder = self
            .http
            .post(&url)
            .header("x-goog-api-key", credential.secret.expose());

        let response: GeminiResponse = super::post_json(builder, &body).await?;
        self.convert_response(response)
    }
}
