//! Concrete provider adapters, one per family.

mod chat_completions;
pub mod gemini;
pub mod groq;
pub mod openai;

pub use gemini::GeminiAdapter;
pub use groq::GroqAdapter;
pub use openai::OpenAiAdapter;

use crate::client::ProviderError;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// POST a JSON body and decode a JSON reply, mapping failures onto
/// `ProviderError` without classifying them.
pub(crate) async fn post_json<B, R>(
    request: reqwest::RequestBuilder,
    body: &B,
) -> Result<R, ProviderError>
where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let response = request
        .json(body)
        .send()
        .await
        .map_err(|e| ProviderError::Transport(e.to_string()))?;

    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| ProviderError::Transport(format!("failed to read body: {}", e)))?;

    if !status.is_success() {
        return Err(ProviderError::Http {
            status: status.as_u16(),
            body: text,
        });
    }

    serde_json::from_str(&text).map_err(|e| ProviderError::Decode(e.to_string()))
}
