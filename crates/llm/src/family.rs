//! Provider families.
//!
//! A family is one backend API; every credential in a family is
//! interchangeable. Declaration order is dispatch priority.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Backend LLM API family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderFamily {
    /// Fast, cheap OpenAI-compatible inference (Groq)
    GroqLike,
    /// Google Gemini `generateContent`
    GeminiLike,
    /// OpenAI chat completions; most capable, most expensive
    OpenAiLike,
}

impl ProviderFamily {
    /// All families in dispatch priority order.
    pub const ALL: [ProviderFamily; 3] = [Self::GroqLike, Self::GeminiLike, Self::OpenAiLike];

    /// Fixed priority rank; lower is tried first.
    pub fn priority(&self) -> u8 {
        match self {
            Self::GroqLike => 0,
            Self::GeminiLike => 1,
            Self::OpenAiLike => 2,
        }
    }

    /// Whether oversized requests may be retried with fewer output tokens.
    pub fn supports_shrink(&self) -> bool {
        matches!(self, Self::OpenAiLike)
    }

    /// Short name used in credential identifiers and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GroqLike => "groq",
            Self::GeminiLike => "gemini",
            Self::OpenAiLike => "openai",
        }
    }

    /// Parse a family from its short name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "groq" => Some(Self::GroqLike),
            "gemini" | "google" => Some(Self::GeminiLike),
            "openai" => Some(Self::OpenAiLike),
            _ => None,
        }
    }
}

impl fmt::Display for ProviderFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
