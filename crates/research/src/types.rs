//! Research data types: sources, verdicts and the result bundle.

use seva_core::IntentClass;
use seva_llm::{Generation, ProviderFamily};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A candidate source handed in by the search collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub url: String,

    /// Host name; derived from `url` when left empty
    #[serde(default)]
    pub domain: String,

    /// RFC 3339 timestamp or `YYYY-MM-DD`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_date: Option<String>,

    #[serde(default)]
    pub raw_snippet: String,
}

impl Source {
    pub fn new(url: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            domain: domain.into(),
            publish_date: None,
            raw_snippet: String::new(),
        }
    }

    pub fn with_publish_date(mut self, date: impl Into<String>) -> Self {
        self.publish_date = Some(date.into());
        self
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.raw_snippet = snippet.into();
        self
    }
}

/// A source with its deterministic scores attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredSource {
    #[serde(flatten)]
    pub source: Source,

    /// Normalized domain used for lookups and distinct-domain counting
    pub normalized_domain: String,

    /// Policy score in `[0, 1]`; zero for stale news on time-sensitive queries
    pub reliability_score: f64,

    /// Reputation of the domain alone, in `[0, 1]`
    pub domain_reputation: f64,

    /// Whole days since publication; `None` when undated or unparseable
    pub age_days: Option<i64>,

    pub is_news: bool,

    /// Recency tier used for citation ranking
    pub recency_score: f64,
}

/// Why a verdict failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictReason {
    NoVerifiedSources,
    InsufficientCorroboration,
}

impl fmt::Display for VerdictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoVerifiedSources => {
                f.write_str("no source met the reliability and recency requirements")
            }
            Self::InsufficientCorroboration => {
                f.write_str("news needs corroboration from at least two distinct domains")
            }
        }
    }
}

/// Outcome of the verification policy.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationVerdict {
    pub passed: bool,

    /// Surviving sources, most reliable first
    pub verified_sources: Vec<ScoredSource>,

    pub reason: Option<VerdictReason>,
}

impl VerificationVerdict {
    pub fn pass(verified_sources: Vec<ScoredSource>) -> Self {
        Self {
            passed: true,
            verified_sources,
            reason: None,
        }
    }

    pub fn fail(reason: VerdictReason, verified_sources: Vec<ScoredSource>) -> Self {
        Self {
            passed: false,
            verified_sources,
            reason: Some(reason),
        }
    }
}

/// Inbound query record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchQuery {
    pub text: String,

    #[serde(default, alias = "intent")]
    pub intent_class: IntentClass,

    #[serde(default)]
    pub candidate_sources: Vec<Source>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_code: Option<String>,

    /// Opaque digest of the user profile the answer was tailored to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_fingerprint: Option<String>,
}

impl ResearchQuery {
    pub fn new(text: impl Into<String>, intent_class: IntentClass) -> Self {
        Self {
            text: text.into(),
            intent_class,
            candidate_sources: Vec::new(),
            language: None,
            state_code: None,
            profile_fingerprint: None,
        }
    }

    pub fn with_sources(mut self, sources: Vec<Source>) -> Self {
        self.candidate_sources = sources;
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_state_code(mut self, state_code: impl Into<String>) -> Self {
        self.state_code = Some(state_code.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    pub url: String,
    pub domain: String,

    /// Blended relevance/recency/reliability ranking score
    pub score: f64,

    /// Domain reputation
    pub reliability: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_date: Option<String>,

    pub verified: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationSummary {
    pub strict_mode: bool,

    /// Distinct domains among verified citations
    pub trusted_source_count: usize,

    pub multi_source_news_verified: bool,
}

/// Whether the bundle carries an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BundleStatus {
    Answered,
    InsufficientVerifiedInformation { reason: VerdictReason },
}

/// Which provider produced the answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationInfo {
    pub provider_used: ProviderFamily,
    pub credential_used: String,
    pub model: String,
    pub tokens_used: u32,
}

impl From<&Generation> for GenerationInfo {
    fn from(generation: &Generation) -> Self {
        Self {
            provider_used: generation.provider_used,
            credential_used: generation.credential_used.clone(),
            model: generation.model.clone(),
            tokens_used: generation.tokens_used,
        }
    }
}

/// Outbound result for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultBundle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_text: Option<String>,

    #[serde(default)]
    pub citations: Vec<Citation>,

    #[serde(default)]
    pub served_from_cache: bool,

    pub status: BundleStatus,

    pub verification: VerificationSummary,

    pub intent: IntentClass,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation: Option<GenerationInfo>,
}

impl ResultBundle {
    pub fn is_answered(&self) -> bool {
        self.status == BundleStatus::Answered
    }
}
