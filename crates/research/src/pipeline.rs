//! Research orchestration.
//!
//! cache lookup → scoring → verification → generation → cache write.

use crate::cache::ResearchCache;
use crate::fingerprint::fingerprint;
use crate::policy::{distinct_domains, verify};
use crate::scorer::{citation_score, relevance, SourceScorer};
use crate::types::{
    BundleStatus, Citation, GenerationInfo, ResearchQuery, ResultBundle, ScoredSource,
    VerdictReason, VerificationSummary,
};
use chrono::{DateTime, Utc};
use seva_core::{AppConfig, AppResult, DispatchConfig, IntentClass, VerificationConfig};
use seva_llm::{FailoverDispatcher, GenerationRequest};
use std::collections::HashSet;
use std::sync::Arc;

/// Maximum citations attached to a bundle.
pub const MAX_CITATIONS: usize = 6;

/// Token ceiling for greeting replies.
pub const GREETING_MAX_TOKENS: u32 = 256;

const GREETING_TEMPERATURE: f32 = 0.5;

/// Snippet characters forwarded per source.
const MAX_SNIPPET_CHARS: usize = 1500;

/// Answers queries from verified sources, caching verified answers.
pub struct ResearchService {
    verification: VerificationConfig,
    dispatch: DispatchConfig,
    scorer: SourceScorer,
    dispatcher: Arc<FailoverDispatcher>,
    cache: Arc<ResearchCache>,
}

impl ResearchService {
    pub fn new(
        config: &AppConfig,
        dispatcher: Arc<FailoverDispatcher>,
        cache: Arc<ResearchCache>,
    ) -> Self {
        Self {
            verification: config.verification.clone(),
            dispatch: config.dispatch.clone(),
            scorer: SourceScorer::new(config.verification.max_news_age_days)
                .with_overrides(&config.domain_overrides),
            dispatcher,
            cache,
        }
    }

    /// Wire the dispatcher and cache straight from configuration.
    pub fn from_config(config: &AppConfig) -> Self {
        let dispatcher = Arc::new(seva_llm::build_dispatcher(config));
        let cache = Arc::new(ResearchCache::from_config(&config.cache, &config.workspace));
        Self::new(config, dispatcher, cache)
    }

    pub fn cache(&self) -> &Arc<ResearchCache> {
        &self.cache
    }

    pub fn dispatcher(&self) -> &Arc<FailoverDispatcher> {
        &self.dispatcher
    }

    pub fn scorer(&self) -> &SourceScorer {
        &self.scorer
    }

    pub async fn answer(&self, query: &ResearchQuery) -> AppResult<ResultBundle> {
        self.answer_at(query, Utc::now()).await
    }

    /// Answer `query` as of `now`.
    ///
    /// Provider exhaustion is the only error; verification failures come back
    /// as an `InsufficientVerifiedInformation` bundle and cache trouble
    /// degrades to a bypass.
    pub async fn answer_at(
        &self,
        query: &ResearchQuery,
        now: DateTime<Utc>,
    ) -> AppResult<ResultBundle> {
        let intent = query.intent_class;
        tracing::info!(
            "Research query ({}, {} candidate source(s))",
            intent,
            query.candidate_sources.len()
        );

        if intent == IntentClass::Greeting {
            return self.greet(query).await;
        }

        let key = fingerprint(query, &self.verification);
        if let Some(bundle) = self.cached(&key, now) {
            return Ok(bundle);
        }

        let scored: Vec<ScoredSource> = query
            .candidate_sources
            .iter()
            .map(|source| self.scorer.score_for(source, intent, now))
            .collect();
        let verdict = verify(&scored, intent, &self.verification);

        tracing::info!(
            "Verification {} ({} of {} source(s) kept)",
            if verdict.passed { "passed" } else { "failed" },
            verdict.verified_sources.len(),
            scored.len()
        );

        if let Some(reason) = verdict.reason.filter(|_| self.verification.strict_mode) {
            tracing::warn!("Refusing to answer: {}", reason);
            return Ok(self.refusal(intent, reason, &verdict.verified_sources));
        }

        let citations = if verdict.verified_sources.is_empty() {
            if !scored.is_empty() {
                tracing::warn!("No verified sources; citing best unverified candidates");
            }
            self.fallback_citations(&query.text, &scored)
        } else {
            self.verified_citations(&query.text, &verdict.verified_sources)
        };

        let request = self.build_request(query, &citations, &scored);
        let generation = self.dispatcher.generate(&request).await.into_result()?;

        let bundle = ResultBundle {
            answer_text: Some(generation.text.clone()),
            verification: self.summary(intent, &citations),
            citations,
            served_from_cache: false,
            status: BundleStatus::Answered,
            intent,
            generation: Some(GenerationInfo::from(&generation)),
        };

        self.store(&key, &bundle, now);
        Ok(bundle)
    }

    async fn greet(&self, query: &ResearchQuery) -> AppResult<ResultBundle> {
        let request = GenerationRequest::new(query.text.trim(), IntentClass::Greeting)
            .with_system(
                "You are Jan-Seva, a friendly assistant for Indian government welfare schemes. \
                 Reply to the greeting in one or two sentences and offer to help find schemes.",
            )
            .with_max_tokens(GREETING_MAX_TOKENS.min(self.dispatch.max_tokens))
            .with_temperature(GREETING_TEMPERATURE);

        let generation = self.dispatcher.generate(&request).await.into_result()?;

        Ok(ResultBundle {
            answer_text: Some(generation.text.clone()),
            citations: Vec::new(),
            served_from_cache: false,
            status: BundleStatus::Answered,
            verification: VerificationSummary {
                strict_mode: self.verification.strict_mode,
                trusted_source_count: 0,
                multi_source_news_verified: true,
            },
            intent: IntentClass::Greeting,
            generation: Some(GenerationInfo::from(&generation)),
        })
    }

    fn cached(&self, key: &str, now: DateTime<Utc>) -> Option<ResultBundle> {
        let entry = match self.cache.get_at(key, now) {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                tracing::debug!("Cache miss");
                return None;
            }
            Err(e) => {
                tracing::warn!("Bypassing research cache: {}", e);
                return None;
            }
        };

        match serde_json::from_slice::<ResultBundle>(&entry.payload) {
            Ok(mut bundle) => {
                tracing::info!("Serving research result from cache");
                bundle.served_from_cache = true;
                Some(bundle)
            }
            Err(e) => {
                tracing::warn!("Purging undecodable cache entry: {}", e);
                if let Err(e) = self.cache.remove(key) {
                    tracing::warn!("Failed to purge cache entry: {}", e);
                }
                None
            }
        }
    }

    fn store(&self, key: &str, bundle: &ResultBundle, now: DateTime<Utc>) {
        let payload = match serde_json::to_vec(bundle) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!("Not caching result: {}", e);
                return;
            }
        };
        if let Err(e) = self.cache.put_at(key, &payload, self.cache.ttl(), now) {
            tracing::warn!("Bypassing research cache: {}", e);
        }
    }

    fn refusal(
        &self,
        intent: IntentClass,
        reason: VerdictReason,
        kept: &[ScoredSource],
    ) -> ResultBundle {
        ResultBundle {
            answer_text: None,
            citations: Vec::new(),
            served_from_cache: false,
            status: BundleStatus::InsufficientVerifiedInformation { reason },
            verification: VerificationSummary {
                strict_mode: self.verification.strict_mode,
                trusted_source_count: distinct_domains(kept),
                multi_source_news_verified: reason != VerdictReason::InsufficientCorroboration,
            },
            intent,
            generation: None,
        }
    }

    fn citation(&self, query: &str, scored: &ScoredSource, passed_filters: bool) -> Citation {
        let score = citation_score(
            relevance(query, &scored.source),
            scored.recency_score,
            scored.domain_reputation,
        );
        Citation {
            url: scored.source.url.clone(),
            domain: scored.normalized_domain.clone(),
            score,
            reliability: (scored.domain_reputation * 1000.0).round() / 1000.0,
            publish_date: scored.source.publish_date.clone(),
            verified: passed_filters
                && scored.domain_reputation >= self.verification.min_reliability,
        }
    }

    /// Verified sources in verdict order, one per URL.
    fn verified_citations(&self, query: &str, verified: &[ScoredSource]) -> Vec<Citation> {
        let mut seen = HashSet::new();
        verified
            .iter()
            .filter(|s| seen.insert(s.source.url.as_str()))
            .take(MAX_CITATIONS)
            .map(|s| self.citation(query, s, true))
            .collect()
    }

    /// Best raw candidates by citation score, marked unverified.
    fn fallback_citations(&self, query: &str, scored: &[ScoredSource]) -> Vec<Citation> {
        let mut citations: Vec<Citation> = scored
            .iter()
            .map(|s| self.citation(query, s, false))
            .collect();
        citations.sort_by(|a, b| b.score.total_cmp(&a.score));

        let mut seen = HashSet::new();
        citations.retain(|c| seen.insert(c.url.clone()));
        citations.truncate(MAX_CITATIONS);
        citations
    }

    fn summary(&self, intent: IntentClass, citations: &[Citation]) -> VerificationSummary {
        let trusted: HashSet<&str> = citations
            .iter()
            .filter(|c| c.verified)
            .map(|c| c.domain.as_str())
            .collect();

        VerificationSummary {
            strict_mode: self.verification.strict_mode,
            trusted_source_count: trusted.len(),
            multi_source_news_verified: intent != IntentClass::LatestNews
                || !self.verification.require_multi_source_for_news
                || trusted.len() >= 2,
        }
    }

    fn build_request(
        &self,
        query: &ResearchQuery,
        citations: &[Citation],
        scored: &[ScoredSource],
    ) -> GenerationRequest {
        let mut system = format!(
            "You are Jan-Seva, an assistant for Indian government welfare schemes.\n\
             INTENT: {}\n\
             STRICT VERIFICATION MODE: {}\n\
             Answer only from the numbered sources below. Cite each major claim with \
             its source URL and publication date. If the sources are insufficient, say \
             that verification is required and point to the official portal.",
            query.intent_class,
            if self.verification.strict_mode { "ON" } else { "OFF" },
        );
        if let Some(state) = &query.state_code {
            system.push_str(&format!("\nSTATE: {}", state.trim().to_uppercase()));
        }
        if let Some(language) = &query.language {
            system.push_str(&format!("\nRespond in language code: {}", language.trim()));
        }

        let mut prompt = String::new();
        if citations.is_empty() {
            prompt.push_str(
                "No external sources were available. State this clearly and ask the user \
                 to verify via official portals.\n\n",
            );
        }
        for (i, citation) in citations.iter().enumerate() {
            let snippet = scored
                .iter()
                .find(|s| s.source.url == citation.url)
                .map(|s| truncate(&s.source.raw_snippet, MAX_SNIPPET_CHARS))
                .unwrap_or_default();
            prompt.push_str(&format!(
                "--- SOURCE {} ({} | reliability {:.2} | {}) ---\nURL: {}\nPublished: {}\n{}\n\n",
                i + 1,
                citation.domain,
                citation.reliability,
                if citation.verified { "VERIFIED" } else { "UNVERIFIED" },
                citation.url,
                citation.publish_date.as_deref().unwrap_or("unknown"),
                snippet,
            ));
        }
        prompt.push_str(&format!("Question: {}", query.text.trim()));

        GenerationRequest::new(prompt, query.intent_class)
            .with_system(system)
            .with_max_tokens(self.dispatch.max_tokens)
            .with_temperature(self.dispatch.temperature)
    }
}

impl std::fmt::Debug for ResearchService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResearchService")
            .field("verification", &self.verification)
            .field("dispatcher", &self.dispatcher)
            .field("cache", &self.cache)
            .finish()
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("नमस्ते दुनिया", 3), "नमस");
        assert_eq!(truncate("short", 100), "short");
    }
}
