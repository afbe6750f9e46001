//! Verification policy: decides whether an answer may be emitted.
//!
//! `verify` is a pure function of its arguments.

use crate::scorer::OFFICIAL_RELIABILITY;
use crate::types::{ScoredSource, VerdictReason, VerificationVerdict};
use seva_core::{IntentClass, VerificationConfig};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Minimum distinct domains for corroborated news.
pub const MIN_NEWS_DOMAINS: usize = 2;

/// Apply the verification rules in order.
///
/// 1. Drop sources below `min_reliability`.
/// 2. Drop sources older than the intent's age limit. Undated sources are
///    kept, except on news queries where only official portals may be undated.
/// 3. Strict mode with nothing left fails with `NoVerifiedSources`.
/// 4. News needing corroboration fails with `InsufficientCorroboration`
///    unless two distinct domains survived.
/// 5. Otherwise pass, most reliable first, then most recent.
pub fn verify(
    scored: &[ScoredSource],
    intent: IntentClass,
    config: &VerificationConfig,
) -> VerificationVerdict {
    let max_age = i64::from(max_age_days(intent, config));

    let mut kept: Vec<ScoredSource> = scored
        .iter()
        .filter(|s| s.reliability_score >= config.min_reliability)
        .filter(|s| match s.age_days {
            Some(days) => days <= max_age,
            None => !intent.is_time_sensitive() || s.reliability_score >= OFFICIAL_RELIABILITY,
        })
        .cloned()
        .collect();

    kept.sort_by(compare_sources);

    if kept.is_empty() && config.strict_mode {
        return VerificationVerdict::fail(VerdictReason::NoVerifiedSources, kept);
    }

    if intent == IntentClass::LatestNews
        && config.require_multi_source_for_news
        && distinct_domains(&kept) < MIN_NEWS_DOMAINS
    {
        return VerificationVerdict::fail(VerdictReason::InsufficientCorroboration, kept);
    }

    VerificationVerdict::pass(kept)
}

/// Age limit applied to an intent.
pub fn max_age_days(intent: IntentClass, config: &VerificationConfig) -> u32 {
    if intent == IntentClass::LatestNews {
        config.max_news_age_days
    } else {
        config.max_source_age_days
    }
}

/// Number of distinct normalized domains.
pub fn distinct_domains(sources: &[ScoredSource]) -> usize {
    sources
        .iter()
        .map(|s| s.normalized_domain.as_str())
        .collect::<HashSet<_>>()
        .len()
}

/// Descending reliability, then ascending age with undated last.
fn compare_sources(a: &ScoredSource, b: &ScoredSource) -> Ordering {
    b.reliability_score
        .total_cmp(&a.reliability_score)
        .then_with(|| match (a.age_days, b.age_days) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
}
