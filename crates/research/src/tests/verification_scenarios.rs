//! Scorer and policy working together on realistic sources.

use crate::policy::verify;
use crate::scorer::SourceScorer;
use crate::types::{ScoredSource, Source, VerdictReason};
use chrono::{DateTime, TimeZone, Utc};
use seva_core::{IntentClass, VerificationConfig};
use std::collections::HashMap;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap()
}

fn score_all(scorer: &SourceScorer, sources: &[Source], intent: IntentClass) -> Vec<ScoredSource> {
    sources
        .iter()
        .map(|s| scorer.score_for(s, intent, now()))
        .collect()
}

#[test]
fn test_single_outlet_news_is_not_corroborated() {
    let scorer = SourceScorer::new(21);
    let sources = vec![
        Source::new("https://www.thehindu.com/news/a.ece", "www.thehindu.com")
            .with_publish_date("2026-10-14"),
        Source::new("https://www.thehindu.com/news/b.ece", "thehindu.com")
            .with_publish_date("2026-10-12"),
    ];
    let scored = score_all(&scorer, &sources, IntentClass::LatestNews);
    let verdict = verify(&scored, IntentClass::LatestNews, &VerificationConfig::default());

    assert!(!verdict.passed);
    assert_eq!(verdict.reason, Some(VerdictReason::InsufficientCorroboration));
}

#[test]
fn test_low_reliability_only_source_refused_in_strict_mode() {
    let overrides = HashMap::from([("lowtrust.in".to_string(), 0.5)]);
    let scorer = SourceScorer::new(21).with_overrides(&overrides);
    let sources = vec![Source::new("https://lowtrust.in/pm-kisan", "lowtrust.in")
        .with_publish_date("2026-10-15")];

    let scored = score_all(&scorer, &sources, IntentClass::SchemeDiscovery);
    assert_eq!(scored[0].reliability_score, 0.5);

    let verdict = verify(&scored, IntentClass::SchemeDiscovery, &VerificationConfig::default());
    assert!(!verdict.passed);
    assert_eq!(verdict.reason, Some(VerdictReason::NoVerifiedSources));
}

#[test]
fn test_stale_news_is_dropped_fresh_news_corroborates() {
    let scorer = SourceScorer::new(21);
    let sources = vec![
        Source::new("https://ndtv.com/old", "ndtv.com").with_publish_date("2026-06-01"),
        Source::new("https://ndtv.com/new", "ndtv.com").with_publish_date("2026-10-16"),
        Source::new("https://pib.gov.in/release", "pib.gov.in")
            .with_publish_date("2026-10-15T10:00:00+05:30"),
    ];
    let scored = score_all(&scorer, &sources, IntentClass::LatestNews);
    assert_eq!(scored[0].reliability_score, 0.0);

    let verdict = verify(&scored, IntentClass::LatestNews, &VerificationConfig::default());
    assert!(verdict.passed);

    let urls: Vec<_> = verdict
        .verified_sources
        .iter()
        .map(|s| s.source.url.as_str())
        .collect();
    assert_eq!(urls, vec!["https://pib.gov.in/release", "https://ndtv.com/new"]);
}

#[test]
fn test_scheme_query_keeps_undated_official_and_reference_sources() {
    let scorer = SourceScorer::default();
    let sources = vec![
        Source::new("https://en.wikipedia.org/wiki/PM-KISAN", ""),
        Source::new("https://pmkisan.gov.in/", ""),
        Source::new("https://someblog.net/pm-kisan", "").with_publish_date("2026-10-16"),
    ];
    let scored = score_all(&scorer, &sources, IntentClass::SchemeDiscovery);
    let verdict = verify(&scored, IntentClass::SchemeDiscovery, &VerificationConfig::default());

    assert!(verdict.passed);
    let domains: Vec<_> = verdict
        .verified_sources
        .iter()
        .map(|s| s.normalized_domain.as_str())
        .collect();
    assert_eq!(domains, vec!["pmkisan.gov.in", "en.wikipedia.org"]);
}

#[test]
fn test_old_scheme_page_exceeds_source_age() {
    let scorer = SourceScorer::default();
    let sources = vec![Source::new("https://india.gov.in/scheme", "india.gov.in")
        .with_publish_date("2026-01-01")];
    let scored = score_all(&scorer, &sources, IntentClass::EligibilityCheck);

    // reputation is untouched outside news, the age filter still applies
    assert_eq!(scored[0].reliability_score, 1.0);
    let verdict = verify(&scored, IntentClass::EligibilityCheck, &VerificationConfig::default());
    assert_eq!(verdict.reason, Some(VerdictReason::NoVerifiedSources));
}
