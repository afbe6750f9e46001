//! Cache keys for research queries.

use crate::types::ResearchQuery;
use seva_core::VerificationConfig;
use sha2::{Digest, Sha256};

/// Lower-case, trim and collapse internal whitespace.
pub fn normalize_query(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// SHA-256 hex digest of the normalized query plus every setting that can
/// change the verified answer.
pub fn fingerprint(query: &ResearchQuery, config: &VerificationConfig) -> String {
    let language = query
        .language
        .as_deref()
        .map(|lang| lang.trim().to_lowercase())
        .filter(|lang| !lang.is_empty())
        .unwrap_or_else(|| "en".to_string());
    let state_code = query
        .state_code
        .as_deref()
        .map(|code| code.trim().to_uppercase())
        .unwrap_or_default();
    let profile = query
        .profile_fingerprint
        .as_deref()
        .map(str::trim)
        .unwrap_or_default();

    let material = format!(
        "{}|{}|{}|{}|{}|strict={}|minrel={:.2}|multinews={}|maxage={}|maxnews={}",
        normalize_query(&query.text),
        language,
        query.intent_class,
        state_code,
        profile,
        config.strict_mode,
        config.min_reliability,
        config.require_multi_source_for_news,
        config.max_source_age_days,
        config.max_news_age_days,
    );

    let mut hasher = Sha256::new();
    hasher.update(material.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use seva_core::IntentClass;

    fn query(text: &str) -> ResearchQuery {
        ResearchQuery::new(text, IntentClass::SchemeDiscovery)
    }

    #[test]
    fn test_normalize_query() {
        assert_eq!(normalize_query("  PM   Kisan\tStatus \n"), "pm kisan status");
    }

    #[test]
    fn test_equivalent_queries_hash_identically() {
        let config = VerificationConfig::default();
        let a = fingerprint(&query("PM Kisan  status"), &config);
        let b = fingerprint(&query("  pm kisan status").with_language("EN"), &config);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_state_code_case_insensitive() {
        let config = VerificationConfig::default();
        let a = fingerprint(&query("schemes").with_state_code("tn"), &config);
        let b = fingerprint(&query("schemes").with_state_code("TN"), &config);
        assert_eq!(a, b);
    }

    #[test]
    fn test_config_and_intent_change_the_key() {
        let config = VerificationConfig::default();
        let base = fingerprint(&query("schemes"), &config);

        let lenient = VerificationConfig {
            strict_mode: false,
            ..VerificationConfig::default()
        };
        assert_ne!(base, fingerprint(&query("schemes"), &lenient));

        let news = ResearchQuery::new("schemes", IntentClass::LatestNews);
        assert_ne!(base, fingerprint(&news, &config));

        assert_ne!(base, fingerprint(&query("schemes").with_language("hi"), &config));
    }

    #[test]
    fn test_age_limits_change_the_key() {
        let config = VerificationConfig::default();
        let base = fingerprint(&query("schemes"), &config);

        let longer_sources = VerificationConfig {
            max_source_age_days: config.max_source_age_days + 1,
            ..config.clone()
        };
        let longer_news = VerificationConfig {
            max_news_age_days: config.max_news_age_days + 1,
            ..config.clone()
        };
        let a = fingerprint(&query("schemes"), &longer_sources);
        let b = fingerprint(&query("schemes"), &longer_news);
        assert_ne!(base, a);
        assert_ne!(base, b);
        assert_ne!(a, b);
    }
}
